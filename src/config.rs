use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use url::Url;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  pub api: ApiConfig,
  #[serde(default)]
  pub store: StoreConfig,
  #[serde(default)]
  pub cache: CacheConfig,
  /// Default log filter when RUST_LOG is not set (e.g. "info", "threadsync=debug")
  #[serde(default = "default_log_level")]
  pub log_level: String,
}

fn default_log_level() -> String {
  "info".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
  /// Base URL of the forum API (e.g. "http://localhost:8080")
  pub url: Url,
  /// Per-request timeout enforced by the HTTP transport
  #[serde(default = "default_timeout_secs")]
  pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
  30
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
  /// Threads requested per page
  #[serde(default = "default_page_size")]
  pub page_size: u32,
  /// Seconds a persisted snapshot stays fresh
  #[serde(default = "default_cache_ttl_secs")]
  pub cache_ttl_secs: u64,
  /// Quiet period before mutations are written to the cache
  #[serde(default = "default_persist_debounce_ms")]
  pub persist_debounce_ms: u64,
}

fn default_page_size() -> u32 {
  10
}

fn default_cache_ttl_secs() -> u64 {
  300
}

fn default_persist_debounce_ms() -> u64 {
  500
}

impl Default for StoreConfig {
  fn default() -> Self {
    Self {
      page_size: default_page_size(),
      cache_ttl_secs: default_cache_ttl_secs(),
      persist_debounce_ms: default_persist_debounce_ms(),
    }
  }
}

impl StoreConfig {
  /// Snapshot freshness window. A value too large to represent falls back
  /// to the default; `Config` rejects such values when loading.
  pub fn cache_ttl(&self) -> chrono::Duration {
    self
      .checked_cache_ttl()
      .unwrap_or_else(crate::cache::default_ttl)
  }

  fn checked_cache_ttl(&self) -> Option<chrono::Duration> {
    i64::try_from(self.cache_ttl_secs)
      .ok()
      .and_then(chrono::Duration::try_seconds)
  }

  pub fn persist_debounce(&self) -> std::time::Duration {
    std::time::Duration::from_millis(self.persist_debounce_ms)
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
  /// Persist the thread collection between runs
  #[serde(default = "default_cache_enabled")]
  pub enabled: bool,
  /// Database location (default: $XDG_DATA_HOME/threadsync/cache.db)
  pub path: Option<PathBuf>,
}

fn default_cache_enabled() -> bool {
  true
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      enabled: default_cache_enabled(),
      path: None,
    }
  }
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./threadsync.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/threadsync/config.yaml
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Err(eyre!(
        "No configuration file found. Create one at ~/.config/threadsync/config.yaml"
      )),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("threadsync.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("threadsync").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::parse(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  fn parse(contents: &str) -> Result<Self> {
    let config: Config = serde_yaml::from_str(contents)?;

    if config.store.page_size == 0 {
      return Err(eyre!("store.page_size must be at least 1"));
    }

    if config.store.checked_cache_ttl().is_none() {
      return Err(eyre!(
        "store.cache_ttl_secs is too large: {}",
        config.store.cache_ttl_secs
      ));
    }

    Ok(config)
  }

  /// Get the API bearer token from the environment, if any.
  ///
  /// Checks THREADSYNC_TOKEN.
  pub fn get_api_token() -> Option<String> {
    std::env::var("THREADSYNC_TOKEN")
      .ok()
      .filter(|token| !token.is_empty())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_minimal_config_uses_defaults() {
    let config = Config::parse("api:\n  url: http://localhost:8080\n").unwrap();

    assert_eq!(config.api.url.as_str(), "http://localhost:8080/");
    assert_eq!(config.api.timeout_secs, 30);
    assert_eq!(config.store.page_size, 10);
    assert_eq!(config.store.cache_ttl(), chrono::Duration::minutes(5));
    assert_eq!(
      config.store.persist_debounce(),
      std::time::Duration::from_millis(500)
    );
    assert!(config.cache.enabled);
    assert_eq!(config.log_level, "info");
  }

  #[test]
  fn test_overrides() {
    let yaml = r#"
api:
  url: https://forum.example.com
store:
  page_size: 25
  cache_ttl_secs: 60
cache:
  enabled: false
  path: /tmp/threads.db
log_level: debug
"#;
    let config = Config::parse(yaml).unwrap();

    assert_eq!(config.store.page_size, 25);
    assert_eq!(config.store.cache_ttl(), chrono::Duration::seconds(60));
    assert_eq!(config.store.persist_debounce_ms, 500);
    assert!(!config.cache.enabled);
    assert_eq!(config.cache.path, Some(PathBuf::from("/tmp/threads.db")));
  }

  #[test]
  fn test_zero_page_size_rejected() {
    let yaml = "api:\n  url: http://localhost\nstore:\n  page_size: 0\n";
    assert!(Config::parse(yaml).is_err());
  }

  #[test]
  fn test_oversized_cache_ttl_rejected() {
    for secs in ["18446744073709551615", "9300000000000000"] {
      let yaml = format!(
        "api:\n  url: http://localhost\nstore:\n  cache_ttl_secs: {}\n",
        secs
      );
      let err = Config::parse(&yaml).unwrap_err();
      assert!(err.to_string().contains("cache_ttl_secs"), "{}", secs);
    }
  }

  #[test]
  fn test_unrepresentable_cache_ttl_falls_back_to_default() {
    let store = StoreConfig {
      cache_ttl_secs: u64::MAX,
      ..StoreConfig::default()
    };
    assert_eq!(store.cache_ttl(), crate::cache::default_ttl());
  }

  #[test]
  fn test_missing_api_section_rejected() {
    assert!(Config::parse("log_level: info\n").is_err());
  }

  #[test]
  fn test_missing_explicit_file() {
    let err = Config::load(Some(Path::new("/definitely/not/here.yaml"))).unwrap_err();
    assert!(err.to_string().contains("Config file not found"));
  }
}
