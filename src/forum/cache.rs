//! Cache keys for forum data.

use sha2::{Digest, Sha256};

/// Identifies one persisted thread collection.
///
/// Snapshots taken against a different server or with a different page size
/// would break the page cursor, so both are part of the key.
#[derive(Clone, Debug)]
pub struct CollectionKey {
  pub base_url: String,
  pub page_size: u32,
}

impl CollectionKey {
  pub fn new(base_url: &str, page_size: u32) -> Self {
    Self {
      base_url: base_url.to_string(),
      page_size,
    }
  }

  pub fn cache_hash(&self) -> String {
    let input = format!(
      "threads:{}:{}",
      normalize_url(&self.base_url),
      self.page_size
    );

    // SHA256 hash for stable, fixed-length keys
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
  }

  pub fn description(&self) -> String {
    format!("threads from {} ({} per page)", self.base_url, self.page_size)
  }
}

/// Trailing slashes and case don't change which server is meant.
fn normalize_url(url: &str) -> String {
  url.trim().trim_end_matches('/').to_lowercase()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_equivalent_urls_share_a_key() {
    let a = CollectionKey::new("http://Localhost:8080/", 10);
    let b = CollectionKey::new("http://localhost:8080", 10);
    assert_eq!(a.cache_hash(), b.cache_hash());
    assert_eq!(a.cache_hash().len(), 64);
  }

  #[test]
  fn test_page_size_changes_key() {
    let a = CollectionKey::new("http://localhost:8080", 10);
    let b = CollectionKey::new("http://localhost:8080", 20);
    assert_ne!(a.cache_hash(), b.cache_hash());
  }
}
