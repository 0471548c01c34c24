//! Where the store's data came from after initialization.

use chrono::{DateTime, Utc};

/// Indicates where the thread collection came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheSource {
  /// Fresh data from network
  Network,
  /// Data from cache, still considered fresh
  CacheFresh,
  /// Network unavailable, serving whatever was cached (possibly nothing)
  Offline,
}

/// Result of initializing the store, including metadata about the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitOutcome {
  /// Where the data came from
  pub source: CacheSource,
  /// Number of threads now held
  pub threads: usize,
  /// When the served snapshot was last fetched (if from cache)
  pub cached_at: Option<DateTime<Utc>>,
}

impl InitOutcome {
  pub fn from_network(threads: usize) -> Self {
    Self {
      source: CacheSource::Network,
      threads,
      cached_at: None,
    }
  }

  pub fn from_cache(threads: usize, cached_at: Option<DateTime<Utc>>) -> Self {
    Self {
      source: CacheSource::CacheFresh,
      threads,
      cached_at,
    }
  }

  pub fn offline(threads: usize, cached_at: Option<DateTime<Utc>>) -> Self {
    Self {
      source: CacheSource::Offline,
      threads,
      cached_at,
    }
  }

  /// Offline results are best effort: possibly stale or empty.
  pub fn is_best_effort(&self) -> bool {
    self.source == CacheSource::Offline
  }
}
