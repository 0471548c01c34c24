//! Cache layer binding a storage backend, a snapshot key and a freshness policy.

use chrono::{DateTime, Duration, Utc};
use color_eyre::Result;
use std::sync::Arc;

use super::freshness::{default_ttl, is_stale};
use super::storage::{CacheEntry, SnapshotStorage};

/// Cache layer for the persisted thread collection.
///
/// Reads never fail: a backend error or an unreadable snapshot is logged
/// and reported as a miss, since the cache only mirrors in-memory state.
pub struct CacheLayer<S: SnapshotStorage> {
  storage: Arc<S>,
  key: String,
  /// How long before cached data is considered stale
  stale_time: Duration,
}

impl<S: SnapshotStorage> CacheLayer<S> {
  /// Create a new cache layer storing its snapshot under `key`.
  pub fn new(storage: S, key: impl Into<String>) -> Self {
    Self {
      storage: Arc::new(storage),
      key: key.into(),
      stale_time: default_ttl(),
    }
  }

  /// Set the stale time for cached data.
  pub fn with_stale_time(mut self, stale_time: Duration) -> Self {
    self.stale_time = stale_time;
    self
  }

  pub fn stale_time(&self) -> Duration {
    self.stale_time
  }

  pub fn storage(&self) -> &S {
    &self.storage
  }

  /// Check if a snapshot stamped at `last_updated` is stale at `now`.
  pub fn is_stale(&self, last_updated: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    is_stale(last_updated, now, self.stale_time)
  }

  /// Whatever snapshot is stored, fresh or not.
  pub fn load(&self) -> Option<CacheEntry> {
    match self.storage.load(&self.key) {
      Ok(entry) => entry,
      Err(e) => {
        tracing::warn!(key = %self.key, error = %e, "failed to read thread snapshot");
        None
      }
    }
  }

  /// Write the snapshot.
  pub fn store(&self, entry: &CacheEntry) -> Result<()> {
    self.storage.save(&self.key, entry)?;
    tracing::debug!(
      key = %self.key,
      threads = entry.snapshot.len(),
      "persisted thread snapshot"
    );
    Ok(())
  }
}

impl<S: SnapshotStorage> Clone for CacheLayer<S> {
  fn clone(&self) -> Self {
    Self {
      storage: Arc::clone(&self.storage),
      key: self.key.clone(),
      stale_time: self.stale_time,
    }
  }
}
