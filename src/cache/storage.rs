//! Snapshot storage trait and SQLite implementation.

use chrono::{DateTime, Utc};
use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::forum::types::{timestamp, Thread};

/// The last known thread collection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheEntry {
  /// Threads in collection order
  pub snapshot: Vec<Thread>,
  /// When the collection was last fetched successfully (None if never)
  pub last_updated: Option<DateTime<Utc>>,
}

/// Trait for snapshot storage backends.
///
/// `load` reports an unreadable snapshot as a miss; errors are reserved for
/// the backend itself failing.
pub trait SnapshotStorage: Send + Sync + 'static {
  /// Get the snapshot stored under a key.
  fn load(&self, key: &str) -> Result<Option<CacheEntry>>;

  /// Replace the snapshot stored under a key.
  fn save(&self, key: &str, entry: &CacheEntry) -> Result<()>;
}

impl<S: SnapshotStorage + ?Sized> SnapshotStorage for std::sync::Arc<S> {
  fn load(&self, key: &str) -> Result<Option<CacheEntry>> {
    (**self).load(key)
  }

  fn save(&self, key: &str, entry: &CacheEntry) -> Result<()> {
    (**self).save(key, entry)
  }
}

/// Storage implementation that doesn't cache anything.
/// Used when caching is disabled - all operations are no-ops.
pub struct NoopStorage;

impl SnapshotStorage for NoopStorage {
  fn load(&self, _key: &str) -> Result<Option<CacheEntry>> {
    Ok(None) // Always miss
  }

  fn save(&self, _key: &str, _entry: &CacheEntry) -> Result<()> {
    Ok(()) // Discard
  }
}

/// SQLite-based snapshot storage implementation.
pub struct SqliteStorage {
  conn: Mutex<Connection>,
}

impl SqliteStorage {
  /// Open the cache at the default location.
  pub fn open() -> Result<Self> {
    Self::open_at(&Self::default_path()?)
  }

  /// Open (or create) the cache database at `path`.
  pub fn open_at(path: &Path) -> Result<Self> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create cache directory: {}", e))?;
    }

    let conn = Connection::open(path)
      .map_err(|e| eyre!("Failed to open cache database at {}: {}", path.display(), e))?;

    let storage = Self {
      conn: Mutex::new(conn),
    };
    storage.run_migrations()?;

    Ok(storage)
  }

  /// Get the default database path.
  pub fn default_path() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join("threadsync").join("cache.db"))
  }

  /// Run database migrations for cache tables.
  fn run_migrations(&self) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute_batch(CACHE_SCHEMA)
      .map_err(|e| eyre!("Failed to run cache migrations: {}", e))?;

    Ok(())
  }
}

/// Schema for cache tables.
const CACHE_SCHEMA: &str = r#"
-- One serialized thread collection per key
CREATE TABLE IF NOT EXISTS snapshot_cache (
    cache_key TEXT PRIMARY KEY,
    data BLOB NOT NULL,
    thread_count INTEGER NOT NULL,
    last_updated TEXT,
    written_at TEXT NOT NULL DEFAULT (datetime('now'))
);
"#;

impl SnapshotStorage for SqliteStorage {
  fn load(&self, key: &str) -> Result<Option<CacheEntry>> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let row: Option<(Vec<u8>, Option<String>)> = conn
      .query_row(
        "SELECT data, last_updated FROM snapshot_cache WHERE cache_key = ?",
        params![key],
        |row| Ok((row.get(0)?, row.get(1)?)),
      )
      .optional()
      .map_err(|e| eyre!("Failed to read snapshot: {}", e))?;

    let (data, last_updated) = match row {
      Some(row) => row,
      None => return Ok(None),
    };

    let snapshot: Vec<Thread> = match serde_json::from_slice(&data) {
      Ok(snapshot) => snapshot,
      Err(e) => {
        tracing::warn!(key, error = %e, "discarding unreadable thread snapshot");
        return Ok(None);
      }
    };

    // An unreadable timestamp only costs freshness, not the data
    let last_updated = last_updated.as_deref().and_then(timestamp::parse);

    Ok(Some(CacheEntry {
      snapshot,
      last_updated,
    }))
  }

  fn save(&self, key: &str, entry: &CacheEntry) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let data = serde_json::to_vec(&entry.snapshot)
      .map_err(|e| eyre!("Failed to serialize snapshot: {}", e))?;
    let last_updated = entry.last_updated.map(|dt| dt.to_rfc3339());

    conn
      .execute(
        "INSERT OR REPLACE INTO snapshot_cache (cache_key, data, thread_count, last_updated, written_at)
         VALUES (?, ?, ?, ?, datetime('now'))",
        params![key, data, entry.snapshot.len(), last_updated],
      )
      .map_err(|e| eyre!("Failed to store snapshot: {}", e))?;

    Ok(())
  }
}

/// In-memory storage that counts writes.
#[cfg(test)]
#[derive(Default)]
pub struct MemoryStorage {
  entries: parking_lot::Mutex<std::collections::HashMap<String, CacheEntry>>,
  writes: std::sync::atomic::AtomicUsize,
}

#[cfg(test)]
impl MemoryStorage {
  pub fn with_entry(key: &str, entry: CacheEntry) -> Self {
    let storage = Self::default();
    storage.entries.lock().insert(key.to_string(), entry);
    storage
  }

  pub fn writes(&self) -> usize {
    self.writes.load(std::sync::atomic::Ordering::SeqCst)
  }

  pub fn entry(&self, key: &str) -> Option<CacheEntry> {
    self.entries.lock().get(key).cloned()
  }
}

#[cfg(test)]
impl SnapshotStorage for MemoryStorage {
  fn load(&self, key: &str) -> Result<Option<CacheEntry>> {
    Ok(self.entry(key))
  }

  fn save(&self, key: &str, entry: &CacheEntry) -> Result<()> {
    self
      .writes
      .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
    self.entries.lock().insert(key.to_string(), entry.clone());
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::forum::tree;
  use crate::forum::types::{Comment, CommentId, ThreadId};
  use chrono::TimeZone;
  use tempfile::TempDir;

  fn thread(id: u64, title: &str) -> Thread {
    Thread {
      id: ThreadId(id),
      title: title.to_string(),
      ..Default::default()
    }
  }

  fn open_temp() -> (TempDir, SqliteStorage) {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let storage = SqliteStorage::open_at(&dir.path().join("nested").join("cache.db"))
      .expect("Failed to open cache");
    (dir, storage)
  }

  #[test]
  fn test_missing_key_is_a_miss() {
    let (_dir, storage) = open_temp();
    assert_eq!(storage.load("nothing").unwrap(), None);
  }

  #[test]
  fn test_save_then_load_keeps_order_and_timestamp() {
    let (_dir, storage) = open_temp();
    let entry = CacheEntry {
      snapshot: vec![thread(2, "second"), thread(1, "first")],
      last_updated: Some(Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()),
    };

    storage.save("k", &entry).unwrap();
    assert_eq!(storage.load("k").unwrap(), Some(entry));
  }

  #[test]
  fn test_save_replaces_previous_snapshot() {
    let (_dir, storage) = open_temp();
    storage
      .save(
        "k",
        &CacheEntry {
          snapshot: vec![thread(1, "old")],
          last_updated: None,
        },
      )
      .unwrap();
    storage
      .save(
        "k",
        &CacheEntry {
          snapshot: vec![thread(5, "new")],
          last_updated: None,
        },
      )
      .unwrap();

    let loaded = storage.load("k").unwrap().unwrap();
    assert_eq!(loaded.snapshot, vec![thread(5, "new")]);
  }

  #[test]
  fn test_corrupted_blob_is_a_miss() {
    let (_dir, storage) = open_temp();
    storage
      .conn
      .lock()
      .unwrap()
      .execute(
        "INSERT INTO snapshot_cache (cache_key, data, thread_count) VALUES ('k', ?, 1)",
        params![b"{not json".to_vec()],
      )
      .unwrap();

    assert_eq!(storage.load("k").unwrap(), None);
  }

  #[test]
  fn test_unreadable_timestamp_keeps_data() {
    let (_dir, storage) = open_temp();
    let data = serde_json::to_vec(&vec![thread(1, "kept")]).unwrap();
    storage
      .conn
      .lock()
      .unwrap()
      .execute(
        "INSERT INTO snapshot_cache (cache_key, data, thread_count, last_updated)
         VALUES ('k', ?, 1, 'garbage')",
        params![data],
      )
      .unwrap();

    let loaded = storage.load("k").unwrap().unwrap();
    assert_eq!(loaded.snapshot.len(), 1);
    assert_eq!(loaded.last_updated, None);
  }

  #[test]
  fn test_reopen_sees_previous_writes() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("cache.db");
    let entry = CacheEntry {
      snapshot: vec![thread(9, "persisted")],
      last_updated: None,
    };

    SqliteStorage::open_at(&path).unwrap().save("k", &entry).unwrap();
    let reopened = SqliteStorage::open_at(&path).unwrap();
    assert_eq!(reopened.load("k").unwrap(), Some(entry));
  }

  #[test]
  fn test_deep_reply_chain_survives_reload() {
    let (_dir, storage) = open_temp();
    let chain: Vec<Comment> = (1..=200)
      .map(|id| Comment {
        id: CommentId(id),
        parent_comment_id: (id > 1).then(|| CommentId(id - 1)),
        ..Default::default()
      })
      .collect();
    let entry = CacheEntry {
      snapshot: vec![
        Thread {
          comments: Some(tree::build(&chain)),
          ..thread(1, "deep")
        },
        thread(2, "shallow"),
      ],
      last_updated: None,
    };

    storage.save("k", &entry).unwrap();
    assert_eq!(storage.load("k").unwrap(), Some(entry));
  }

  #[test]
  fn test_noop_storage_never_hits() {
    let storage = NoopStorage;
    storage.save("k", &CacheEntry::default()).unwrap();
    assert_eq!(storage.load("k").unwrap(), None);
  }
}
