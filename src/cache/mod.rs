//! Caching for the thread collection and its comment forests.
//!
//! - A persisted snapshot of the collection with the time it was fetched
//! - A freshness policy deciding whether that snapshot can be served
//! - Memoized comment forests per thread, dropped whenever they may be stale

mod comments;
mod freshness;
mod layer;
mod source;
mod storage;

pub use comments::CommentResultCache;
pub use freshness::{default_ttl, is_stale};
pub use layer::CacheLayer;
pub use source::{CacheSource, InitOutcome};
#[cfg(test)]
pub(crate) use storage::MemoryStorage;
pub use storage::{CacheEntry, NoopStorage, SnapshotStorage, SqliteStorage};
