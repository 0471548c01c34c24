//! Client-side sync layer for a remote discussion board: a paginated,
//! persisted thread collection with comment forests built from flat lists.

pub mod cache;
pub mod config;
pub mod error;
pub mod forum;
pub mod logging;
pub mod store;

pub use cache::{CacheLayer, CacheSource, InitOutcome, NoopStorage, SnapshotStorage, SqliteStorage};
pub use config::Config;
pub use error::{Result, SyncError};
pub use forum::client::ForumClient;
pub use forum::transport::{ReqwestTransport, Transport};
pub use store::{StoreState, ThreadStore};
