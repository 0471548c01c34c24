//! When a cached snapshot may be served without refetching.

use chrono::{DateTime, Duration, Utc};

/// How long before cached data is considered stale, unless configured.
pub fn default_ttl() -> Duration {
  Duration::minutes(5)
}

/// A snapshot is stale once more than `ttl` has passed since `last_updated`.
/// A snapshot that was never stamped is always stale.
pub fn is_stale(last_updated: Option<DateTime<Utc>>, now: DateTime<Utc>, ttl: Duration) -> bool {
  match last_updated {
    Some(last_updated) => now - last_updated > ttl,
    None => true,
  }
}
