use chrono::{DateTime, Utc};

use crate::forum::types::{Thread, ThreadId};

/// Everything the store exposes to readers and subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreState {
  /// Threads in collection order
  pub threads: Vec<Thread>,
  /// Index of the last page merged into `threads`
  pub current_page: u32,
  pub has_more_pages: bool,
  pub is_loading: bool,
  /// Last successful page fetch; persisted along with `threads`
  pub last_fetched: Option<DateTime<Utc>>,
}

impl Default for StoreState {
  fn default() -> Self {
    Self {
      threads: Vec::new(),
      current_page: 0,
      has_more_pages: true,
      is_loading: false,
      last_fetched: None,
    }
  }
}

impl StoreState {
  pub fn thread(&self, id: ThreadId) -> Option<&Thread> {
    self.threads.iter().find(|t| t.id == id)
  }

  pub fn thread_mut(&mut self, id: ThreadId) -> Option<&mut Thread> {
    self.threads.iter_mut().find(|t| t.id == id)
  }

  /// Replace the collection with a persisted snapshot.
  ///
  /// The page cursor isn't persisted, so it is derived from the snapshot
  /// length: only a full final page can be followed by more.
  pub fn restore(
    &mut self,
    snapshot: Vec<Thread>,
    last_fetched: Option<DateTime<Utc>>,
    page_size: u32,
  ) {
    let len = snapshot.len() as u32;
    let page_size = page_size.max(1);

    self.current_page = len.div_ceil(page_size).saturating_sub(1);
    self.has_more_pages = len > 0 && len % page_size == 0;
    self.threads = snapshot;
    self.last_fetched = last_fetched;
  }
}
