//! Built comment forests, memoized per thread.

use parking_lot::Mutex;
use std::collections::HashMap;

use crate::forum::tree;
use crate::forum::types::{CommentId, Forest, ThreadId};

/// Derived view over thread comments. Never authoritative: every mutation of
/// a thread's comments must `invalidate` it before the next `get`.
#[derive(Default)]
pub struct CommentResultCache {
  forests: Mutex<HashMap<ThreadId, Forest>>,
}

impl CommentResultCache {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn get(&self, thread_id: ThreadId) -> Option<Forest> {
    self.forests.lock().get(&thread_id).cloned()
  }

  pub fn put(&self, thread_id: ThreadId, forest: Forest) {
    self.forests.lock().insert(thread_id, forest);
  }

  pub fn invalidate(&self, thread_id: ThreadId) {
    if self.forests.lock().remove(&thread_id).is_some() {
      tracing::debug!(%thread_id, "invalidated cached comment forest");
    }
  }

  /// Drop every forest holding `comment_id`, whichever thread it belongs to.
  pub fn invalidate_containing(&self, comment_id: CommentId) {
    self.forests.lock().retain(|thread_id, forest| {
      let holds = tree::find(forest, comment_id).is_some();
      if holds {
        tracing::debug!(%thread_id, %comment_id, "invalidated cached comment forest");
      }
      !holds
    });
  }

  pub fn clear(&self) {
    self.forests.lock().clear();
  }

  pub fn len(&self) -> usize {
    self.forests.lock().len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::forum::types::Comment;

  fn forest(ids: &[u64]) -> Forest {
    let comments: Vec<Comment> = ids
      .iter()
      .map(|&id| Comment {
        id: CommentId(id),
        ..Default::default()
      })
      .collect();
    tree::build(&comments)
  }

  #[test]
  fn test_put_then_get() {
    let cache = CommentResultCache::new();
    cache.put(ThreadId(1), forest(&[1, 2]));

    assert_eq!(cache.get(ThreadId(1)), Some(forest(&[1, 2])));
    assert_eq!(cache.get(ThreadId(2)), None);
  }

  #[test]
  fn test_invalidate_only_touches_one_thread() {
    let cache = CommentResultCache::new();
    cache.put(ThreadId(1), forest(&[1]));
    cache.put(ThreadId(2), forest(&[2]));

    cache.invalidate(ThreadId(1));
    assert_eq!(cache.get(ThreadId(1)), None);
    assert!(cache.get(ThreadId(2)).is_some());
    assert_eq!(cache.len(), 1);
  }

  #[test]
  fn test_put_replaces_forest() {
    let cache = CommentResultCache::new();
    cache.put(ThreadId(1), forest(&[1]));
    cache.put(ThreadId(1), forest(&[3, 4]));
    assert_eq!(cache.get(ThreadId(1)).map(|f| f.len()), Some(2));
  }

  #[test]
  fn test_invalidate_containing_finds_owner_by_comment() {
    let cache = CommentResultCache::new();
    cache.put(ThreadId(1), forest(&[1, 2]));
    cache.put(ThreadId(2), forest(&[3]));

    cache.invalidate_containing(CommentId(2));
    assert_eq!(cache.get(ThreadId(1)), None);
    assert!(cache.get(ThreadId(2)).is_some());
  }

  #[test]
  fn test_clear() {
    let cache = CommentResultCache::new();
    cache.put(ThreadId(1), forest(&[1]));
    cache.clear();
    assert!(cache.is_empty());
  }
}
