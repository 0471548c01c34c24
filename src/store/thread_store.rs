//! Paginated thread store kept in sync with the forum API.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::cache::{CacheEntry, CacheLayer, CommentResultCache, InitOutcome, SnapshotStorage};
use crate::config::StoreConfig;
use crate::error::Result;
use crate::forum::api_types::VoteCounts;
use crate::forum::client::ForumClient;
use crate::forum::transport::Transport;
use crate::forum::tree;
use crate::forum::types::{
  Comment, CommentId, CommentNode, CommentType, Forest, Resolution, Thread, ThreadId,
};

use super::clock::{Clock, SystemClock};
use super::debounce::Debouncer;
use super::state::StoreState;

/// Local copy of the thread collection and its comment forests.
///
/// Remote mutations are applied only once the server has confirmed them.
/// Every change to the collection is written to the cache after a quiet
/// period, never synchronously.
pub struct ThreadStore<T: Transport, S: SnapshotStorage> {
  client: ForumClient<T>,
  cache: CacheLayer<S>,
  comments: CommentResultCache,
  state: watch::Sender<StoreState>,
  persist: Debouncer,
  clock: Arc<dyn Clock>,
  page_size: u32,
  /// Page fetches in flight; `is_loading` is set while this is non-zero
  in_flight: AtomicUsize,
  disposed: AtomicBool,
}

impl<T: Transport, S: SnapshotStorage> ThreadStore<T, S> {
  pub fn new(client: ForumClient<T>, cache: CacheLayer<S>, config: &StoreConfig) -> Self {
    let (state, _) = watch::channel(StoreState::default());

    Self {
      client,
      cache: cache.with_stale_time(config.cache_ttl()),
      comments: CommentResultCache::new(),
      state,
      persist: Debouncer::new(config.persist_debounce()),
      clock: Arc::new(SystemClock),
      page_size: config.page_size.max(1),
      in_flight: AtomicUsize::new(0),
      disposed: AtomicBool::new(false),
    }
  }

  /// Use another clock for timestamps and freshness checks.
  pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
    self.clock = clock;
    self
  }

  // ==========================================================================
  // Current value accessors
  // ==========================================================================

  pub fn snapshot(&self) -> StoreState {
    self.state.borrow().clone()
  }

  pub fn threads(&self) -> Vec<Thread> {
    self.state.borrow().threads.clone()
  }

  pub fn thread(&self, id: ThreadId) -> Option<Thread> {
    self.state.borrow().thread(id).cloned()
  }

  pub fn is_loading(&self) -> bool {
    self.state.borrow().is_loading
  }

  pub fn has_more_pages(&self) -> bool {
    self.state.borrow().has_more_pages
  }

  pub fn current_page(&self) -> u32 {
    self.state.borrow().current_page
  }

  pub fn page_size(&self) -> u32 {
    self.page_size
  }

  /// Receive every state change from now on.
  pub fn subscribe(&self) -> watch::Receiver<StoreState> {
    self.state.subscribe()
  }

  pub fn comment_cache(&self) -> &CommentResultCache {
    &self.comments
  }

  // ==========================================================================
  // Collection
  // ==========================================================================

  /// Load the collection: from the cache if fresh, otherwise page 0 from
  /// the network.
  ///
  /// Never fails. If the fetch fails the store serves whatever snapshot was
  /// cached, however old, or stays empty; the outcome reports this as
  /// `Offline` so callers know the data is best effort.
  pub async fn initialize(&self) -> InitOutcome {
    let now = self.clock.now();

    let cached = match self.cache.load() {
      Some(entry) if !self.cache.is_stale(entry.last_updated, now) => {
        debug!(threads = entry.snapshot.len(), "serving fresh thread snapshot");
        let outcome = InitOutcome::from_cache(entry.snapshot.len(), entry.last_updated);
        self.restore(entry);
        return outcome;
      }
      other => other,
    };

    match self.fetch_page(0).await {
      Ok(_) => InitOutcome::from_network(self.state.borrow().threads.len()),
      Err(e) => {
        warn!(error = %e, "initial thread fetch failed, serving cached threads");
        match cached {
          Some(entry) => {
            let outcome = InitOutcome::offline(entry.snapshot.len(), entry.last_updated);
            self.restore(entry);
            outcome
          }
          None => InitOutcome::offline(self.state.borrow().threads.len(), None),
        }
      }
    }
  }

  /// Fetch page `page` and merge it: page 0 replaces the collection, any
  /// other page is appended as is. Returns the number of threads received.
  ///
  /// Pages are not de-duplicated; requesting a page already merged
  /// duplicates its threads.
  pub async fn fetch_page(&self, page: u32) -> Result<usize> {
    let _loading = LoadingGuard::start(&self.state, &self.in_flight);

    let fetched = self.client.fetch_page(page, self.page_size).await?;
    let count = fetched.items.len();
    let now = self.clock.now();

    self.state.send_modify(|state| {
      if page == 0 {
        state.threads = fetched.items;
      } else {
        state.threads.extend(fetched.items);
      }
      state.current_page = page;
      state.has_more_pages = !fetched.is_last_page;
      state.last_fetched = Some(now);
    });

    if page == 0 {
      // The collection was reset, so every memoized forest is unowned
      self.comments.clear();
    }

    info!(page, count, last = fetched.is_last_page, "merged thread page");
    self.schedule_persist();
    Ok(count)
  }

  /// Fetch the page after the current one. `Ok(false)` without a request
  /// when the server said there are no more pages.
  pub async fn load_more(&self) -> Result<bool> {
    let next = {
      let state = self.state.borrow();
      if !state.has_more_pages {
        None
      } else if state.threads.is_empty() && state.last_fetched.is_none() {
        // Nothing loaded yet
        Some(0)
      } else {
        Some(state.current_page + 1)
      }
    };

    match next {
      Some(page) => {
        self.fetch_page(page).await?;
        Ok(true)
      }
      None => {
        debug!("no more thread pages to load");
        Ok(false)
      }
    }
  }

  /// Force a fresh page 0, ignoring cache freshness.
  pub async fn refresh(&self) -> Result<usize> {
    self.fetch_page(0).await
  }

  /// Merge `thread` over the one with the same id, or append it.
  ///
  /// A merge keeps the existing comments (only comment operations replace
  /// them) and stamps `updated_at` with the current time.
  pub fn upsert_thread(&self, thread: Thread) {
    let now = self.clock.now();

    self.state.send_modify(|state| match state.thread_mut(thread.id) {
      Some(existing) => {
        let comments = existing.comments.take();
        *existing = Thread {
          comments,
          updated_at: now,
          ..thread
        };
      }
      None => state.threads.push(thread),
    });

    self.schedule_persist();
  }

  // ==========================================================================
  // Votes
  // ==========================================================================

  /// Vote on a thread. Local counts change only after the server answers,
  /// and then to the server's numbers.
  pub async fn vote_thread(&self, thread_id: ThreadId, is_upvote: bool) -> Result<VoteCounts> {
    let counts = self.client.vote_thread(thread_id, is_upvote).await?;

    if self.modify_thread(thread_id, |thread| thread.apply_vote(&counts, is_upvote)) {
      self.schedule_persist();
    } else {
      debug!(%thread_id, "voted on a thread not held locally");
    }

    Ok(counts)
  }

  /// Vote on a comment, patching it in place in whichever loaded forest
  /// contains it.
  pub async fn vote_comment(&self, comment_id: CommentId, is_upvote: bool) -> Result<VoteCounts> {
    let counts = self.client.vote_comment(comment_id, is_upvote).await?;

    let patched = self.state.send_if_modified(|state| {
      for thread in state.threads.iter_mut() {
        let next = match &thread.comments {
          Some(forest) if tree::find(forest, comment_id).is_some() => {
            tree::patch(forest, comment_id, |node| {
              node.map_comment(|comment| comment.apply_vote(&counts, is_upvote))
            })
          }
          _ => continue,
        };
        thread.comments = Some(next);
        return true;
      }
      false
    });

    // Memoized forests can exist for threads outside the collection
    self.comments.invalidate_containing(comment_id);
    if patched {
      self.schedule_persist();
    } else {
      debug!(%comment_id, "voted on a comment not held locally");
    }

    Ok(counts)
  }

  // ==========================================================================
  // Comments
  // ==========================================================================

  /// The comment forest of a thread.
  ///
  /// Served from the memo, then from the forest the thread already holds
  /// (kept current by local mutations, or restored from the snapshot), and
  /// only then built from the server's flat list, which replaces the
  /// thread's `comments`.
  pub async fn comments(&self, thread_id: ThreadId) -> Result<Forest> {
    if let Some(forest) = self.comments.get(thread_id) {
      debug!(%thread_id, "comment forest cache hit");
      return Ok(forest);
    }

    let held = self
      .state
      .borrow()
      .thread(thread_id)
      .and_then(|thread| thread.comments.clone());
    if let Some(forest) = held {
      debug!(%thread_id, "serving held comment forest");
      self.comments.put(thread_id, forest.clone());
      return Ok(forest);
    }

    self.fetch_comments(thread_id).await
  }

  /// Refetch the thread's comments, ignoring both the memo and the held
  /// forest.
  pub async fn refresh_comments(&self, thread_id: ThreadId) -> Result<Forest> {
    self.comments.invalidate(thread_id);
    self.fetch_comments(thread_id).await
  }

  async fn fetch_comments(&self, thread_id: ThreadId) -> Result<Forest> {
    let flat = self.client.fetch_comments(thread_id).await?;
    let forest = tree::build(&flat);
    debug!(%thread_id, comments = flat.len(), roots = forest.len(), "built comment forest");

    self.comments.put(thread_id, forest.clone());
    let stored = forest.clone();
    if self.modify_thread(thread_id, move |thread| thread.comments = Some(stored)) {
      self.schedule_persist();
    }

    Ok(forest)
  }

  /// Create a comment, then place it in the thread's loaded forest: as a
  /// root, or under its parent at any depth.
  ///
  /// When the parent isn't in the loaded forest (comments not fetched yet)
  /// the created comment is returned but left out of the tree.
  pub async fn add_comment(
    &self,
    thread_id: ThreadId,
    content: &str,
    parent_comment_id: Option<CommentId>,
    comment_type: Option<CommentType>,
  ) -> Result<Comment> {
    let created = self
      .client
      .create_comment(thread_id, content, parent_comment_id, comment_type)
      .await?;

    self.comments.invalidate(thread_id);

    let node = CommentNode::leaf(created.clone());
    let mut held = false;
    let inserted = self.state.send_if_modified(|state| {
      let Some(thread) = state.thread_mut(thread_id) else {
        return false;
      };
      held = true;

      let next = match (parent_comment_id, &thread.comments) {
        (None, comments) => {
          let mut forest = comments.clone().unwrap_or_default();
          forest.push(Arc::new(node));
          Some(forest)
        }
        (Some(parent), Some(forest)) => tree::insert_reply(forest, parent, node),
        (Some(_), None) => None,
      };

      match next {
        Some(forest) => {
          thread.comments = Some(forest);
          true
        }
        None => false,
      }
    });

    if inserted {
      self.schedule_persist();
    } else if held {
      warn!(
        %thread_id,
        comment_id = %created.id,
        parent = ?parent_comment_id,
        "parent comment not loaded, new comment left out of the tree"
      );
    } else {
      debug!(%thread_id, "commented on a thread not held locally");
    }

    Ok(created)
  }

  /// Mark a comment as the thread's best answer.
  ///
  /// Only root comments are toggled: the flag is cleared on the other roots
  /// but a reply previously marked keeps its flag.
  pub async fn mark_best_answer(&self, thread_id: ThreadId, comment_id: CommentId) -> Result<()> {
    self.client.mark_best_answer(thread_id, comment_id).await?;
    self.comments.invalidate(thread_id);

    let changed = self.modify_thread(thread_id, |thread| {
      if let Some(forest) = thread.comments.take() {
        thread.comments = Some(tree::mark_best_answer(&forest, comment_id));
      }
    });
    if changed {
      self.schedule_persist();
    }

    Ok(())
  }

  // ==========================================================================
  // Resolution
  // ==========================================================================

  pub async fn resolve_post(&self, thread_id: ThreadId, resolution: Resolution) -> Result<()> {
    self.client.resolve(thread_id, &resolution).await?;
    self.comments.invalidate(thread_id);

    let resolution = Resolution {
      resolved_at: resolution.resolved_at.or_else(|| Some(self.clock.now())),
      ..resolution
    };
    if self.modify_thread(thread_id, move |thread| {
      thread.solved = true;
      thread.resolution = Some(resolution);
    }) {
      self.schedule_persist();
    }

    Ok(())
  }

  pub async fn unresolve_post(&self, thread_id: ThreadId) -> Result<()> {
    self.client.unresolve(thread_id).await?;
    self.comments.invalidate(thread_id);

    if self.modify_thread(thread_id, |thread| {
      thread.solved = false;
      thread.resolution = None;
    }) {
      self.schedule_persist();
    }

    Ok(())
  }

  // ==========================================================================
  // Persistence and lifecycle
  // ==========================================================================

  /// Write the collection now instead of waiting for the quiet period.
  pub fn flush(&self) -> color_eyre::Result<()> {
    self.persist.cancel();
    self.cache.store(&cache_entry(&self.state.borrow()))
  }

  /// Stop all background work. Nothing is written after this returns,
  /// though later calls still update the in-memory state.
  pub fn dispose(&self) {
    self.disposed.store(true, Ordering::SeqCst);
    if self.persist.cancel() {
      debug!("dropped pending snapshot write");
    }
    self.comments.clear();
  }

  fn restore(&self, entry: CacheEntry) {
    let page_size = self.page_size;
    self
      .state
      .send_modify(|state| state.restore(entry.snapshot, entry.last_updated, page_size));
  }

  /// Apply `f` to the thread with `id`. False (and no notification) when the
  /// thread isn't held.
  fn modify_thread(&self, id: ThreadId, f: impl FnOnce(&mut Thread)) -> bool {
    self.state.send_if_modified(|state| match state.thread_mut(id) {
      Some(thread) => {
        f(thread);
        true
      }
      None => false,
    })
  }

  fn schedule_persist(&self) {
    if self.disposed.load(Ordering::SeqCst) {
      return;
    }

    let state = self.state.subscribe();
    let cache = self.cache.clone();

    self.persist.schedule(async move {
      let entry = cache_entry(&state.borrow());
      if let Err(e) = cache.store(&entry) {
        warn!(error = %e, "failed to persist thread snapshot");
      }
    });
  }
}

fn cache_entry(state: &StoreState) -> CacheEntry {
  CacheEntry {
    snapshot: state.threads.clone(),
    last_updated: state.last_fetched,
  }
}

/// Marks the store as loading for as long as at least one guard is alive.
struct LoadingGuard<'a> {
  state: &'a watch::Sender<StoreState>,
  in_flight: &'a AtomicUsize,
}

impl<'a> LoadingGuard<'a> {
  fn start(state: &'a watch::Sender<StoreState>, in_flight: &'a AtomicUsize) -> Self {
    in_flight.fetch_add(1, Ordering::SeqCst);
    state.send_if_modified(|state| !std::mem::replace(&mut state.is_loading, true));
    Self { state, in_flight }
  }
}

impl Drop for LoadingGuard<'_> {
  fn drop(&mut self) {
    if self.in_flight.fetch_sub(1, Ordering::SeqCst) == 1 {
      self
        .state
        .send_if_modified(|state| std::mem::replace(&mut state.is_loading, false));
    }
  }
}
