//! Coalescing of bursts of work into a single run after a quiet period.

use parking_lot::Mutex;
use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Runs only the most recently scheduled task, once `delay` has passed
/// without another `schedule`.
///
/// Must be used from within a tokio runtime. Dropping the debouncer cancels
/// whatever is still pending.
pub struct Debouncer {
  delay: Duration,
  pending: Mutex<Option<JoinHandle<()>>>,
}

impl Debouncer {
  pub fn new(delay: Duration) -> Self {
    Self {
      delay,
      pending: Mutex::new(None),
    }
  }

  pub fn delay(&self) -> Duration {
    self.delay
  }

  /// Schedule `task`, replacing any task not yet started.
  pub fn schedule<F>(&self, task: F)
  where
    F: Future<Output = ()> + Send + 'static,
  {
    let delay = self.delay;
    let handle = tokio::spawn(async move {
      tokio::time::sleep(delay).await;
      task.await;
    });

    if let Some(previous) = self.pending.lock().replace(handle) {
      previous.abort();
    }
  }

  /// Drop the pending task, if any. Returns whether one was still waiting.
  pub fn cancel(&self) -> bool {
    match self.pending.lock().take() {
      Some(handle) => {
        let waiting = !handle.is_finished();
        handle.abort();
        waiting
      }
      None => false,
    }
  }

  /// Whether a scheduled task has not finished yet.
  pub fn is_pending(&self) -> bool {
    self
      .pending
      .lock()
      .as_ref()
      .is_some_and(|handle| !handle.is_finished())
  }
}

impl Drop for Debouncer {
  fn drop(&mut self) {
    self.cancel();
  }
}
