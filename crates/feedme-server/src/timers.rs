//! One-shot cancelable timers
//!
//! Thin wrapper over a spawned tokio task. A timer fires at most once;
//! dropping or canceling the handle aborts the task, and cancellation is
//! idempotent. No protocol logic lives here.

use std::time::Duration;

use tokio::task::JoinHandle;

pub(crate) struct Timer {
    handle: JoinHandle<()>,
}

impl Timer {
    /// Schedule `f` to run once after `delay`.
    pub(crate) fn schedule<F>(delay: Duration, f: F) -> Timer
    where
        F: FnOnce() + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            f();
        });
        Timer { handle }
    }

    pub(crate) fn cancel(&self) {
        self.handle.abort();
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
