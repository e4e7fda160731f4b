//! Cooperative cancellation for in-flight pipeline runs.
//!
//! Built on a tokio watch channel: the shell holds a [`CancelHandle`], the
//! pipeline and every outstanding inference call hold cloned [`CancelFlag`]s.
//! Cancellation is cooperative, not forceful — the orchestrator stops
//! dispatching steps and in-flight describe calls return early at their next
//! await point; partially applied mutations are left as-is, matching the
//! orchestrator's non-transactional contract.

use tokio::sync::watch;

/// Sender half. Dropping the handle without calling [`CancelHandle::cancel`]
/// never cancels the run.
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    /// Create a handle and its first flag.
    pub fn new() -> (Self, CancelFlag) {
        let (tx, rx) = watch::channel(false);
        (Self { tx }, CancelFlag { rx })
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        // Send only fails when every flag is gone, in which case nobody is
        // listening anyway.
        let _ = self.tx.send(true);
    }

    /// Another flag observing this handle.
    pub fn flag(&self) -> CancelFlag {
        CancelFlag {
            rx: self.tx.subscribe(),
        }
    }
}

/// Receiver half, cheap to clone into every concurrent worker.
#[derive(Clone)]
pub struct CancelFlag {
    rx: watch::Receiver<bool>,
}

impl CancelFlag {
    /// A flag that can never fire. Used by entry points without a caller
    /// handle.
    pub fn never() -> Self {
        let (tx, rx) = watch::channel(false);
        // Leak-free: the sender is dropped here; `cancelled()` then pends
        // forever and `is_cancelled()` stays false.
        drop(tx);
        Self { rx }
    }

    /// Non-blocking check, used between plan steps.
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves when cancellation is requested; pends forever otherwise.
    /// Race against work with `tokio::select!`.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        loop {
            if *rx.borrow() {
                return;
            }
            if rx.changed().await.is_err() {
                // Sender dropped without cancelling: never resolve.
                std::future::pending::<()>().await;
            }
        }
    }
}
