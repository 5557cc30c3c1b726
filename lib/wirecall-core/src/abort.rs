//! Cancellation signal shared between a request and whoever may cancel it.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Notify;

#[derive(Debug, Default)]
struct AbortState {
    aborted: AtomicBool,
    notify: Notify,
}

/// Handle used to abort an in-flight request.
///
/// Clones share the same signal. Aborting is idempotent: only the first call
/// flips the flag and wakes waiters.
///
/// # Example
///
/// ```
/// use wirecall_core::AbortHandle;
///
/// let handle = AbortHandle::new();
/// let observer = handle.clone();
/// handle.abort();
/// assert!(observer.is_aborted());
/// ```
#[derive(Debug, Clone, Default)]
pub struct AbortHandle {
    state: Arc<AbortState>,
}

impl AbortHandle {
    /// Create a new, non-aborted handle.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Signal the abort. Returns `false` if the handle was already aborted.
    pub fn abort(&self) -> bool {
        let first = !self.state.aborted.swap(true, Ordering::AcqRel);
        if first {
            self.state.notify.notify_waiters();
        }
        first
    }

    /// Returns `true` once [`abort`](Self::abort) has been called.
    #[must_use]
    pub fn is_aborted(&self) -> bool {
        self.state.aborted.load(Ordering::Acquire)
    }

    /// Completes when the handle is aborted.
    pub async fn aborted(&self) {
        loop {
            // registered before the flag check so a concurrent abort is never missed
            let notified = self.state.notify.notified();
            if self.is_aborted() {
                return;
            }
            notified.await;
        }
    }
}
