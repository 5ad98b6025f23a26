//! Cancellation handles returned by the bus and the store.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Lock a mutex, recovering the guard if a previous holder panicked.
///
/// Callbacks never run while one of the core's locks is held, so a
/// poisoned lock can only result from a panic inside the core itself and
/// the protected data is still consistent.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

type CancelFn = Box<dyn FnOnce() + Send>;

/// Handle to a registered handler or subscriber.
///
/// The registration stays alive until [`cancel`](Self::cancel) is called.
/// Dropping the handle does **not** cancel it; a subscription has no
/// automatic expiry. Cancelling is idempotent and clones share the same
/// registration.
#[derive(Clone)]
pub struct Subscription {
    cancel: Arc<Mutex<Option<CancelFn>>>,
}

impl Subscription {
    /// Wrap the closure that removes the registration.
    pub(crate) fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Arc::new(Mutex::new(Some(Box::new(cancel)))),
        }
    }

    /// A handle whose registration is already gone.
    pub fn inert() -> Self {
        Self {
            cancel: Arc::new(Mutex::new(None)),
        }
    }

    /// Remove the registration. Later calls are no-ops.
    pub fn cancel(&self) {
        let cancel = lock(&self.cancel).take();
        if let Some(cancel) = cancel {
            cancel();
        }
    }

    /// Whether [`cancel`](Self::cancel) has already run.
    pub fn is_cancelled(&self) -> bool {
        lock(&self.cancel).is_none()
    }
}

impl core::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Subscription")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[test]
    fn cancel_runs_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let sub = Subscription::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let clone = sub.clone();
        sub.cancel();
        clone.cancel();
        sub.cancel();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(clone.is_cancelled());
    }

    #[test]
    fn inert_handle_is_already_cancelled() {
        let sub = Subscription::inert();
        assert!(sub.is_cancelled());
        sub.cancel();
    }
}
