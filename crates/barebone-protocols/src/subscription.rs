//! Explicit subscription handles.

use std::fmt;

use parking_lot::Mutex;

type Cancel = Box<dyn FnOnce() + Send>;

/// Handle returned by a host subscription.
///
/// Dropping the handle does not cancel it; call [`Subscription::unsubscribe`].
pub struct Subscription {
    cancel: Mutex<Option<Cancel>>,
}

impl Subscription {
    /// Create a subscription that runs `cancel` on the first unsubscribe.
    pub fn new<F>(cancel: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            cancel: Mutex::new(Some(Box::new(cancel))),
        }
    }

    /// A subscription with nothing to cancel.
    pub fn inert() -> Self {
        Self {
            cancel: Mutex::new(None),
        }
    }

    /// Cancel the subscription. Later calls do nothing.
    ///
    /// The cancel hook runs after the internal lock is released, so it may
    /// re-enter the host freely.
    pub fn unsubscribe(&self) {
        let cancel = self.cancel.lock().take();
        if let Some(cancel) = cancel {
            cancel();
        }
    }

    pub fn is_active(&self) -> bool {
        self.cancel.lock().is_some()
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}
