//! Listener subscription abstraction (mechanics only).
//!
//! The services in this workspace (session monitor, role resolver, route
//! guards) publish state transitions to in-process listeners. A listener is a
//! plain callback; a [`Subscription`] is the handle that detaches it.
//!
//! ## Delivery
//!
//! - Listeners are invoked synchronously, in subscription order, on the task
//!   that publishes.
//! - Listeners are never invoked while the publisher holds an internal lock,
//!   so a listener may call back into the service that notified it.
//! - A listener that is unsubscribed while a publication is in flight may
//!   still observe that one publication, but no later ones.

use std::sync::{Arc, Mutex, PoisonError};

/// Callback notified with every published message.
pub type Listener<M> = Arc<dyn Fn(&M) + Send + Sync>;

type Cancel = Box<dyn FnOnce() + Send>;

/// Handle for an active listener registration.
///
/// Teardown is idempotent: the underlying cancel action runs at most once,
/// whether triggered by [`Subscription::unsubscribe`] or by drop.
#[must_use = "dropping a Subscription immediately unsubscribes the listener"]
pub struct Subscription {
    cancel: Mutex<Option<Cancel>>,
}

impl Subscription {
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Mutex::new(Some(Box::new(cancel))),
        }
    }

    /// A subscription with nothing to tear down.
    pub fn noop() -> Self {
        Self {
            cancel: Mutex::new(None),
        }
    }

    /// Detach the listener. Calling this more than once is a no-op.
    pub fn unsubscribe(&self) {
        let cancel = self
            .cancel
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        if let Some(cancel) = cancel {
            cancel();
        }
    }

    pub fn is_active(&self) -> bool {
        self.cancel
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl core::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}

/// Something listeners can subscribe to.
///
/// Implementations must be safe to share across tasks.
pub trait Publisher<M>: Send + Sync {
    fn subscribe(&self, listener: Listener<M>) -> Subscription;
}

impl<M, P> Publisher<M> for Arc<P>
where
    P: Publisher<M> + ?Sized,
{
    fn subscribe(&self, listener: Listener<M>) -> Subscription {
        (**self).subscribe(listener)
    }
}
