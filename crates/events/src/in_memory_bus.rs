//! In-process listener registry.

use std::sync::{Arc, Mutex, PoisonError, Weak};

use crate::bus::{Listener, Publisher, Subscription};

struct Registry<M> {
    next_id: u64,
    entries: Vec<(u64, Listener<M>)>,
}

/// In-memory fan-out to registered listeners.
///
/// - No IO / no async
/// - Listeners are snapshotted before delivery; the lock is never held while
///   a listener runs
pub struct Listeners<M> {
    inner: Arc<Mutex<Registry<M>>>,
}

impl<M> Listeners<M> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Deliver `message` to every currently registered listener.
    ///
    /// Returns the number of listeners notified.
    pub fn publish(&self, message: &M) -> usize {
        let snapshot: Vec<Listener<M>> = self
            .lock()
            .entries
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect();

        for listener in &snapshot {
            listener(message);
        }

        snapshot.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Registry<M>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<M> Default for Listeners<M> {
    fn default() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Registry {
                next_id: 0,
                entries: Vec::new(),
            })),
        }
    }
}

impl<M> core::fmt::Debug for Listeners<M> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Listeners").field("len", &self.len()).finish()
    }
}

impl<M> Publisher<M> for Listeners<M>
where
    M: 'static,
{
    fn subscribe(&self, listener: Listener<M>) -> Subscription {
        let id = {
            let mut registry = self.lock();
            let id = registry.next_id;
            registry.next_id += 1;
            registry.entries.push((id, listener));
            id
        };

        // Weak: an outstanding subscription must not keep the registry alive.
        let registry: Weak<Mutex<Registry<M>>> = Arc::downgrade(&self.inner);
        Subscription::new(move || {
            if let Some(registry) = registry.upgrade() {
                let mut registry = registry.lock().unwrap_or_else(PoisonError::into_inner);
                registry.entries.retain(|(entry_id, _)| *entry_id != id);
                tracing::trace!(listener_id = id, "listener detached");
            }
        })
    }
}
