//! Tracks the authenticated principal over time.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use serde::Serialize;

use tenantgate_auth::{Principal, Session, validate_session};
use tenantgate_events::{Listener, Listeners, Publisher, Subscription};

use crate::provider::AuthProvider;

/// Authentication status as observed from the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "principal", rename_all = "snake_case")]
pub enum AuthStatus {
    /// Not determined yet (before the first provider answer).
    Unknown,
    Anonymous,
    Authenticated(Principal),
}

impl AuthStatus {
    pub fn principal(&self) -> Option<&Principal> {
        match self {
            AuthStatus::Authenticated(principal) => Some(principal),
            _ => None,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, AuthStatus::Unknown)
    }

    fn from_session(session: Option<&Session>) -> Self {
        let Some(session) = session else {
            return AuthStatus::Anonymous;
        };

        match validate_session(session, Utc::now()) {
            Ok(()) => AuthStatus::Authenticated(session.principal.clone()),
            Err(err) => {
                tracing::warn!(
                    principal_id = %session.principal.id,
                    error = %err,
                    "provider reported an expired session; treating as signed out"
                );
                AuthStatus::Anonymous
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Active,
    TornDown,
}

struct MonitorState {
    status: AuthStatus,
    phase: Phase,
    /// Bumped on every provider notification; lets the initial fetch detect
    /// that a newer notification already landed.
    generation: u64,
    provider_subscription: Option<Subscription>,
}

struct MonitorInner {
    provider: Arc<dyn AuthProvider>,
    state: Mutex<MonitorState>,
    listeners: Listeners<AuthStatus>,
}

impl MonitorInner {
    fn lock(&self) -> MutexGuard<'_, MonitorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn on_provider_change(&self, session: Option<&Session>) {
        let next = AuthStatus::from_session(session);
        let changed = {
            let mut state = self.lock();
            if state.phase != Phase::Active {
                return;
            }
            state.generation += 1;
            replace_if_changed(&mut state.status, &next)
        };

        if changed {
            tracing::debug!(status = ?next, "session transition");
            self.listeners.publish(&next);
        }
    }

    fn on_initial_session(&self, next: AuthStatus, generation: u64) {
        let changed = {
            let mut state = self.lock();
            if state.phase != Phase::Active {
                return;
            }
            if state.generation != generation {
                tracing::debug!("initial session superseded by a change notification");
                return;
            }
            replace_if_changed(&mut state.status, &next)
        };

        if changed {
            tracing::debug!(status = ?next, "initial session resolved");
            self.listeners.publish(&next);
        }
    }
}

fn replace_if_changed(current: &mut AuthStatus, next: &AuthStatus) -> bool {
    if current == next {
        false
    } else {
        *current = next.clone();
        true
    }
}

/// Sole owner of the "current principal".
///
/// Cloning yields another handle to the same monitor.
#[derive(Clone)]
pub struct SessionMonitor {
    inner: Arc<MonitorInner>,
}

impl SessionMonitor {
    pub fn new(provider: Arc<dyn AuthProvider>) -> Self {
        Self {
            inner: Arc::new(MonitorInner {
                provider,
                state: Mutex::new(MonitorState {
                    status: AuthStatus::Unknown,
                    phase: Phase::Idle,
                    generation: 0,
                    provider_subscription: None,
                }),
                listeners: Listeners::new(),
            }),
        }
    }

    pub fn status(&self) -> AuthStatus {
        self.inner.lock().status.clone()
    }

    /// Start observing the provider.
    ///
    /// Subscribes to change notifications first and only then fetches the
    /// current session, so a sign-in racing with activation is never lost. A
    /// notification that lands while the fetch is pending wins over the fetch
    /// result. Calling this again (or after teardown) is a no-op.
    pub async fn activate(&self) -> AuthStatus {
        {
            let mut state = self.inner.lock();
            if state.phase != Phase::Idle {
                return state.status.clone();
            }
            state.phase = Phase::Active;
        }

        let weak = Arc::downgrade(&self.inner);
        let subscription = self
            .inner
            .provider
            .on_session_change(Arc::new(move |session: &Option<Session>| {
                if let Some(inner) = weak.upgrade() {
                    inner.on_provider_change(session.as_ref());
                }
            }));

        let generation = {
            let mut state = self.inner.lock();
            if state.phase != Phase::Active {
                drop(state);
                subscription.unsubscribe();
                return self.status();
            }
            state.provider_subscription = Some(subscription);
            state.generation
        };

        let initial = match self.inner.provider.current_session().await {
            Ok(session) => AuthStatus::from_session(session.as_ref()),
            Err(err) => {
                tracing::warn!(error = %err, "failed to fetch current session; treating as signed out");
                AuthStatus::Anonymous
            }
        };
        self.inner.on_initial_session(initial, generation);

        self.status()
    }

    /// Stop observing the provider. Unsubscribes exactly once; later calls
    /// are no-ops.
    pub fn deactivate(&self) {
        let subscription = {
            let mut state = self.inner.lock();
            state.phase = Phase::TornDown;
            state.provider_subscription.take()
        };

        if let Some(subscription) = subscription {
            subscription.unsubscribe();
            tracing::debug!("session monitor detached from auth provider");
        }
    }

    pub fn is_active(&self) -> bool {
        self.inner.lock().phase == Phase::Active
    }
}

impl Publisher<AuthStatus> for SessionMonitor {
    fn subscribe(&self, listener: Listener<AuthStatus>) -> Subscription {
        self.inner.listeners.subscribe(listener)
    }
}

impl core::fmt::Debug for SessionMonitor {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SessionMonitor")
            .field("status", &self.status())
            .finish()
    }
}
