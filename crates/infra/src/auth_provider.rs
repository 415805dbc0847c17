use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;

use tenantgate_access::{AuthProvider, AuthProviderError, SessionCallback};
use tenantgate_auth::Session;
use tenantgate_events::{Listeners, Publisher, Subscription};

/// In-memory auth provider.
///
/// Intended for tests/dev. Sign-in and sign-out notify subscribers
/// synchronously on the calling task.
#[derive(Debug, Default)]
pub struct InMemoryAuthProvider {
    session: RwLock<Option<Session>>,
    listeners: Listeners<Option<Session>>,
    unavailable: AtomicBool,
}

impl InMemoryAuthProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_session(session: Session) -> Self {
        Self {
            session: RwLock::new(Some(session)),
            ..Self::default()
        }
    }

    pub fn sign_in(&self, session: Session) {
        tracing::debug!(principal_id = %session.principal.id, "sign in");
        self.replace(Some(session));
    }

    pub fn sign_out(&self) {
        tracing::debug!("sign out");
        self.replace(None);
    }

    /// Make `current_session` fail until reset. Change notifications still
    /// flow.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn subscriber_count(&self) -> usize {
        self.listeners.len()
    }

    fn replace(&self, session: Option<Session>) {
        match self.session.write() {
            Ok(mut current) => *current = session.clone(),
            Err(poisoned) => *poisoned.into_inner() = session.clone(),
        }
        self.listeners.publish(&session);
    }
}

#[async_trait]
impl AuthProvider for InMemoryAuthProvider {
    async fn current_session(&self) -> Result<Option<Session>, AuthProviderError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(AuthProviderError::Unavailable("auth provider offline".to_string()));
        }

        self.session
            .read()
            .map(|session| session.clone())
            .map_err(|_| AuthProviderError::Unavailable("lock poisoned".to_string()))
    }

    fn on_session_change(&self, callback: SessionCallback) -> Subscription {
        self.listeners.subscribe(callback)
    }
}
