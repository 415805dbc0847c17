//! Auth provider collaborator contract.

use async_trait::async_trait;
use thiserror::Error;

use tenantgate_auth::Session;
use tenantgate_events::{Listener, Subscription};

/// Callback invoked by the provider on every session change (`None` = signed
/// out).
pub type SessionCallback = Listener<Option<Session>>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthProviderError {
    #[error("auth provider unavailable: {0}")]
    Unavailable(String),
}

/// External authentication provider.
///
/// Only these two operations are consumed; sign-in/sign-out flows, token
/// renewal and expiry all live on the provider side.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Current session, if the provider has one.
    async fn current_session(&self) -> Result<Option<Session>, AuthProviderError>;

    /// Register for ongoing session change notifications.
    fn on_session_change(&self, callback: SessionCallback) -> Subscription;
}
