use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::Principal;

/// Provider-managed credential wrapping a [`Principal`].
///
/// Expiry and renewal belong to the auth provider; this layer only observes
/// sessions and refuses to treat an expired one as authenticated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub principal: Principal,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl Session {
    pub fn new(principal: Principal) -> Self {
        Self {
            principal,
            expires_at: None,
        }
    }

    pub fn expiring_at(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionValidationError {
    #[error("session expired at {0}")]
    Expired(DateTime<Utc>),
}

/// Deterministically validate a session's time window.
///
/// Sessions without an expiry are trusted to be managed by the provider.
pub fn validate_session(session: &Session, now: DateTime<Utc>) -> Result<(), SessionValidationError> {
    match session.expires_at {
        Some(expires_at) if now >= expires_at => Err(SessionValidationError::Expired(expires_at)),
        _ => Ok(()),
    }
}
