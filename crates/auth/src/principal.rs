use serde::{Deserialize, Serialize};

use tenantgate_core::PrincipalId;

/// Identity of the signed-in actor.
///
/// Exists from the moment the auth provider issues a session until sign-out.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Principal {
    pub id: PrincipalId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl Principal {
    pub fn new(id: PrincipalId) -> Self {
        Self { id, email: None }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }
}
