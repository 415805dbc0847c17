//! Domain error model.

use thiserror::Error;

/// Result type used across the pure layers.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Only input parsing failures live here. Collaborator failures (role
/// store, auth provider) have their own error types in the crates that talk
/// to those collaborators.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// A role name outside the closed role set.
    #[error("invalid role: '{0}'")]
    InvalidRole(String),

    /// A permission name outside the closed permission set.
    #[error("invalid permission: '{0}'")]
    InvalidPermission(String),
}

impl DomainError {
    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn invalid_role(value: impl Into<String>) -> Self {
        Self::InvalidRole(value.into())
    }

    pub fn invalid_permission(value: impl Into<String>) -> Self {
        Self::InvalidPermission(value.into())
    }
}
