//! Role store collaborator contract.

use async_trait::async_trait;
use thiserror::Error;

use tenantgate_auth::StoredRoleAssignment;
use tenantgate_core::{PrincipalId, TenantId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RoleStoreError {
    /// Transport or backend failure.
    #[error("role store unavailable: {0}")]
    Unavailable(String),
}

/// External store of role assignments (read-only from this layer).
#[async_trait]
pub trait RoleStore: Send + Sync {
    /// Look up the assignment for `(principal_id, tenant_id)`.
    ///
    /// `Ok(None)` means no assignment exists. The returned value is untrusted:
    /// its role may be outside the closed set and its company id may differ
    /// from `tenant_id`.
    async fn find_role_assignment(
        &self,
        principal_id: PrincipalId,
        tenant_id: TenantId,
    ) -> Result<Option<StoredRoleAssignment>, RoleStoreError>;
}
