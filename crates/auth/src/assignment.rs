use serde::{Deserialize, Serialize};

use tenantgate_core::{DomainResult, TenantId, ValueObject};

use crate::Role;

/// Role assignment exactly as the role store returns it.
///
/// Nothing here is trusted yet: `role` may be outside the closed set and
/// `company_id` may not even be a valid tenant id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredRoleAssignment {
    pub role: String,
    pub company_id: String,
}

impl StoredRoleAssignment {
    pub fn new(role: impl Into<String>, company_id: impl ToString) -> Self {
        Self {
            role: role.into(),
            company_id: company_id.to_string(),
        }
    }

    /// Validate into a typed assignment.
    ///
    /// Fails with [`tenantgate_core::DomainError::InvalidRole`] for a role
    /// outside the closed set and [`tenantgate_core::DomainError::InvalidId`]
    /// for a malformed company id.
    pub fn parse(&self) -> DomainResult<RoleAssignment> {
        let tenant_id: TenantId = self.company_id.parse()?;
        let role: Role = self.role.parse()?;
        Ok(RoleAssignment { role, tenant_id })
    }
}

/// A principal's role within one tenant (at most one per pair).
///
/// Written only by out-of-band administrative actions; read-only here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoleAssignment {
    pub role: Role,
    pub tenant_id: TenantId,
}

impl RoleAssignment {
    /// An assignment is meaningful only for the tenant it was made in.
    pub fn applies_to(&self, tenant_id: TenantId) -> bool {
        self.tenant_id == tenant_id
    }
}

impl ValueObject for RoleAssignment {}
