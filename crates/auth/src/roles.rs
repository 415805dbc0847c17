use core::str::FromStr;

use serde::{Deserialize, Serialize};

use tenantgate_core::DomainError;

use crate::{PermissionSet, PermissionTable};

/// Role granted to a principal within one tenant.
///
/// The set is closed: any other value observed from a collaborator is invalid
/// input, never a new role.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Owner,
    Accountant,
    HrManager,
    SalesManager,
    Viewer,
}

impl Role {
    pub const ALL: [Role; 6] = [
        Role::Admin,
        Role::Owner,
        Role::Accountant,
        Role::HrManager,
        Role::SalesManager,
        Role::Viewer,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Owner => "owner",
            Role::Accountant => "accountant",
            Role::HrManager => "hr_manager",
            Role::SalesManager => "sales_manager",
            Role::Viewer => "viewer",
        }
    }

    /// Whether this role may use tenant-wide administrative features.
    ///
    /// `admin` supersedes `owner`.
    pub fn is_tenancy_owner(&self) -> bool {
        matches!(self, Role::Owner | Role::Admin)
    }

    pub fn permissions(&self) -> PermissionSet {
        PermissionTable::permissions_for(*self)
    }

    pub fn description(&self) -> &'static str {
        match self {
            Role::Admin => "System administrator with every permission in the company",
            Role::Owner => "Company owner with every permission and tenant-wide administration",
            Role::Accountant => "Bookkeeping: create and edit records, view financial reports",
            Role::HrManager => "Human resources: create, edit and remove employee records",
            Role::SalesManager => "Sales: create and edit partners, quotations and invoices",
            Role::Viewer => "Read-only access; also the fallback when no role can be resolved",
        }
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = DomainError;

    /// Exact, case-sensitive match against the stored role names.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|role| role.as_str() == s)
            .ok_or_else(|| DomainError::invalid_role(s))
    }
}
