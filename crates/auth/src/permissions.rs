use core::str::FromStr;
use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use tenantgate_core::{DomainError, ValueObject};

/// Atomic capability checked by guards.
///
/// Closed per release: adding a capability means adding a variant here and a
/// row decision in [`crate::PermissionTable`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    Create,
    Update,
    Delete,
    ViewFinancials,
    ManageUsers,
}

impl Permission {
    pub const ALL: [Permission; 5] = [
        Permission::Create,
        Permission::Update,
        Permission::Delete,
        Permission::ViewFinancials,
        Permission::ManageUsers,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::Create => "create",
            Permission::Update => "update",
            Permission::Delete => "delete",
            Permission::ViewFinancials => "view_financials",
            Permission::ManageUsers => "manage_users",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Permission::Create => "Create new records",
            Permission::Update => "Edit existing records",
            Permission::Delete => "Delete records",
            Permission::ViewFinancials => "View ledgers, balances and financial reports",
            Permission::ManageUsers => "Invite users and change their roles",
        }
    }
}

impl core::fmt::Display for Permission {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Permission {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Permission::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| DomainError::invalid_permission(s))
    }
}

/// Immutable, ordered set of permissions derived from a role.
///
/// There is no in-place mutation API: a role change yields a new set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionSet(BTreeSet<Permission>);

impl PermissionSet {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn all() -> Self {
        Permission::ALL.into_iter().collect()
    }

    pub fn contains(&self, permission: Permission) -> bool {
        self.0.contains(&permission)
    }

    pub fn contains_any(&self, permissions: &[Permission]) -> bool {
        permissions.iter().any(|p| self.contains(*p))
    }

    pub fn contains_all(&self, permissions: &[Permission]) -> bool {
        permissions.iter().all(|p| self.contains(*p))
    }

    pub fn is_subset(&self, other: &PermissionSet) -> bool {
        self.0.is_subset(&other.0)
    }

    /// Required permissions that this set does not grant, in table order.
    pub fn missing(&self, required: &[Permission]) -> Vec<Permission> {
        let missing: BTreeSet<Permission> = required
            .iter()
            .copied()
            .filter(|p| !self.contains(*p))
            .collect();
        missing.into_iter().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = Permission> + '_ {
        self.0.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.iter().map(|p| p.as_str()).collect()
    }
}

impl ValueObject for PermissionSet {}

impl FromIterator<Permission> for PermissionSet {
    fn from_iter<I: IntoIterator<Item = Permission>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<const N: usize> From<[Permission; N]> for PermissionSet {
    fn from(value: [Permission; N]) -> Self {
        value.into_iter().collect()
    }
}
