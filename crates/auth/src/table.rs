//! Static role → permission table.

use crate::{Permission, PermissionSet, Role};

/// Single source of truth for role-derived permissions.
///
/// A total function over [`Role`]; there is no runtime mutation and no
/// per-user override.
#[derive(Debug, Clone, Copy, Default)]
pub struct PermissionTable;

impl PermissionTable {
    /// Role used on every fail-closed path (no assignment, store failure,
    /// invalid role value).
    pub const FALLBACK_ROLE: Role = Role::Viewer;

    pub fn permissions_for(role: Role) -> PermissionSet {
        use Permission::*;

        match role {
            Role::Admin | Role::Owner => PermissionSet::all(),
            Role::Accountant => PermissionSet::from([Create, Update, ViewFinancials]),
            Role::HrManager => PermissionSet::from([Create, Update, Delete]),
            Role::SalesManager => PermissionSet::from([Create, Update]),
            Role::Viewer => PermissionSet::empty(),
        }
    }

    pub fn fallback() -> PermissionSet {
        Self::permissions_for(Self::FALLBACK_ROLE)
    }

    /// Every role with its permission set, in declaration order.
    pub fn entries() -> impl Iterator<Item = (Role, PermissionSet)> {
        Role::ALL
            .into_iter()
            .map(|role| (role, Self::permissions_for(role)))
    }

    /// Roles whose permission set includes `permission`.
    pub fn roles_granting(permission: Permission) -> Vec<Role> {
        Self::entries()
            .filter(|(_, perms)| perms.contains(permission))
            .map(|(role, _)| role)
            .collect()
    }
}
