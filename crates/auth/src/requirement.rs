use serde::{Deserialize, Serialize};

use crate::Permission;

/// How a list of required permissions is matched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
    /// At least one of the required permissions.
    #[default]
    Any,
    /// Every one of the required permissions.
    All,
}

/// What a guarded surface (view, action, region) declares it needs.
///
/// Deserializes from the surface configuration object
/// `{ requiredPermissions?, mode?, requireTenancyOwner? }`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AccessRequirement {
    pub required_permissions: Vec<Permission>,
    pub mode: MatchMode,
    pub require_tenancy_owner: bool,
}

impl AccessRequirement {
    /// Any signed-in principal.
    pub fn authenticated() -> Self {
        Self::default()
    }

    pub fn any(permissions: impl IntoIterator<Item = Permission>) -> Self {
        Self {
            required_permissions: permissions.into_iter().collect(),
            mode: MatchMode::Any,
            require_tenancy_owner: false,
        }
    }

    pub fn all(permissions: impl IntoIterator<Item = Permission>) -> Self {
        Self {
            required_permissions: permissions.into_iter().collect(),
            mode: MatchMode::All,
            require_tenancy_owner: false,
        }
    }

    pub fn permission(permission: Permission) -> Self {
        Self::any([permission])
    }

    pub fn tenancy_owner() -> Self {
        Self {
            require_tenancy_owner: true,
            ..Self::default()
        }
    }

    pub fn with_tenancy_owner(mut self) -> Self {
        self.require_tenancy_owner = true;
        self
    }

    pub fn checks_permissions(&self) -> bool {
        !self.required_permissions.is_empty()
    }

    /// No permission and no role constraint.
    pub fn is_unconstrained(&self) -> bool {
        !self.checks_permissions() && !self.require_tenancy_owner
    }
}
