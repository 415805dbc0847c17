use std::collections::BTreeMap;

use serde::Serialize;
use thiserror::Error;

use crate::{AccessRequirement, MatchMode, Permission, PermissionSet, PermissionTable, Role};

/// Outcome of an access decision. There is no third state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(DenyReason),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }

    pub fn into_result(self) -> Result<(), DenyReason> {
        match self {
            Decision::Allow => Ok(()),
            Decision::Deny(reason) => Err(reason),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DenyReason {
    #[error("forbidden: role '{0}' is not a tenancy owner")]
    NotTenancyOwner(Role),

    #[error("forbidden: missing {mode:?} of permission(s) [{}]", join(.missing))]
    MissingPermissions {
        mode: MatchMode,
        missing: Vec<Permission>,
    },

    #[error("forbidden: requirement names no permission and no role")]
    AmbiguousRequirement,

    #[error("permissions are not resolved yet")]
    Unresolved,
}

fn join(permissions: &[Permission]) -> String {
    permissions
        .iter()
        .map(|p| p.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Decide whether `permissions` satisfies `required` under `mode`.
///
/// - No IO
/// - No panics
/// - Literal set semantics: `Any` over an empty list denies, `All` over an
///   empty list allows
pub fn decide(permissions: &PermissionSet, required: &[Permission], mode: MatchMode) -> Decision {
    let satisfied = match mode {
        MatchMode::Any => permissions.contains_any(required),
        MatchMode::All => permissions.contains_all(required),
    };

    if satisfied {
        Decision::Allow
    } else {
        Decision::Deny(DenyReason::MissingPermissions {
            mode,
            missing: permissions.missing(required),
        })
    }
}

/// Evaluate a full surface requirement against a resolved role.
///
/// The tenancy-owner check runs first and independently of permission
/// membership; when both checks are requested both must pass. A requirement
/// with neither constraint allows (any signed-in principal).
pub fn evaluate(role: Role, permissions: &PermissionSet, requirement: &AccessRequirement) -> Decision {
    if requirement.require_tenancy_owner && !role.is_tenancy_owner() {
        return Decision::Deny(DenyReason::NotTenancyOwner(role));
    }

    if requirement.checks_permissions() {
        return decide(permissions, &requirement.required_permissions, requirement.mode);
    }

    Decision::Allow
}

// ─────────────────────────────────────────────────────────────────────────────
// Authorization Explanation
// ─────────────────────────────────────────────────────────────────────────────

/// Detailed explanation of an access decision, for debugging "why was this
/// denied?" questions.
#[derive(Debug, Clone, Serialize)]
pub struct AuthorizationExplanation {
    pub requirement: AccessRequirement,
    pub granted: bool,
    pub reason: String,
    pub role: Role,
    pub effective_permissions: Vec<&'static str>,
    pub denial: Option<Denial>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Denial {
    pub kind: DenialKind,
    pub message: String,
    pub suggestions: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DenialKind {
    NotTenancyOwner,
    MissingPermission,
}

/// Explain why [`evaluate`] allows or denies.
pub fn explain(role: Role, permissions: &PermissionSet, requirement: &AccessRequirement) -> AuthorizationExplanation {
    let decision = evaluate(role, permissions, requirement);
    let effective_permissions = permissions.names();

    let (granted, reason, denial) = match decision {
        Decision::Allow => {
            let reason = if requirement.is_unconstrained() {
                "Requirement only asks for a signed-in principal".to_string()
            } else if requirement.checks_permissions() {
                format!(
                    "Role '{role}' grants {:?} of [{}]",
                    requirement.mode,
                    join(&requirement.required_permissions)
                )
            } else {
                format!("Role '{role}' is a tenancy owner")
            };
            (true, reason, None)
        }
        Decision::Deny(deny) => {
            let kind = match deny {
                DenyReason::NotTenancyOwner(_) => DenialKind::NotTenancyOwner,
                _ => DenialKind::MissingPermission,
            };

            let satisfying: Vec<&'static str> = PermissionTable::entries()
                .filter(|(candidate, perms)| evaluate(*candidate, perms, requirement).is_allowed())
                .map(|(candidate, _)| candidate.as_str())
                .collect();

            let mut suggestions = Vec::new();
            if satisfying.is_empty() {
                suggestions.push("No role satisfies this requirement; check the surface configuration".to_string());
            } else {
                suggestions.push(format!(
                    "Ask a company owner to assign one of these roles: {}",
                    satisfying.join(", ")
                ));
            }
            if role == PermissionTable::FALLBACK_ROLE {
                suggestions.push(
                    "The principal resolved to 'viewer'; verify a role assignment exists for this company"
                        .to_string(),
                );
            }

            let message = deny.to_string();
            (
                false,
                format!("Role '{role}' does not satisfy the requirement: {message}"),
                Some(Denial {
                    kind,
                    message,
                    suggestions,
                }),
            )
        }
    };

    AuthorizationExplanation {
        requirement: requirement.clone(),
        granted,
        reason,
        role,
        effective_permissions,
        denial,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Registry
// ─────────────────────────────────────────────────────────────────────────────

/// Role definition with its granted permissions (for audit/display).
#[derive(Debug, Clone, Serialize)]
pub struct RoleDefinition {
    pub name: &'static str,
    pub description: &'static str,
    pub tenancy_owner: bool,
    pub permissions: PermissionSet,
}

/// Permission definition (for audit/display).
#[derive(Debug, Clone, Serialize)]
pub struct PermissionDefinition {
    pub name: &'static str,
    pub description: &'static str,
    pub granted_by: Vec<Role>,
}

/// Complete view of the role model, built from [`PermissionTable`].
#[derive(Debug, Clone, Serialize)]
pub struct RbacRegistry {
    pub roles: BTreeMap<Role, RoleDefinition>,
    pub permissions: BTreeMap<Permission, PermissionDefinition>,
}

impl RbacRegistry {
    pub fn from_table() -> Self {
        let roles = PermissionTable::entries()
            .map(|(role, permissions)| {
                (
                    role,
                    RoleDefinition {
                        name: role.as_str(),
                        description: role.description(),
                        tenancy_owner: role.is_tenancy_owner(),
                        permissions,
                    },
                )
            })
            .collect();

        let permissions = Permission::ALL
            .into_iter()
            .map(|permission| {
                (
                    permission,
                    PermissionDefinition {
                        name: permission.as_str(),
                        description: permission.description(),
                        granted_by: PermissionTable::roles_granting(permission),
                    },
                )
            })
            .collect();

        Self { roles, permissions }
    }

    pub fn role(&self, name: &str) -> Option<&RoleDefinition> {
        let role: Role = name.parse().ok()?;
        self.roles.get(&role)
    }

    pub fn permission(&self, name: &str) -> Option<&PermissionDefinition> {
        let permission: Permission = name.parse().ok()?;
        self.permissions.get(&permission)
    }
}
