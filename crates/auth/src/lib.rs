//! `tenantgate-auth` — pure RBAC model and decision function.
//!
//! This crate is intentionally decoupled from IO, async runtimes and UI: it
//! knows the closed role and permission sets, the role → permission table, and
//! how to decide whether a resolved permission set satisfies a requirement.

pub mod assignment;
pub mod authorize;
pub mod permissions;
pub mod principal;
pub mod requirement;
pub mod roles;
pub mod session;
pub mod table;

pub use assignment::{RoleAssignment, StoredRoleAssignment};
pub use authorize::{
    AuthorizationExplanation, Decision, DenyReason, RbacRegistry, decide, evaluate, explain,
};
pub use permissions::{Permission, PermissionSet};
pub use principal::Principal;
pub use requirement::{AccessRequirement, MatchMode};
pub use roles::Role;
pub use session::{Session, SessionValidationError, validate_session};
pub use table::PermissionTable;

pub use tenantgate_core::{PrincipalId, TenantId};
