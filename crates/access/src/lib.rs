//! `tenantgate-access` — stateful RBAC resolution and enforcement.
//!
//! ```text
//! AuthProvider ─► SessionMonitor ─┐
//!                                 ├─► RouteGuard / ActionGate / ContentGate ─► evaluate()
//! RoleStore ────► RoleResolver ───┘
//! ```
//!
//! Guards never call the role store directly; they go through the single
//! [`RoleResolver`] owned by [`AccessControl`], so every surface derives its
//! decision from the same resolution.

pub mod config;
pub mod control;
pub mod gates;
pub mod notice;
pub mod provider;
pub mod resolver;
pub mod route_guard;
pub mod session_monitor;
pub mod store;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::{AccessConfig, ConfigError};
pub use control::AccessControl;
pub use gates::{ActionGate, ActionStatus, ContentGate, ContentOutcome, Fallback, WhenDenied};
pub use notice::Notice;
pub use provider::{AuthProvider, AuthProviderError, SessionCallback};
pub use resolver::{
    Resolution, ResolutionEvent, ResolutionFailure, ResolutionKey, ResolutionState, RoleResolver,
    RoleSource,
};
pub use route_guard::{GuardState, Redirect, RouteGuard, evaluate_route};
pub use session_monitor::{AuthStatus, SessionMonitor};
pub use store::{RoleStore, RoleStoreError};
