//! Whole-view protection.
//!
//! ```text
//!            ┌────────── any session transition ───────────┐
//!            ▼                                             │
//!        Checking ──Anonymous──────────────► DenyUnauthenticated
//!            │
//!            └─Authenticated + settled ─┬──► Allow
//!                                       └──► DenyForbidden
//! ```

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use serde::Serialize;

use tenantgate_auth::{AccessRequirement, Decision, DenyReason, TenantId};
use tenantgate_events::{Listener, Listeners, Publisher, Subscription};

use crate::config::AccessConfig;
use crate::resolver::{ResolutionEvent, ResolutionKey, ResolutionState, RoleResolver};
use crate::session_monitor::{AuthStatus, SessionMonitor};

/// Navigation instruction for a denied route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Redirect {
    pub to: String,
    /// Originally requested location, for post-login return.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_to: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardState {
    Checking,
    DenyUnauthenticated(Redirect),
    DenyForbidden { redirect: Redirect, reason: DenyReason },
    Allow,
}

impl GuardState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, GuardState::Checking)
    }

    pub fn redirect(&self) -> Option<&Redirect> {
        match self {
            GuardState::DenyUnauthenticated(redirect) => Some(redirect),
            GuardState::DenyForbidden { redirect, .. } => Some(redirect),
            _ => None,
        }
    }
}

/// Pure route decision for one snapshot of session and resolution state.
///
/// `resolution` must belong to the authenticated principal; the guard
/// guarantees this by keying its resolution on the principal it last saw.
pub fn evaluate_route(
    status: &AuthStatus,
    resolution: Option<&ResolutionState>,
    requirement: &AccessRequirement,
    location: &str,
    config: &AccessConfig,
) -> GuardState {
    match status {
        AuthStatus::Unknown => GuardState::Checking,
        AuthStatus::Anonymous => GuardState::DenyUnauthenticated(Redirect {
            to: config.sign_in_path.clone(),
            return_to: Some(location.to_string()),
        }),
        AuthStatus::Authenticated(_) => {
            let Some(state) = resolution.filter(|s| s.is_settled()) else {
                return GuardState::Checking;
            };

            match state.decide(requirement) {
                Decision::Allow => GuardState::Allow,
                Decision::Deny(reason) => GuardState::DenyForbidden {
                    redirect: Redirect {
                        to: config.unauthorized_path.clone(),
                        return_to: None,
                    },
                    reason,
                },
            }
        }
    }
}

struct GuardCell {
    state: GuardState,
    status: AuthStatus,
    key: Option<ResolutionKey>,
    resolution: Option<ResolutionState>,
    active: bool,
    subscriptions: Vec<Subscription>,
}

struct GuardInner {
    requirement: AccessRequirement,
    location: String,
    tenant_id: TenantId,
    config: AccessConfig,
    resolver: RoleResolver,
    cell: Mutex<GuardCell>,
    listeners: Listeners<GuardState>,
}

impl GuardInner {
    fn lock(&self) -> MutexGuard<'_, GuardCell> {
        self.cell.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn on_session(&self, status: &AuthStatus) {
        let key = status
            .principal()
            .map(|principal| ResolutionKey::new(principal.id, self.tenant_id));

        // Session, key and the Checking reset change together, so a
        // resolution landing right after this block is recorded against the
        // new key and never overwritten.
        let checking = {
            let mut cell = self.lock();
            if !cell.active {
                return;
            }
            cell.status = status.clone();
            cell.key = key;
            cell.resolution = None;
            let changed = cell.state != GuardState::Checking;
            cell.state = GuardState::Checking;
            changed
        };
        if checking {
            tracing::debug!(location = %self.location, "route guard re-checking");
            self.listeners.publish(&GuardState::Checking);
        }

        match key {
            Some(key) => self.sync_with_resolver(key),
            None => self.reevaluate(),
        }
    }

    /// Pull the resolver's current state for `key` and re-derive the guard
    /// state from the cell, whether or not the pulled state was new.
    fn sync_with_resolver(&self, key: ResolutionKey) {
        let state = self.resolver.request(key.principal_id, key.tenant_id);
        self.record(key, state);
        self.reevaluate();
    }

    fn on_resolution(&self, key: ResolutionKey, state: ResolutionState) {
        if self.record(key, state) {
            self.reevaluate();
        }
    }

    /// Store `state` if it belongs to the guarded key and supersedes what the
    /// guard holds.
    fn record(&self, key: ResolutionKey, state: ResolutionState) -> bool {
        let mut cell = self.lock();
        if !cell.active || cell.key != Some(key) {
            return false;
        }
        let newer = cell
            .resolution
            .as_ref()
            .is_none_or(|current| state.supersedes(current));
        if newer {
            cell.resolution = Some(state);
        }
        newer
    }

    fn reevaluate(&self) {
        let next = {
            let cell = self.lock();
            if !cell.active {
                return;
            }
            evaluate_route(
                &cell.status,
                cell.resolution.as_ref(),
                &self.requirement,
                &self.location,
                &self.config,
            )
        };
        self.transition(next);
    }

    fn transition(&self, next: GuardState) {
        {
            let mut cell = self.lock();
            if !cell.active || cell.state == next {
                return;
            }
            cell.state = next.clone();
        }

        match &next {
            GuardState::DenyUnauthenticated(_) => {
                tracing::info!(location = %self.location, "route denied: not signed in");
            }
            GuardState::DenyForbidden { reason, .. } => {
                tracing::info!(location = %self.location, reason = %reason, "route denied");
            }
            _ => tracing::debug!(location = %self.location, state = ?next, "route guard transition"),
        }
        self.listeners.publish(&next);
    }
}

/// Protects one navigable view.
///
/// Subscribes to the session monitor and the shared resolver on mount and
/// unsubscribes on [`RouteGuard::deactivate`] or drop; results that arrive
/// after that are never applied.
pub struct RouteGuard {
    inner: Arc<GuardInner>,
}

impl RouteGuard {
    pub fn mount(
        monitor: &SessionMonitor,
        resolver: &RoleResolver,
        tenant_id: TenantId,
        requirement: AccessRequirement,
        location: impl Into<String>,
        config: AccessConfig,
    ) -> Self {
        let inner = Arc::new(GuardInner {
            requirement,
            location: location.into(),
            tenant_id,
            config,
            resolver: resolver.clone(),
            cell: Mutex::new(GuardCell {
                state: GuardState::Checking,
                status: AuthStatus::Unknown,
                key: None,
                resolution: None,
                active: true,
                subscriptions: Vec::new(),
            }),
            listeners: Listeners::new(),
        });

        let weak: Weak<GuardInner> = Arc::downgrade(&inner);
        let on_session: Listener<AuthStatus> = Arc::new(move |status: &AuthStatus| {
            if let Some(inner) = weak.upgrade() {
                inner.on_session(status);
            }
        });

        let weak: Weak<GuardInner> = Arc::downgrade(&inner);
        let on_resolution: Listener<ResolutionEvent> = Arc::new(move |event: &ResolutionEvent| {
            if let Some(inner) = weak.upgrade() {
                inner.on_resolution(event.key, event.state.clone());
            }
        });

        let subscriptions = vec![monitor.subscribe(on_session), resolver.subscribe(on_resolution)];
        inner.lock().subscriptions = subscriptions;

        inner.on_session(&monitor.status());

        Self { inner }
    }

    pub fn state(&self) -> GuardState {
        self.inner.lock().state.clone()
    }

    pub fn requirement(&self) -> &AccessRequirement {
        &self.inner.requirement
    }

    pub fn location(&self) -> &str {
        &self.inner.location
    }

    pub fn is_active(&self) -> bool {
        self.inner.lock().active
    }

    /// Detach from session and resolver updates. Idempotent.
    pub fn deactivate(&self) {
        let subscriptions = {
            let mut cell = self.inner.lock();
            cell.active = false;
            std::mem::take(&mut cell.subscriptions)
        };

        for subscription in &subscriptions {
            subscription.unsubscribe();
        }
    }
}

impl Publisher<GuardState> for RouteGuard {
    fn subscribe(&self, listener: Listener<GuardState>) -> Subscription {
        self.inner.listeners.subscribe(listener)
    }
}

impl Drop for RouteGuard {
    fn drop(&mut self) {
        self.deactivate();
    }
}

impl core::fmt::Debug for RouteGuard {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RouteGuard")
            .field("location", &self.inner.location)
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use tenantgate_auth::{Permission, Principal, PrincipalId, Session};

    use super::*;
    use crate::test_support::{FakeAuthProvider, FakeRoleStore, recorder};

    fn config() -> AccessConfig {
        AccessConfig::default()
    }

    async fn settle() {
        for _ in 0..8 {
            tokio::task::yield_now().await;
        }
    }

    #[test]
    fn pure_evaluation_covers_every_status() {
        let req = AccessRequirement::permission(Permission::Delete);

        assert_eq!(
            evaluate_route(&AuthStatus::Unknown, None, &req, "/x", &config()),
            GuardState::Checking
        );

        let anonymous = evaluate_route(&AuthStatus::Anonymous, None, &req, "/payroll", &config());
        assert_eq!(
            anonymous,
            GuardState::DenyUnauthenticated(Redirect {
                to: "/login".into(),
                return_to: Some("/payroll".into()),
            })
        );

        let signed_in = AuthStatus::Authenticated(Principal::new(PrincipalId::new()));
        let loading = ResolutionState::Loading { sequence: 1 };
        assert_eq!(
            evaluate_route(&signed_in, Some(&loading), &req, "/x", &config()),
            GuardState::Checking
        );
        assert_eq!(evaluate_route(&signed_in, None, &req, "/x", &config()), GuardState::Checking);
    }

    #[tokio::test]
    async fn allows_when_role_grants_permission() {
        let principal = Principal::new(PrincipalId::new());
        let tenant = TenantId::new();
        let provider = FakeAuthProvider::with_session(Some(Session::new(principal.clone())));
        let store = FakeRoleStore::new();
        store.assign(principal.id, tenant, "accountant");

        let monitor = SessionMonitor::new(provider);
        let resolver = RoleResolver::new(store);
        monitor.activate().await;

        let guard = RouteGuard::mount(
            &monitor,
            &resolver,
            tenant,
            AccessRequirement::permission(Permission::ViewFinancials),
            "/reports",
            config(),
        );
        assert_eq!(guard.state(), GuardState::Checking);

        settle().await;
        assert_eq!(guard.state(), GuardState::Allow);
    }

    #[tokio::test]
    async fn forbids_and_redirects_to_unauthorized() {
        let principal = Principal::new(PrincipalId::new());
        let tenant = TenantId::new();
        let provider = FakeAuthProvider::with_session(Some(Session::new(principal.clone())));
        let monitor = SessionMonitor::new(provider);
        let resolver = RoleResolver::new(FakeRoleStore::new());
        monitor.activate().await;

        let guard = RouteGuard::mount(
            &monitor,
            &resolver,
            tenant,
            AccessRequirement::tenancy_owner(),
            "/settings",
            config(),
        );
        settle().await;

        match guard.state() {
            GuardState::DenyForbidden { redirect, reason } => {
                assert_eq!(redirect.to, "/unauthorized");
                assert_eq!(reason, DenyReason::NotTenancyOwner(tenantgate_auth::Role::Viewer));
            }
            other => panic!("expected DenyForbidden, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn sign_out_reenters_checking_then_denies() {
        let principal = Principal::new(PrincipalId::new());
        let tenant = TenantId::new();
        let provider = FakeAuthProvider::with_session(Some(Session::new(principal.clone())));
        let store = FakeRoleStore::new();
        store.assign(principal.id, tenant, "owner");
        let monitor = SessionMonitor::new(provider.clone());
        let resolver = RoleResolver::new(store);
        monitor.activate().await;

        let guard = RouteGuard::mount(
            &monitor,
            &resolver,
            tenant,
            AccessRequirement::tenancy_owner(),
            "/settings",
            config(),
        );
        settle().await;
        assert_eq!(guard.state(), GuardState::Allow);

        let (listener, seen) = recorder::<GuardState>();
        let _sub = guard.subscribe(listener);
        provider.emit(None);

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0], GuardState::Checking);
        assert!(!seen[0].is_terminal());
        assert!(matches!(seen[1], GuardState::DenyUnauthenticated(_)));
        assert!(seen[1].is_terminal());
        assert_eq!(
            seen[1].redirect().and_then(|r| r.return_to.as_deref()),
            Some("/settings")
        );
    }

    #[tokio::test]
    async fn settles_when_result_was_recorded_before_checking_reset() {
        let principal = Principal::new(PrincipalId::new());
        let tenant = TenantId::new();
        let provider = FakeAuthProvider::with_session(Some(Session::new(principal.clone())));
        let store = FakeRoleStore::new();
        store.assign(principal.id, tenant, "sales_manager");
        let monitor = SessionMonitor::new(provider);
        let resolver = RoleResolver::new(store);
        monitor.activate().await;
        let settled = resolver.resolve(principal.id, tenant).await;

        let guard = RouteGuard::mount(
            &monitor,
            &resolver,
            tenant,
            AccessRequirement::permission(Permission::Create),
            "/orders",
            config(),
        );
        assert_eq!(guard.state(), GuardState::Allow);

        // Result already in the cell, but the visible state is Checking: the
        // interleaving where a completion lands before the reset publishes.
        let key = ResolutionKey::new(principal.id, tenant);
        {
            let mut cell = guard.inner.lock();
            cell.resolution = Some(settled);
            cell.state = GuardState::Checking;
        }
        guard.inner.sync_with_resolver(key);

        assert_eq!(guard.state(), GuardState::Allow);
        assert!(guard.state().is_terminal());
        assert_eq!(guard.state().redirect(), None);
    }

    #[tokio::test]
    async fn deactivated_guard_ignores_late_results() {
        let principal = Principal::new(PrincipalId::new());
        let tenant = TenantId::new();
        let provider = FakeAuthProvider::with_session(Some(Session::new(principal.clone())));
        let store = FakeRoleStore::new();
        store.assign(principal.id, tenant, "admin");
        let gate = store.hold(principal.id);
        let monitor = SessionMonitor::new(provider);
        let resolver = RoleResolver::new(store);
        monitor.activate().await;

        let guard = RouteGuard::mount(
            &monitor,
            &resolver,
            tenant,
            AccessRequirement::permission(Permission::ManageUsers),
            "/users",
            config(),
        );
        guard.deactivate();
        guard.deactivate();

        gate.notify_one();
        settle().await;

        assert_eq!(guard.state(), GuardState::Checking);
        assert!(!guard.is_active());
        // The result is still cached for other consumers.
        assert!(resolver.state(principal.id, tenant).unwrap().is_settled());
    }
}
