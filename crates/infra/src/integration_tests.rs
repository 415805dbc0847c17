//! Integration tests for the full resolution pipeline.
//!
//! Tests: AuthProvider → SessionMonitor → RoleResolver → guards → decide()
//!
//! Verifies:
//! - Role assignments drive route, action and content decisions
//! - Every degraded path resolves to the viewer set
//! - Results apply in query-issued order, not completion order

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use chrono::Utc;

    use tenantgate_access::{
        AccessConfig, AccessControl, ActionGate, ContentGate, ContentOutcome, Fallback, GuardState,
        Notice, ResolutionEvent, ResolutionFailure, ResolutionState, RoleResolver, RoleSource,
    };
    use tenantgate_auth::{
        AccessRequirement, MatchMode, Permission, PermissionTable, Principal, PrincipalId, Role,
        Session, StoredRoleAssignment, TenantId,
    };
    use tenantgate_events::{Listener, Publisher};

    use crate::{InMemoryAuthProvider, InMemoryRoleStore};

    struct Harness {
        provider: Arc<InMemoryAuthProvider>,
        store: Arc<InMemoryRoleStore>,
        tenant: TenantId,
        principal: Principal,
    }

    impl Harness {
        fn signed_in() -> Self {
            let principal = Principal::new(PrincipalId::new()).with_email("lina@example.com");
            Self {
                provider: Arc::new(InMemoryAuthProvider::with_session(Session::new(principal.clone()))),
                store: Arc::new(InMemoryRoleStore::new()),
                tenant: TenantId::new(),
                principal,
            }
        }

        fn assign(&self, role: &str) {
            self.store.assign(self.principal.id, self.tenant, role);
        }

        async fn control(&self) -> AccessControl {
            let control = AccessControl::new(
                self.provider.clone(),
                self.store.clone(),
                self.tenant,
                AccessConfig::default(),
            );
            control.start().await;
            control.resolve_current().await;
            control
        }
    }

    async fn wait_for_state(guard: &tenantgate_access::RouteGuard, expected: fn(&GuardState) -> bool) {
        for _ in 0..100 {
            if expected(&guard.state()) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("guard never reached expected state, last: {:?}", guard.state());
    }

    #[tokio::test]
    async fn accountant_can_view_financials() {
        let h = Harness::signed_in();
        h.assign("accountant");
        let control = h.control().await;

        let state = control.current_state().unwrap();
        assert_eq!(state.role(), Some(Role::Accountant));
        assert!(
            control
                .authorize(&AccessRequirement::any([Permission::ViewFinancials]))
                .is_allowed()
        );
    }

    #[tokio::test]
    async fn unassigned_principal_is_viewer() {
        let h = Harness::signed_in();
        let control = h.control().await;

        let state = control.current_state().unwrap();
        assert_eq!(state.permissions(), Some(&PermissionTable::permissions_for(Role::Viewer)));
        assert_eq!(state.resolution().unwrap().source, RoleSource::DefaultViewer);
        assert!(
            !control
                .authorize(&AccessRequirement::permission(Permission::ManageUsers))
                .is_allowed()
        );
    }

    #[tokio::test]
    async fn out_of_set_role_coerces_to_viewer() {
        let h = Harness::signed_in();
        h.assign("superadmin");
        let control = h.control().await;

        let state = control.current_state().unwrap();
        assert!(matches!(
            state,
            ResolutionState::Failed {
                reason: ResolutionFailure::InvalidRoleValue(_),
                ..
            }
        ));
        assert!(!control.authorize(&AccessRequirement::tenancy_owner()).is_allowed());
    }

    #[tokio::test]
    async fn sign_out_while_allowed_redirects_to_sign_in() {
        let h = Harness::signed_in();
        h.assign("owner");
        let control = h.control().await;
        let guard = control.route_guard(AccessRequirement::tenancy_owner(), "/company/settings");
        wait_for_state(&guard, |s| *s == GuardState::Allow).await;

        let transitions = Arc::new(Mutex::new(Vec::new()));
        let sink = transitions.clone();
        let listener: Listener<GuardState> = Arc::new(move |s: &GuardState| sink.lock().unwrap().push(s.clone()));
        let _sub = guard.subscribe(listener);

        h.provider.sign_out();

        let transitions = transitions.lock().unwrap();
        assert_eq!(transitions[0], GuardState::Checking);
        match &transitions[1] {
            GuardState::DenyUnauthenticated(redirect) => {
                assert_eq!(redirect.to, "/login");
                assert_eq!(redirect.return_to.as_deref(), Some("/company/settings"));
            }
            other => panic!("expected DenyUnauthenticated, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn refresh_reflects_promotion_without_new_session() {
        let h = Harness::signed_in();
        h.assign("viewer");
        let control = h.control().await;
        assert!(!control.authorize(&AccessRequirement::tenancy_owner()).is_allowed());

        h.assign("owner");
        let refreshed = control.refresh().await.unwrap();

        assert_eq!(refreshed.role(), Some(Role::Owner));
        assert_eq!(refreshed.permissions(), Some(&PermissionTable::permissions_for(Role::Owner)));
        assert!(control.authorize(&AccessRequirement::tenancy_owner()).is_allowed());
        assert_eq!(control.session().principal(), Some(&h.principal));
    }

    #[tokio::test]
    async fn refresh_twice_yields_same_permissions() {
        let h = Harness::signed_in();
        h.assign("hr_manager");
        let control = h.control().await;

        let first = control.refresh().await.unwrap();
        let second = control.refresh().await.unwrap();

        assert_eq!(first.permissions(), second.permissions());
    }

    #[tokio::test]
    async fn slow_stale_query_never_wins() {
        let tenant = TenantId::new();
        let (a, b) = (PrincipalId::new(), PrincipalId::new());
        let store = Arc::new(InMemoryRoleStore::new());
        store.assign(a, tenant, "admin");
        store.assign(b, tenant, "viewer");
        store.set_latency(a, Duration::from_millis(40));
        let resolver = RoleResolver::new(store);

        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        let listener: Listener<ResolutionEvent> =
            Arc::new(move |e: &ResolutionEvent| sink.lock().unwrap().push(e.clone()));
        let _sub = resolver.subscribe(listener);

        resolver.request(a, tenant);
        let b_state = resolver.resolve(b, tenant).await;
        // Let A's slow query land.
        tokio::time::sleep(Duration::from_millis(120)).await;
        let a_state = resolver.state(a, tenant).unwrap();
        assert_eq!(a_state.role(), Some(Role::Admin));

        let settled: Vec<ResolutionEvent> = events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.state.is_settled())
            .cloned()
            .collect();
        // A's result is cached for later use but never published over B's.
        assert_eq!(settled.len(), 1);
        assert_eq!(settled[0].key.principal_id, b);
        assert_eq!(settled[0].state, b_state);
    }

    #[tokio::test]
    async fn concurrent_guards_issue_one_query() {
        let h = Harness::signed_in();
        h.assign("sales_manager");
        h.store.set_latency(h.principal.id, Duration::from_millis(20));
        let control = AccessControl::new(
            h.provider.clone(),
            h.store.clone(),
            h.tenant,
            AccessConfig::default(),
        );
        control.start().await;

        let guards: Vec<_> = (0..5)
            .map(|i| control.route_guard(AccessRequirement::permission(Permission::Create), format!("/orders/{i}")))
            .collect();
        for guard in &guards {
            wait_for_state(guard, |s| *s == GuardState::Allow).await;
        }

        assert_eq!(h.store.query_count(), 1);
    }

    #[tokio::test]
    async fn store_outage_fails_closed_and_recovers_on_refresh() {
        let h = Harness::signed_in();
        h.assign("admin");
        h.store.set_unavailable(true);
        let control = h.control().await;

        let state = control.current_state().unwrap();
        assert!(state.is_failed());
        assert!(state.permissions().unwrap().is_subset(&PermissionTable::fallback()));
        assert_eq!(state.notice(), Some(Notice::LimitedFunctionality));

        let banner = ContentGate::new(AccessRequirement::permission(Permission::ManageUsers))
            .with_fallback(Fallback::Notice);
        assert_eq!(
            control.render(&banner, "users"),
            ContentOutcome::Notice(Notice::LimitedFunctionality)
        );

        // No implicit retry.
        assert_eq!(h.store.query_count(), 1);

        h.store.set_unavailable(false);
        let recovered = control.refresh().await.unwrap();
        assert_eq!(recovered.role(), Some(Role::Admin));
        assert_eq!(control.render(&banner, "users"), ContentOutcome::Rendered("users"));
    }

    #[tokio::test]
    async fn foreign_company_assignment_is_ignored() {
        let h = Harness::signed_in();
        h.store.insert(
            h.principal.id,
            h.tenant,
            StoredRoleAssignment::new("owner", TenantId::new()),
        );
        let control = h.control().await;

        assert_eq!(control.current_state().unwrap().role(), Some(Role::Viewer));
    }

    #[tokio::test]
    async fn expired_session_is_treated_as_signed_out() {
        let principal = Principal::new(PrincipalId::new());
        let provider = Arc::new(InMemoryAuthProvider::with_session(
            Session::new(principal).expiring_at(Utc::now() - chrono::Duration::seconds(5)),
        ));
        let control = AccessControl::new(
            provider,
            Arc::new(InMemoryRoleStore::new()),
            TenantId::new(),
            AccessConfig::default(),
        );
        control.start().await;

        let guard = control.route_guard(AccessRequirement::authenticated(), "/dashboard");
        assert!(matches!(guard.state(), GuardState::DenyUnauthenticated(_)));
    }

    #[tokio::test]
    async fn actions_follow_match_mode() {
        let h = Harness::signed_in();
        h.assign("sales_manager");
        let control = h.control().await;

        let any = ActionGate::new(AccessRequirement::any([Permission::Delete, Permission::Update]));
        let all = ActionGate::new(AccessRequirement::all([Permission::Delete, Permission::Update]));
        assert_eq!(all.requirement.mode, MatchMode::All);

        assert!(control.action_status(&any).is_enabled());
        assert!(!control.action_status(&all).is_enabled());
    }
}
