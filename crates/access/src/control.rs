//! Process-wide composition of monitor, resolver and guards.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tenantgate_auth::{AccessRequirement, Decision, DenyReason, PrincipalId, TenantId};
use tenantgate_events::{Listener, Publisher, Subscription};

use crate::config::AccessConfig;
use crate::gates::{ActionGate, ActionStatus, ContentGate, ContentOutcome};
use crate::provider::AuthProvider;
use crate::resolver::{ResolutionKey, ResolutionState, RoleResolver};
use crate::route_guard::RouteGuard;
use crate::session_monitor::{AuthStatus, SessionMonitor};
use crate::store::RoleStore;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Owns the single [`SessionMonitor`] and [`RoleResolver`] of a process and
/// the active tenancy context.
///
/// Session transitions drive the resolver: signing out (or switching
/// principal) forgets the previous principal's resolutions, signing in
/// prefetches the new principal's role for the active tenant.
pub struct AccessControl {
    monitor: SessionMonitor,
    resolver: RoleResolver,
    tenant_id: Arc<Mutex<TenantId>>,
    config: AccessConfig,
    session_watch: Mutex<Option<Subscription>>,
}

impl AccessControl {
    pub fn new(
        provider: Arc<dyn AuthProvider>,
        store: Arc<dyn RoleStore>,
        tenant_id: TenantId,
        config: AccessConfig,
    ) -> Self {
        let monitor = SessionMonitor::new(provider);
        let resolver = RoleResolver::new(store);
        let tenant_id = Arc::new(Mutex::new(tenant_id));

        let last_principal: Mutex<Option<PrincipalId>> = Mutex::new(None);
        let watch_resolver = resolver.clone();
        let watch_tenant = tenant_id.clone();
        let on_session: Listener<AuthStatus> = Arc::new(move |status: &AuthStatus| {
            let next = status.principal().map(|principal| principal.id);
            let previous = std::mem::replace(&mut *lock(&last_principal), next);
            if previous == next {
                return;
            }

            if let Some(previous) = previous {
                watch_resolver.forget_principal(previous);
            }
            if let Some(next) = next {
                let tenant_id = *lock(&watch_tenant);
                watch_resolver.request(next, tenant_id);
            }
        });
        let session_watch = monitor.subscribe(on_session);

        Self {
            monitor,
            resolver,
            tenant_id,
            config,
            session_watch: Mutex::new(Some(session_watch)),
        }
    }

    /// Activate the session monitor. Must run inside a Tokio runtime.
    pub async fn start(&self) -> AuthStatus {
        let status = self.monitor.activate().await;
        tracing::info!(
            tenant_id = %self.tenant_id(),
            signed_in = status.principal().is_some(),
            "access control started"
        );
        status
    }

    /// Detach from the auth provider. Idempotent.
    pub fn shutdown(&self) {
        let watch = lock(&self.session_watch).take();
        if let Some(watch) = watch {
            watch.unsubscribe();
            tracing::info!("access control shut down");
        }
        self.monitor.deactivate();
    }

    pub fn session(&self) -> AuthStatus {
        self.monitor.status()
    }

    pub fn monitor(&self) -> &SessionMonitor {
        &self.monitor
    }

    pub fn resolver(&self) -> &RoleResolver {
        &self.resolver
    }

    pub fn config(&self) -> &AccessConfig {
        &self.config
    }

    pub fn tenant_id(&self) -> TenantId {
        *lock(&self.tenant_id)
    }

    /// Change the active tenancy context and prefetch the signed-in
    /// principal's role in it.
    ///
    /// Route guards are bound to the tenant they were mounted for; remount
    /// them after switching.
    pub fn switch_tenant(&self, tenant_id: TenantId) -> Option<ResolutionState> {
        let previous = std::mem::replace(&mut *lock(&self.tenant_id), tenant_id);
        if previous != tenant_id {
            tracing::info!(from = %previous, to = %tenant_id, "switched tenant");
        }

        let key = self.current_key()?;
        Some(self.resolver.request(key.principal_id, key.tenant_id))
    }

    /// Resolution key of the signed-in principal in the active tenant.
    pub fn current_key(&self) -> Option<ResolutionKey> {
        let status = self.monitor.status();
        let principal = status.principal()?;
        Some(ResolutionKey::new(principal.id, self.tenant_id()))
    }

    /// Cached resolution for the current key, without issuing a query.
    pub fn current_state(&self) -> Option<ResolutionState> {
        let key = self.current_key()?;
        self.resolver.state(key.principal_id, key.tenant_id)
    }

    pub async fn resolve_current(&self) -> Option<ResolutionState> {
        let key = self.current_key()?;
        Some(self.resolver.resolve(key.principal_id, key.tenant_id).await)
    }

    /// Re-query the current principal's role (after an out-of-band change).
    pub async fn refresh(&self) -> Option<ResolutionState> {
        let key = self.current_key()?;
        Some(self.resolver.refresh(key.principal_id, key.tenant_id).await)
    }

    /// Decide `requirement` for the current principal. Anonymous and
    /// unresolved both deny.
    pub fn authorize(&self, requirement: &AccessRequirement) -> Decision {
        match self.current_state() {
            Some(state) => state.decide(requirement),
            None => Decision::Deny(DenyReason::Unresolved),
        }
    }

    pub fn route_guard(&self, requirement: AccessRequirement, location: impl Into<String>) -> RouteGuard {
        RouteGuard::mount(
            &self.monitor,
            &self.resolver,
            self.tenant_id(),
            requirement,
            location,
            self.config.clone(),
        )
    }

    pub fn action_status(&self, gate: &ActionGate) -> ActionStatus {
        gate.status(self.current_state().as_ref())
    }

    pub fn render<T: Clone>(&self, gate: &ContentGate<T>, children: T) -> ContentOutcome<T> {
        gate.render(self.current_state().as_ref(), children)
    }
}

impl Drop for AccessControl {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl core::fmt::Debug for AccessControl {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AccessControl")
            .field("tenant_id", &self.tenant_id())
            .field("session", &self.session())
            .finish()
    }
}
