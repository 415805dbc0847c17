//! Hand-rolled fakes for the collaborator traits.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Notify;

use tenantgate_auth::{PrincipalId, Session, StoredRoleAssignment, TenantId};
use tenantgate_events::{Listener, Listeners, Publisher, Subscription};

use crate::provider::{AuthProvider, AuthProviderError, SessionCallback};
use crate::store::{RoleStore, RoleStoreError};

/// Listener that records every message it sees.
pub(crate) fn recorder<M: Clone + Send + 'static>() -> (Listener<M>, Arc<Mutex<Vec<M>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let listener: Listener<M> = Arc::new(move |message: &M| sink.lock().unwrap().push(message.clone()));
    (listener, seen)
}

pub(crate) struct FakeAuthProvider {
    session: Mutex<Option<Session>>,
    listeners: Listeners<Option<Session>>,
    fail: AtomicBool,
    fetches: AtomicUsize,
    /// Delivered to listeners while `current_session` is running.
    during_fetch: Mutex<Option<Option<Session>>>,
}

impl FakeAuthProvider {
    pub(crate) fn with_session(session: Option<Session>) -> Arc<Self> {
        Arc::new(Self {
            session: Mutex::new(session),
            listeners: Listeners::new(),
            fail: AtomicBool::new(false),
            fetches: AtomicUsize::new(0),
            during_fetch: Mutex::new(None),
        })
    }

    pub(crate) fn emit(&self, session: Option<Session>) {
        *self.session.lock().unwrap() = session.clone();
        self.listeners.publish(&session);
    }

    pub(crate) fn emit_during_fetch(&self, session: Option<Session>) {
        *self.during_fetch.lock().unwrap() = Some(session);
    }

    pub(crate) fn fail_fetch(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }

    pub(crate) fn subscriber_count(&self) -> usize {
        self.listeners.len()
    }

    pub(crate) fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AuthProvider for FakeAuthProvider {
    async fn current_session(&self) -> Result<Option<Session>, AuthProviderError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let answer = self.session.lock().unwrap().clone();

        let pending = self.during_fetch.lock().unwrap().take();
        if let Some(session) = pending {
            self.emit(session);
        }

        if self.fail.load(Ordering::SeqCst) {
            return Err(AuthProviderError::Unavailable("fake outage".to_string()));
        }
        Ok(answer)
    }

    fn on_session_change(&self, callback: SessionCallback) -> Subscription {
        self.listeners.subscribe(callback)
    }
}

#[derive(Default)]
pub(crate) struct FakeRoleStore {
    assignments: Mutex<HashMap<(PrincipalId, TenantId), StoredRoleAssignment>>,
    held: Mutex<HashMap<PrincipalId, Arc<Notify>>>,
    unavailable: AtomicBool,
    queries: AtomicUsize,
    seen: Mutex<HashSet<PrincipalId>>,
}

impl FakeRoleStore {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Assign `role` in `tenant` (company id matches the tenant).
    pub(crate) fn assign(&self, principal: PrincipalId, tenant: TenantId, role: &str) {
        self.insert(principal, tenant, StoredRoleAssignment::new(role, tenant));
    }

    pub(crate) fn insert(&self, principal: PrincipalId, tenant: TenantId, stored: StoredRoleAssignment) {
        self.assignments.lock().unwrap().insert((principal, tenant), stored);
    }

    pub(crate) fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Park queries for `principal` until the returned handle is notified.
    ///
    /// The store answer is read before parking, so a held query returns what
    /// the store held when the query started.
    pub(crate) fn hold(&self, principal: PrincipalId) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.held.lock().unwrap().insert(principal, gate.clone());
        gate
    }

    /// Stop parking new queries for `principal`.
    pub(crate) fn release(&self, principal: PrincipalId) {
        self.held.lock().unwrap().remove(&principal);
    }

    pub(crate) fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    pub(crate) fn queried(&self, principal: PrincipalId) -> bool {
        self.seen.lock().unwrap().contains(&principal)
    }
}

#[async_trait]
impl RoleStore for FakeRoleStore {
    async fn find_role_assignment(
        &self,
        principal_id: PrincipalId,
        tenant_id: TenantId,
    ) -> Result<Option<StoredRoleAssignment>, RoleStoreError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().insert(principal_id);

        let answer = if self.unavailable.load(Ordering::SeqCst) {
            Err(RoleStoreError::Unavailable("fake outage".to_string()))
        } else {
            Ok(self
                .assignments
                .lock()
                .unwrap()
                .get(&(principal_id, tenant_id))
                .cloned())
        };

        let gate = self.held.lock().unwrap().get(&principal_id).cloned();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        answer
    }
}
