//! Role resolution: `(principal, tenant)` → permission set.
//!
//! The resolver hides the role store's latency and failure modes behind a
//! small state machine per key:
//!
//! ```text
//! request ─► Loading{seq} ─► Resolved(resolution)
//!                        └─► Failed{resolution: viewer, reason}
//! ```
//!
//! ## Ordering
//!
//! Every query is stamped with a sequence number taken from one monotonic
//! counter. A completion is stored only if its sequence is still the latest
//! one issued for its key, so a slow stale query never overwrites a newer one.
//! Completions are published to subscribers only while their key is the active
//! one for its tenant: when principal A and then principal B are requested in
//! the same tenant, B's resolution is what subscribers end with, regardless of
//! which store query finishes last.
//!
//! ## Failure model
//!
//! Nothing here ever grants more than the viewer set when the store answer is
//! missing, malformed or unavailable. Failures are absorbed into
//! [`ResolutionState::Failed`]; callers never see a raw store error.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use thiserror::Error;
use tokio::sync::watch;

use tenantgate_auth::{
    AccessRequirement, Decision, DenyReason, PermissionSet, PermissionTable, PrincipalId, Role,
    StoredRoleAssignment, TenantId, evaluate,
};
use tenantgate_core::DomainError;
use tenantgate_events::{Listener, Listeners, Publisher, Subscription};

use crate::notice::Notice;
use crate::store::{RoleStore, RoleStoreError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ResolutionKey {
    pub principal_id: PrincipalId,
    pub tenant_id: TenantId,
}

impl ResolutionKey {
    pub fn new(principal_id: PrincipalId, tenant_id: TenantId) -> Self {
        Self {
            principal_id,
            tenant_id,
        }
    }
}

/// Where a resolved role came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleSource {
    /// A valid assignment for this tenant.
    Assigned,
    /// Fail-closed default: no usable assignment.
    DefaultViewer,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Resolution {
    pub role: Role,
    pub permissions: PermissionSet,
    pub source: RoleSource,
    pub sequence: u64,
}

impl Resolution {
    fn assigned(role: Role, sequence: u64) -> Self {
        Self {
            role,
            permissions: PermissionTable::permissions_for(role),
            source: RoleSource::Assigned,
            sequence,
        }
    }

    fn fallback(sequence: u64) -> Self {
        Self {
            role: PermissionTable::FALLBACK_ROLE,
            permissions: PermissionTable::fallback(),
            source: RoleSource::DefaultViewer,
            sequence,
        }
    }
}

/// Why a resolution degraded to the viewer set.
#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum ResolutionFailure {
    #[error("role store unavailable: {0}")]
    RoleStoreUnavailable(String),

    #[error("role store returned a role outside the closed set: '{0}'")]
    InvalidRoleValue(String),

    /// The key was forgotten (sign-out) before its query settled.
    #[error("resolution discarded before it settled")]
    Discarded,
}

/// Cached outcome for one `(principal, tenant)` key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ResolutionState {
    Loading {
        sequence: u64,
    },
    Resolved(Resolution),
    /// Usable, but always carrying the viewer set.
    Failed {
        resolution: Resolution,
        reason: ResolutionFailure,
    },
}

impl ResolutionState {
    fn failed(sequence: u64, reason: ResolutionFailure) -> Self {
        ResolutionState::Failed {
            resolution: Resolution::fallback(sequence),
            reason,
        }
    }

    pub fn sequence(&self) -> u64 {
        match self {
            ResolutionState::Loading { sequence } => *sequence,
            ResolutionState::Resolved(resolution) => resolution.sequence,
            ResolutionState::Failed { resolution, .. } => resolution.sequence,
        }
    }

    pub fn is_settled(&self) -> bool {
        !matches!(self, ResolutionState::Loading { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, ResolutionState::Failed { .. })
    }

    pub fn resolution(&self) -> Option<&Resolution> {
        match self {
            ResolutionState::Loading { .. } => None,
            ResolutionState::Resolved(resolution) => Some(resolution),
            ResolutionState::Failed { resolution, .. } => Some(resolution),
        }
    }

    pub fn role(&self) -> Option<Role> {
        self.resolution().map(|r| r.role)
    }

    pub fn permissions(&self) -> Option<&PermissionSet> {
        self.resolution().map(|r| &r.permissions)
    }

    /// Whether `self` should replace `current` in a consumer's view.
    ///
    /// Higher sequence wins; on equal sequence a settled state wins over
    /// `Loading`.
    pub fn supersedes(&self, current: &ResolutionState) -> bool {
        match self.sequence().cmp(&current.sequence()) {
            core::cmp::Ordering::Greater => true,
            core::cmp::Ordering::Less => false,
            core::cmp::Ordering::Equal => self.is_settled() && !current.is_settled(),
        }
    }

    /// Non-blocking notice a surface may show for this state.
    pub fn notice(&self) -> Option<Notice> {
        match self {
            ResolutionState::Failed {
                reason: ResolutionFailure::RoleStoreUnavailable(_),
                ..
            } => Some(Notice::LimitedFunctionality),
            _ => None,
        }
    }

    /// Evaluate `requirement` against this state. `Loading` always denies.
    pub fn decide(&self, requirement: &AccessRequirement) -> Decision {
        match self.resolution() {
            Some(resolution) => evaluate(resolution.role, &resolution.permissions, requirement),
            None => Decision::Deny(DenyReason::Unresolved),
        }
    }
}

/// Published on every state change of the active key of a tenant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolutionEvent {
    pub key: ResolutionKey,
    pub state: ResolutionState,
}

struct Entry {
    /// Sequence of the latest query issued for this key.
    issued: u64,
    tx: watch::Sender<ResolutionState>,
}

struct ResolverState {
    next_sequence: u64,
    entries: HashMap<ResolutionKey, Entry>,
    /// Last key requested per tenant.
    active: HashMap<TenantId, ResolutionKey>,
}

impl ResolverState {
    fn issue(&mut self) -> u64 {
        self.next_sequence += 1;
        self.next_sequence
    }

    fn is_active(&self, key: &ResolutionKey) -> bool {
        self.active.get(&key.tenant_id) == Some(key)
    }
}

struct ResolverInner {
    store: Arc<dyn RoleStore>,
    state: Mutex<ResolverState>,
    listeners: Listeners<ResolutionEvent>,
}

impl ResolverInner {
    fn lock(&self) -> MutexGuard<'_, ResolverState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn complete(&self, key: ResolutionKey, sequence: u64, state: ResolutionState) {
        let publish = {
            let guard = self.lock();
            let Some(entry) = guard.entries.get(&key) else {
                tracing::debug!(
                    principal_id = %key.principal_id,
                    tenant_id = %key.tenant_id,
                    sequence,
                    "dropping resolution for forgotten key"
                );
                return;
            };

            if entry.issued != sequence {
                tracing::debug!(
                    principal_id = %key.principal_id,
                    tenant_id = %key.tenant_id,
                    sequence,
                    latest = entry.issued,
                    "dropping stale resolution"
                );
                return;
            }

            entry.tx.send_replace(state.clone());
            guard.is_active(&key)
        };

        if publish {
            self.listeners.publish(&ResolutionEvent { key, state });
        }
    }
}

/// Shared role resolver. One instance per process; cloning yields another
/// handle to the same cache.
///
/// Queries run as spawned Tokio tasks, so [`RoleResolver::request`] and the
/// async operations must be called from within a Tokio runtime.
#[derive(Clone)]
pub struct RoleResolver {
    inner: Arc<ResolverInner>,
}

impl RoleResolver {
    pub fn new(store: Arc<dyn RoleStore>) -> Self {
        Self {
            inner: Arc::new(ResolverInner {
                store,
                state: Mutex::new(ResolverState {
                    next_sequence: 0,
                    entries: HashMap::new(),
                    active: HashMap::new(),
                }),
                listeners: Listeners::new(),
            }),
        }
    }

    /// Make `(principal_id, tenant_id)` the active key for its tenant and
    /// return its current state without waiting.
    ///
    /// Issues a store query only if the key has no cached or in-flight
    /// resolution; concurrent callers share the one pending query.
    pub fn request(&self, principal_id: PrincipalId, tenant_id: TenantId) -> ResolutionState {
        let key = ResolutionKey::new(principal_id, tenant_id);

        let (state, issued, switched) = {
            let mut guard = self.inner.lock();
            let switched = guard.active.insert(tenant_id, key) != Some(key);

            if let Some(entry) = guard.entries.get(&key) {
                (entry.tx.borrow().clone(), None, switched)
            } else {
                let sequence = guard.issue();
                let state = ResolutionState::Loading { sequence };
                let (tx, _) = watch::channel(state.clone());
                guard.entries.insert(key, Entry { issued: sequence, tx });
                (state, Some(sequence), switched)
            }
        };

        match issued {
            Some(sequence) => self.start_query(key, sequence, state.clone()),
            // A cached key that just became active must be announced, or the
            // previous key's events stay the last thing subscribers saw.
            None if switched => {
                self.inner.listeners.publish(&ResolutionEvent {
                    key,
                    state: state.clone(),
                });
            }
            None => {}
        }

        state
    }

    /// Like [`RoleResolver::request`], but wait until the key has settled.
    pub async fn resolve(&self, principal_id: PrincipalId, tenant_id: TenantId) -> ResolutionState {
        let state = self.request(principal_id, tenant_id);
        if state.is_settled() {
            return state;
        }

        self.wait_for(ResolutionKey::new(principal_id, tenant_id), state.sequence())
            .await
    }

    /// Re-query the store, superseding any cached or in-flight result for the
    /// key. Never retried implicitly; this is the only retry path.
    pub async fn refresh(&self, principal_id: PrincipalId, tenant_id: TenantId) -> ResolutionState {
        let key = ResolutionKey::new(principal_id, tenant_id);
        let state = {
            let mut guard = self.inner.lock();
            guard.active.insert(tenant_id, key);

            let sequence = guard.issue();
            let state = ResolutionState::Loading { sequence };
            match guard.entries.get_mut(&key) {
                Some(entry) => {
                    entry.issued = sequence;
                    entry.tx.send_replace(state.clone());
                }
                None => {
                    let (tx, _) = watch::channel(state.clone());
                    guard.entries.insert(key, Entry { issued: sequence, tx });
                }
            }
            state
        };

        tracing::info!(
            principal_id = %principal_id,
            tenant_id = %tenant_id,
            sequence = state.sequence(),
            "refreshing role resolution"
        );

        let sequence = state.sequence();
        self.start_query(key, sequence, state);
        self.wait_for(key, sequence).await
    }

    /// Cached state for a key, without issuing anything.
    pub fn state(&self, principal_id: PrincipalId, tenant_id: TenantId) -> Option<ResolutionState> {
        let key = ResolutionKey::new(principal_id, tenant_id);
        self.inner
            .lock()
            .entries
            .get(&key)
            .map(|entry| entry.tx.borrow().clone())
    }

    /// Discard every cached resolution of `principal_id` (sign-out).
    ///
    /// Pending waiters observe [`ResolutionFailure::Discarded`]; in-flight
    /// queries still run but their results are dropped. Returns the number of
    /// keys removed.
    pub fn forget_principal(&self, principal_id: PrincipalId) -> usize {
        let removed: Vec<Entry> = {
            let mut guard = self.inner.lock();
            guard.active.retain(|_, key| key.principal_id != principal_id);

            let keys: Vec<ResolutionKey> = guard
                .entries
                .keys()
                .filter(|key| key.principal_id == principal_id)
                .copied()
                .collect();
            keys.iter()
                .filter_map(|key| guard.entries.remove(key))
                .collect()
        };

        if !removed.is_empty() {
            tracing::debug!(
                principal_id = %principal_id,
                keys = removed.len(),
                "forgot cached resolutions"
            );
        }

        removed.len()
    }

    fn start_query(&self, key: ResolutionKey, sequence: u64, loading: ResolutionState) {
        let publish = self.inner.lock().is_active(&key);
        if publish {
            self.inner.listeners.publish(&ResolutionEvent {
                key,
                state: loading,
            });
        }

        let inner = self.inner.clone();
        tokio::spawn(async move {
            let outcome = inner
                .store
                .find_role_assignment(key.principal_id, key.tenant_id)
                .await;
            let state = settle(key, sequence, outcome);
            inner.complete(key, sequence, state);
        });
    }

    async fn wait_for(&self, key: ResolutionKey, sequence: u64) -> ResolutionState {
        let rx = {
            let guard = self.inner.lock();
            guard.entries.get(&key).map(|entry| entry.tx.subscribe())
        };

        let Some(mut rx) = rx else {
            return ResolutionState::failed(sequence, ResolutionFailure::Discarded);
        };

        match rx
            .wait_for(|state| state.is_settled() && state.sequence() >= sequence)
            .await
        {
            Ok(state) => state.clone(),
            Err(_) => ResolutionState::failed(sequence, ResolutionFailure::Discarded),
        }
    }
}

impl Publisher<ResolutionEvent> for RoleResolver {
    fn subscribe(&self, listener: Listener<ResolutionEvent>) -> Subscription {
        self.inner.listeners.subscribe(listener)
    }
}

impl core::fmt::Debug for RoleResolver {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let guard = self.inner.lock();
        f.debug_struct("RoleResolver")
            .field("entries", &guard.entries.len())
            .field("next_sequence", &guard.next_sequence)
            .finish()
    }
}

/// Turn a raw store answer into a state. Never grants above viewer on any
/// path but a valid assignment for this exact tenant.
fn settle(
    key: ResolutionKey,
    sequence: u64,
    outcome: Result<Option<StoredRoleAssignment>, RoleStoreError>,
) -> ResolutionState {
    let stored = match outcome {
        Ok(Some(stored)) => stored,
        Ok(None) => {
            tracing::debug!(
                principal_id = %key.principal_id,
                tenant_id = %key.tenant_id,
                "no role assignment; using viewer"
            );
            return ResolutionState::Resolved(Resolution::fallback(sequence));
        }
        Err(err) => {
            tracing::warn!(
                principal_id = %key.principal_id,
                tenant_id = %key.tenant_id,
                error = %err,
                "role lookup failed; falling back to viewer"
            );
            return ResolutionState::failed(
                sequence,
                ResolutionFailure::RoleStoreUnavailable(err.to_string()),
            );
        }
    };

    match stored.parse() {
        Ok(assignment) if assignment.applies_to(key.tenant_id) => {
            tracing::debug!(
                principal_id = %key.principal_id,
                tenant_id = %key.tenant_id,
                role = %assignment.role,
                sequence,
                "role resolved"
            );
            ResolutionState::Resolved(Resolution::assigned(assignment.role, sequence))
        }
        Ok(assignment) => {
            tracing::warn!(
                principal_id = %key.principal_id,
                tenant_id = %key.tenant_id,
                company_id = %assignment.tenant_id,
                "role assignment belongs to another company; treating as unassigned"
            );
            ResolutionState::Resolved(Resolution::fallback(sequence))
        }
        Err(DomainError::InvalidRole(value)) => {
            tracing::warn!(
                principal_id = %key.principal_id,
                tenant_id = %key.tenant_id,
                role = %value,
                "data integrity: stored role is outside the closed set; falling back to viewer"
            );
            ResolutionState::failed(sequence, ResolutionFailure::InvalidRoleValue(value))
        }
        Err(err) => {
            tracing::warn!(
                principal_id = %key.principal_id,
                tenant_id = %key.tenant_id,
                company_id = %stored.company_id,
                error = %err,
                "role assignment has a malformed company id; treating as unassigned"
            );
            ResolutionState::Resolved(Resolution::fallback(sequence))
        }
    }
}
