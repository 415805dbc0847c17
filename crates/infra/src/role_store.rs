use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use tenantgate_access::{RoleStore, RoleStoreError};
use tenantgate_auth::{PrincipalId, StoredRoleAssignment, TenantId};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
struct AssignmentKey {
    principal_id: PrincipalId,
    tenant_id: TenantId,
}

/// One row of a JSON role fixture.
///
/// `role` and `companyId` are kept as raw strings so fixtures can reproduce
/// bad data (unknown roles, foreign companies).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleSeed {
    pub principal_id: PrincipalId,
    pub tenant_id: TenantId,
    pub role: String,
    #[serde(default)]
    pub company_id: Option<String>,
}

#[derive(Debug, Error)]
pub enum SeedError {
    #[error("invalid role fixture: {0}")]
    Parse(#[from] serde_json::Error),
}

/// In-memory role store.
///
/// Intended for tests/dev. Supports simulated outages and per-principal
/// latency so callers can exercise the resolver's ordering rules.
#[derive(Debug, Default)]
pub struct InMemoryRoleStore {
    assignments: RwLock<HashMap<AssignmentKey, StoredRoleAssignment>>,
    latency: RwLock<HashMap<PrincipalId, Duration>>,
    unavailable: AtomicBool,
    queries: AtomicUsize,
}

impl InMemoryRoleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load assignments from a JSON array of [`RoleSeed`] rows.
    pub fn from_json(json: &str) -> Result<Self, SeedError> {
        let seeds: Vec<RoleSeed> = serde_json::from_str(json)?;
        let store = Self::new();
        for seed in seeds {
            let company_id = seed
                .company_id
                .unwrap_or_else(|| seed.tenant_id.to_string());
            store.insert(
                seed.principal_id,
                seed.tenant_id,
                StoredRoleAssignment::new(seed.role, company_id),
            );
        }
        Ok(store)
    }

    /// Assign a raw role value; the company id is the tenant itself.
    pub fn assign(&self, principal_id: PrincipalId, tenant_id: TenantId, role: impl Into<String>) {
        self.insert(principal_id, tenant_id, StoredRoleAssignment::new(role, tenant_id));
    }

    pub fn insert(&self, principal_id: PrincipalId, tenant_id: TenantId, stored: StoredRoleAssignment) {
        let key = AssignmentKey {
            principal_id,
            tenant_id,
        };
        write(&self.assignments).insert(key, stored);
    }

    pub fn revoke(&self, principal_id: PrincipalId, tenant_id: TenantId) {
        let key = AssignmentKey {
            principal_id,
            tenant_id,
        };
        write(&self.assignments).remove(&key);
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Delay every lookup for `principal_id` by `latency`.
    pub fn set_latency(&self, principal_id: PrincipalId, latency: Duration) {
        write(&self.latency).insert(principal_id, latency);
    }

    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }
}

fn write<T>(lock: &RwLock<T>) -> std::sync::RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(std::sync::PoisonError::into_inner)
}

#[async_trait]
impl RoleStore for InMemoryRoleStore {
    async fn find_role_assignment(
        &self,
        principal_id: PrincipalId,
        tenant_id: TenantId,
    ) -> Result<Option<StoredRoleAssignment>, RoleStoreError> {
        self.queries.fetch_add(1, Ordering::SeqCst);

        let latency = self
            .latency
            .read()
            .map_err(|_| RoleStoreError::Unavailable("lock poisoned".to_string()))?
            .get(&principal_id)
            .copied();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        if self.unavailable.load(Ordering::SeqCst) {
            return Err(RoleStoreError::Unavailable("role store offline".to_string()));
        }

        let key = AssignmentKey {
            principal_id,
            tenant_id,
        };
        let assignments = self
            .assignments
            .read()
            .map_err(|_| RoleStoreError::Unavailable("lock poisoned".to_string()))?;
        Ok(assignments.get(&key).cloned())
    }
}
