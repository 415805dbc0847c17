use std::sync::Arc;

use anyhow::{Context, Result};
use serde_json::json;

use tenantgate_access::{AccessConfig, RoleResolver};
use tenantgate_auth::{AccessRequirement, RbacRegistry, Role, StoredRoleAssignment, explain as explain_decision};
use tenantgate_infra::InMemoryRoleStore;
use tenantgate_observability::LogConfig;

use crate::SimulateArgs;

pub fn roles() -> Result<String> {
    let registry = RbacRegistry::from_table();
    Ok(serde_json::to_string_pretty(&registry.roles)?)
}

pub fn permissions() -> Result<String> {
    let registry = RbacRegistry::from_table();
    Ok(serde_json::to_string_pretty(&registry.permissions)?)
}

pub fn explain(role: Role, requirement: &AccessRequirement) -> Result<String> {
    let explanation = explain_decision(role, &role.permissions(), requirement);
    Ok(serde_json::to_string_pretty(&explanation)?)
}

pub async fn simulate(args: SimulateArgs) -> Result<String> {
    let tenant_id = args.tenant.unwrap_or_default();
    let principal_id = args.principal.unwrap_or_default();

    let store = match &args.fixture {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("reading fixture {}", path.display()))?;
            InMemoryRoleStore::from_json(&json)?
        }
        None => {
            let store = InMemoryRoleStore::new();
            if let Some(role) = &args.role {
                let company_id = args
                    .company_id
                    .clone()
                    .unwrap_or_else(|| tenant_id.to_string());
                store.insert(principal_id, tenant_id, StoredRoleAssignment::new(role.clone(), company_id));
            }
            store
        }
    };
    store.set_unavailable(args.unavailable);

    let resolver = RoleResolver::new(Arc::new(store));
    let state = resolver.resolve(principal_id, tenant_id).await;
    let requirement = args.requirement.to_requirement();
    let decision = state.decide(&requirement);
    let explanation = state
        .resolution()
        .map(|resolution| explain_decision(resolution.role, &resolution.permissions, &requirement));

    tracing::debug!(
        principal_id = %principal_id,
        tenant_id = %tenant_id,
        allowed = decision.is_allowed(),
        "simulated resolution"
    );

    let output = json!({
        "principalId": principal_id,
        "tenantId": tenant_id,
        "state": state,
        "notice": state.notice().map(|notice| notice.message()),
        "allowed": decision.is_allowed(),
        "explanation": explanation,
    });
    Ok(serde_json::to_string_pretty(&output)?)
}

pub fn config(log: &LogConfig) -> Result<String> {
    let access = AccessConfig::from_env()?;
    let output = json!({
        "access": access,
        "log": log,
    });
    Ok(serde_json::to_string_pretty(&output)?)
}
