//! Infrastructure layer: in-process collaborator adapters.
//!
//! Production deployments plug their hosted auth provider and role store in
//! through the `tenantgate-access` traits; the in-memory adapters here back
//! tests, demos and the CLI.

pub mod auth_provider;
pub mod role_store;

mod integration_tests;

pub use auth_provider::InMemoryAuthProvider;
pub use role_store::{InMemoryRoleStore, RoleSeed, SeedError};
