//! `tenantgate-core` — foundation building blocks shared by every crate.
//!
//! This crate contains **pure** primitives (no IO, no async).

pub mod error;
pub mod id;
pub mod value_object;

pub use error::{DomainError, DomainResult};
pub use id::{PrincipalId, TenantId};
pub use value_object::ValueObject;
