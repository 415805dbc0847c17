//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Value objects are **immutable** and **compared by value**. To "modify" one,
/// build a new value; never patch an existing one in place. Permission sets
/// and role assignments are modelled this way so that a role change always
/// produces a fresh value that can be compared against the previous one.
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
