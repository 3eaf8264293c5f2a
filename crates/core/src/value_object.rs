//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// A record reference (`res.partner,<id>`) or a parsed domain predicate has no
/// identity of its own: two references to the same record are the same value.
/// Value objects are immutable; build a new one instead of mutating.
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
