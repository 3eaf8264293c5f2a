//! Entity trait: identity + continuity across state changes.

/// Entity marker + minimal interface.
///
/// Campaigns, campaign lines and mailbox entries are entities: a line whose
/// state moves from `to_send` to `sent` is still the same line.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> &Self::Id;
}
