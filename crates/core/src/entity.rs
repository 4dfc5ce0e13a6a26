//! Entity trait: identity + continuity across state changes.

/// Entity marker + minimal interface.
///
/// Documents are entities: a document keeps its identity while it moves
/// through the acknowledgment lifecycle.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> &Self::Id;
}
