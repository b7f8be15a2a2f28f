//! Strongly-typed identifier value objects.
//!
//! Both coffees and conversations use plain integers on the wire. Ids are
//! handed out by an [`IdSequence`], which only ever moves forward, so an id
//! is never reused within a process even after its record is removed.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for a coffee product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CoffeeId(i64);

impl CoffeeId {
    /// Creates a CoffeeId from a raw integer.
    pub const fn new(value: i64) -> Self {
        Self(value)
    }

    /// Returns the raw integer value.
    pub const fn value(&self) -> i64 {
        self.0
    }
}

impl From<i64> for CoffeeId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl fmt::Display for CoffeeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a chat conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationId(i64);

impl ConversationId {
    /// Creates a ConversationId from a raw integer.
    pub const fn new(value: i64) -> Self {
        Self(value)
    }

    /// Returns the raw integer value.
    pub const fn value(&self) -> i64 {
        self.0
    }
}

impl From<i64> for ConversationId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Monotonic id allocator.
///
/// Not synchronized on its own: it lives inside the state cell of the
/// service that owns it and is advanced under that cell's lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdSequence {
    next: i64,
}

impl IdSequence {
    /// Starts a sequence whose first allocation is `first`.
    pub fn starting_at(first: i64) -> Self {
        Self { next: first }
    }

    /// Starts a sequence after the largest id already in use.
    ///
    /// An empty set of existing ids starts the sequence at 1.
    pub fn after<I>(existing: I) -> Self
    where
        I: IntoIterator<Item = i64>,
    {
        let max = existing.into_iter().max().unwrap_or(0);
        Self::starting_at(max + 1)
    }

    /// Allocates the next id.
    pub fn allocate(&mut self) -> i64 {
        let id = self.next;
        self.next += 1;
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coffee_id_serializes_as_plain_integer() {
        let json = serde_json::to_string(&CoffeeId::new(7)).unwrap();
        assert_eq!(json, "7");

        let id: CoffeeId = serde_json::from_str("42").unwrap();
        assert_eq!(id.value(), 42);
    }

    #[test]
    fn conversation_id_displays_inner_value() {
        assert_eq!(ConversationId::new(3).to_string(), "3");
    }

    #[test]
    fn sequence_after_existing_starts_past_max() {
        let mut seq = IdSequence::after([1, 6, 3]);
        assert_eq!(seq.allocate(), 7);
        assert_eq!(seq.allocate(), 8);
    }

    #[test]
    fn sequence_after_nothing_starts_at_one() {
        let mut seq = IdSequence::after(std::iter::empty());
        assert_eq!(seq.allocate(), 1);
    }

    #[test]
    fn sequence_never_repeats() {
        let mut seq = IdSequence::starting_at(1);
        let ids: Vec<i64> = (0..100).map(|_| seq.allocate()).collect();
        assert!(ids.windows(2).all(|w| w[1] > w[0]));
        assert_eq!(seq.allocate(), 101);
    }
}
