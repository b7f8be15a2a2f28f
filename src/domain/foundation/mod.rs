//! Foundation module - Shared domain primitives.
//!
//! Contains the identifier value objects and the id allocation rule shared
//! by the inventory and conversation modules.

mod ids;

pub use ids::{CoffeeId, ConversationId, IdSequence};
