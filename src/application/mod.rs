//! Application layer - stateful services.
//!
//! Each service owns its in-memory state and exposes the operations the RPC
//! procedures call. Outbound capabilities are reached through ports.

mod conversation_service;
mod foo_service;
mod inventory_service;

pub use conversation_service::{AiResponseStream, ConversationService, ConversationSettings};
pub use foo_service::{FooService, FooSettings};
pub use inventory_service::InventoryService;
