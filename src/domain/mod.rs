//! Domain layer containing business types and rules.
//!
//! # Module Organization
//!
//! - `foundation` - Shared primitives (ids, id sequences)
//! - `coffee` - Coffee records, name uniqueness, seed inventory
//! - `conversation` - Chat sessions, message history, streamed reply chunks
//! - `demo` - Fixed content for the demo streaming procedures

pub mod coffee;
pub mod conversation;
pub mod demo;
pub mod foundation;
