//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the application services and the outside world. Adapters implement them.
//!
//! - `AIProvider` - The external text/object completion capability

mod ai_provider;

pub use ai_provider::{
    AIError, AIProvider, ChunkStream, CompletionRequest, FinishReason, Message, MessageRole,
    OutputSchema, ProviderInfo, RequestMetadata, StreamChunk, TokenUsage,
};
