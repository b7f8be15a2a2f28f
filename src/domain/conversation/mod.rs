//! Conversation domain: chat sessions, their message history, and the
//! chunks an assistant reply is streamed as.

mod chunk;
mod errors;
mod session;

pub use chunk::{AiResponse, AiResponseChunk, CoffeeSuggestion};
pub use errors::ConversationNotFound;
pub use session::{ConversationMessage, ConversationSession, Sender, SessionState};
