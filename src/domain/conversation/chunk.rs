//! Streamed assistant output.

use serde::{Deserialize, Serialize};

use crate::domain::coffee::CoffeeDetails;

/// A coffee the assistant proposes adding to the inventory.
///
/// Same shape as a create request so a client can submit it unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CoffeeSuggestion(pub CoffeeDetails);

/// Payload of a single chunk: a text fragment or a structured suggestion.
///
/// Distinguished on the wire by JSON type (string vs object).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AiResponse {
    Text(String),
    Suggestion(CoffeeSuggestion),
}

/// One unit of a `sendUserMessage` stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiResponseChunk {
    pub response: AiResponse,
}

impl AiResponseChunk {
    pub fn text(fragment: impl Into<String>) -> Self {
        Self {
            response: AiResponse::Text(fragment.into()),
        }
    }

    pub fn suggestion(suggestion: CoffeeSuggestion) -> Self {
        Self {
            response: AiResponse::Suggestion(suggestion),
        }
    }

    /// The text fragment, if this is a text chunk.
    pub fn as_text(&self) -> Option<&str> {
        match &self.response {
            AiResponse::Text(text) => Some(text),
            AiResponse::Suggestion(_) => None,
        }
    }
}
