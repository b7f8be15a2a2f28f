//! Conversation session state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::foundation::ConversationId;

/// Who produced a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Ai,
}

/// One entry in a session's history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationMessage {
    pub sender: Sender,
    pub message: String,
    pub sent_at: DateTime<Utc>,
}

impl ConversationMessage {
    pub fn user(message: impl Into<String>) -> Self {
        Self {
            sender: Sender::User,
            message: message.into(),
            sent_at: Utc::now(),
        }
    }

    pub fn ai(message: impl Into<String>) -> Self {
        Self {
            sender: Sender::Ai,
            message: message.into(),
            sent_at: Utc::now(),
        }
    }
}

/// Lifecycle of a session. There is no terminal state; sessions live until
/// the process exits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// No messages exchanged yet.
    Created,
    /// At least one message recorded.
    Active,
}

/// Server-held state of one conversation.
#[derive(Debug, Clone)]
pub struct ConversationSession {
    id: ConversationId,
    messages: Vec<ConversationMessage>,
}

impl ConversationSession {
    /// Starts an empty session.
    pub fn new(id: ConversationId) -> Self {
        Self {
            id,
            messages: Vec::new(),
        }
    }

    pub fn id(&self) -> ConversationId {
        self.id
    }

    pub fn state(&self) -> SessionState {
        if self.messages.is_empty() {
            SessionState::Created
        } else {
            SessionState::Active
        }
    }

    /// History in the order messages were recorded.
    pub fn messages(&self) -> &[ConversationMessage] {
        &self.messages
    }

    /// Appends a message to the history.
    pub fn record(&mut self, message: ConversationMessage) {
        self.messages.push(message);
    }
}
