//! Conversation service.
//!
//! Keeps a registry of chat sessions and streams assistant replies from the
//! completion capability. The user's message is recorded before the reply
//! stream starts; the assistant's reply is recorded in one step once
//! generation has finished. A reply that fails or is abandoned by its
//! consumer leaves only the user's message behind. A reply that fails or
//! panics ends its stream with `ConversationNotFound`.

use futures::{FutureExt, Stream, StreamExt};
use once_cell::sync::Lazy;
use serde_json::json;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tokio_stream::wrappers::ReceiverStream;

use crate::domain::conversation::{
    AiResponseChunk, CoffeeSuggestion, ConversationMessage, ConversationNotFound,
    ConversationSession, Sender,
};
use crate::domain::foundation::{ConversationId, IdSequence};
use crate::ports::{
    AIError, AIProvider, CompletionRequest, Message, MessageRole, OutputSchema, RequestMetadata,
};

/// Reply chunks for one `send_user_message` call. Consumed once.
pub type AiResponseStream =
    Pin<Box<dyn Stream<Item = Result<AiResponseChunk, ConversationNotFound>> + Send>>;

const DEFAULT_SYSTEM_PROMPT: &str = "You are the assistant for Cool Beans, a specialty coffee \
shop. Help customers find coffees they will enjoy and answer questions about origins, \
roasts and brewing. Keep answers short and friendly.";

static SUGGESTION_SCHEMA: Lazy<OutputSchema> = Lazy::new(|| {
    OutputSchema::new(
        "coffee_suggestion",
        json!({
            "type": "object",
            "properties": {
                "name": { "type": "string" },
                "origin": { "type": "string" },
                "roast": { "type": "string" },
                "price": { "type": "number" },
                "weight": { "type": "string" },
                "description": { "type": "string" },
                "inStock": { "type": "boolean" }
            },
            "required": ["name", "origin", "roast", "price", "weight", "description", "inStock"],
            "additionalProperties": false
        }),
    )
});

/// Tunables for reply generation.
#[derive(Debug, Clone)]
pub struct ConversationSettings {
    pub system_prompt: String,
    /// Append a structured coffee suggestion after the text reply when the
    /// provider supports structured output.
    pub suggestions_enabled: bool,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    /// Chunks buffered between the producer task and the consumer.
    pub chunk_buffer: usize,
}

impl Default for ConversationSettings {
    fn default() -> Self {
        Self {
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            suggestions_enabled: true,
            temperature: None,
            max_tokens: None,
            chunk_buffer: 32,
        }
    }
}

struct Registry {
    sessions: HashMap<ConversationId, ConversationSession>,
    ids: IdSequence,
}

/// Chat session registry backed by an [`AIProvider`].
pub struct ConversationService {
    provider: Arc<dyn AIProvider>,
    registry: Arc<RwLock<Registry>>,
    settings: ConversationSettings,
}

impl ConversationService {
    pub fn new(provider: Arc<dyn AIProvider>, settings: ConversationSettings) -> Self {
        Self {
            provider,
            registry: Arc::new(RwLock::new(Registry {
                sessions: HashMap::new(),
                ids: IdSequence::starting_at(1),
            })),
            settings,
        }
    }

    /// Opens a new, empty session.
    pub async fn create_conversation(&self) -> ConversationId {
        let mut registry = self.registry.write().await;
        let id = ConversationId::new(registry.ids.allocate());
        registry.sessions.insert(id, ConversationSession::new(id));

        tracing::info!(conversation.id = %id, "conversation created");
        id
    }

    /// Returns the recorded messages of a session, oldest first.
    pub async fn history(&self, id: ConversationId) -> Result<Vec<ConversationMessage>, ConversationNotFound> {
        let registry = self.registry.read().await;
        registry
            .sessions
            .get(&id)
            .map(|session| session.messages().to_vec())
            .ok_or(ConversationNotFound { id })
    }

    /// Records `message` and starts streaming the assistant's reply.
    ///
    /// Fails before any stream exists when the session is unknown; no session
    /// is created in that case. Dropping the returned stream stops generation.
    pub async fn send_user_message(
        &self,
        id: ConversationId,
        message: String,
    ) -> Result<AiResponseStream, ConversationNotFound> {
        let context = {
            let mut registry = self.registry.write().await;
            let session = registry
                .sessions
                .get_mut(&id)
                .ok_or(ConversationNotFound { id })?;
            session.record(ConversationMessage::user(message.clone()));
            session
                .messages()
                .iter()
                .map(|m| match m.sender {
                    Sender::User => Message::user(&m.message),
                    Sender::Ai => Message::assistant(&m.message),
                })
                .collect::<Vec<_>>()
        };

        tracing::info!(conversation.id = %id, messages = context.len(), "user message received");

        let request = self.request(id).with_messages(context);
        let (tx, rx) = mpsc::channel(self.settings.chunk_buffer.max(1));
        let reply = ReplyTask {
            id,
            message,
            request,
            provider: Arc::clone(&self.provider),
            registry: Arc::clone(&self.registry),
            settings: self.settings.clone(),
        };

        tokio::spawn(async move {
            tokio::select! {
                _ = tx.closed() => {
                    tracing::debug!(conversation.id = %id, "reply consumer went away, stopping generation");
                }
                outcome = AssertUnwindSafe(reply.run(&tx)).catch_unwind() => {
                    if outcome.is_err() {
                        tracing::error!(conversation.id = %id, "reply generation panicked");
                        let _ = tx.send(Err(ConversationNotFound { id })).await;
                    }
                }
            }
        });

        Ok(Box::pin(ReceiverStream::new(rx)))
    }

    fn request(&self, id: ConversationId) -> CompletionRequest {
        let mut request = CompletionRequest::new(RequestMetadata::new(id))
            .with_system_prompt(&self.settings.system_prompt);
        if let Some(temperature) = self.settings.temperature {
            request = request.with_temperature(temperature);
        }
        if let Some(max_tokens) = self.settings.max_tokens {
            request = request.with_max_tokens(max_tokens);
        }
        request
    }
}

type ChunkSender = mpsc::Sender<Result<AiResponseChunk, ConversationNotFound>>;

/// Producer side of one reply stream.
struct ReplyTask {
    id: ConversationId,
    message: String,
    request: CompletionRequest,
    provider: Arc<dyn AIProvider>,
    registry: Arc<RwLock<Registry>>,
    settings: ConversationSettings,
}

/// Why a reply stopped early.
enum Halt {
    /// The consumer dropped its end of the channel.
    Closed,
    /// The completion capability failed.
    Provider(AIError),
}

impl ReplyTask {
    async fn run(self, tx: &ChunkSender) {
        match self.generate(tx).await {
            Ok(reply) => {
                let mut registry = self.registry.write().await;
                if let Some(session) = registry.sessions.get_mut(&self.id) {
                    session.record(ConversationMessage::ai(reply));
                }
                tracing::debug!(conversation.id = %self.id, "assistant reply recorded");
            }
            Err(Halt::Closed) => {
                tracing::debug!(conversation.id = %self.id, "reply consumer went away");
            }
            Err(Halt::Provider(err)) => {
                tracing::warn!(
                    conversation.id = %self.id,
                    trace_id = %self.request.metadata.trace_id,
                    error = %err,
                    "completion failed, reporting conversation as not found"
                );
                let _ = tx.send(Err(ConversationNotFound { id: self.id })).await;
            }
        }
    }

    /// Streams the text reply, then the optional suggestion. Returns the full
    /// reply text.
    async fn generate(&self, tx: &ChunkSender) -> Result<String, Halt> {
        let mut stream = self
            .provider
            .stream_complete(self.request.clone())
            .await
            .map_err(Halt::Provider)?;

        let mut reply = String::new();
        while let Some(item) = stream.next().await {
            let chunk = item.map_err(Halt::Provider)?;
            let done = chunk.is_final();
            if !chunk.delta.is_empty() {
                reply.push_str(&chunk.delta);
                tx.send(Ok(AiResponseChunk::text(chunk.delta)))
                    .await
                    .map_err(|_| Halt::Closed)?;
            }
            if done {
                break;
            }
        }

        if self.settings.suggestions_enabled && self.provider.provider_info().supports_structured_output {
            let suggestion = self.suggest().await.map_err(Halt::Provider)?;
            tx.send(Ok(AiResponseChunk::suggestion(suggestion)))
                .await
                .map_err(|_| Halt::Closed)?;
        }

        Ok(reply)
    }

    async fn suggest(&self) -> Result<CoffeeSuggestion, AIError> {
        let request = CompletionRequest::new(self.request.metadata.clone())
            .with_system_prompt(
                "Propose one coffee the shop could add to its inventory. \
                 Prices are in US dollars; weight is a bag size such as \"12oz\".",
            )
            .with_message(
                MessageRole::User,
                format!("Suggest a coffee based on: {}", self.message),
            );

        let value = self.provider.generate_object(request, &SUGGESTION_SCHEMA).await?;
        serde_json::from_value(value)
            .map_err(|e| AIError::parse(format!("suggestion does not match schema: {}", e)))
    }
}
