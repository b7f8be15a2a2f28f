//! Echo Provider - offline AIProvider that repeats the user's message back.
//!
//! Needs no credentials or network, so it backs local development and the
//! end-to-end tests. Replies are streamed one word at a time with an optional
//! pause between words.

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::time::Duration;
use tokio::time::sleep;

use crate::ports::{
    AIError, AIProvider, ChunkStream, CompletionRequest, FinishReason, OutputSchema, ProviderInfo,
    StreamChunk, TokenUsage,
};

/// Provider whose reply is always `Got it. You said: "<message>"`.
#[derive(Debug, Clone, Default)]
pub struct EchoAIProvider {
    word_delay: Duration,
}

impl EchoAIProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pause inserted before each streamed word.
    pub fn with_word_delay(mut self, delay: Duration) -> Self {
        self.word_delay = delay;
        self
    }

    /// The reply for a request: echoes its latest user message.
    pub fn reply_for(request: &CompletionRequest) -> String {
        format!(
            "Got it. You said: \"{}\"",
            request.last_user_message().unwrap_or_default()
        )
    }

    /// Usage counted in whitespace-separated words.
    fn usage_for(request: &CompletionRequest, reply: &str) -> TokenUsage {
        let words = |text: &str| text.split_whitespace().count() as u32;
        let prompt = request.messages.iter().map(|m| words(&m.content)).sum();
        TokenUsage::new(prompt, words(reply))
    }
}

#[async_trait]
impl AIProvider for EchoAIProvider {
    async fn stream_complete(&self, request: CompletionRequest) -> Result<ChunkStream, AIError> {
        let reply = Self::reply_for(&request);
        let usage = Self::usage_for(&request, &reply);
        let delay = self.word_delay;

        let words: Vec<String> = reply.split_inclusive(' ').map(str::to_string).collect();
        let deltas = stream::iter(words).then(move |word| async move {
            if !delay.is_zero() {
                sleep(delay).await;
            }
            Ok(StreamChunk::content(word))
        });
        let done = stream::once(async move { Ok(StreamChunk::final_chunk(FinishReason::Stop, usage)) });

        Ok(Box::pin(deltas.chain(done)))
    }

    async fn generate_object(
        &self,
        _request: CompletionRequest,
        schema: &OutputSchema,
    ) -> Result<serde_json::Value, AIError> {
        Err(AIError::invalid_request(format!(
            "echo provider cannot produce structured output '{}'",
            schema.name
        )))
    }

    fn provider_info(&self) -> ProviderInfo {
        ProviderInfo::new("echo", "echo").with_structured_output(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::ConversationId;
    use crate::ports::{Message, RequestMetadata};

    fn request(messages: Vec<Message>) -> CompletionRequest {
        CompletionRequest::new(RequestMetadata::new(ConversationId::new(1))).with_messages(messages)
    }

    #[test]
    fn reply_echoes_latest_user_message() {
        let reply = EchoAIProvider::reply_for(&request(vec![
            Message::user("old"),
            Message::assistant("Got it. You said: \"old\""),
            Message::user("hello there"),
        ]));

        assert_eq!(reply, "Got it. You said: \"hello there\"");
    }

    #[tokio::test]
    async fn stream_concatenates_to_full_reply() {
        let provider = EchoAIProvider::new();
        let mut stream = provider
            .stream_complete(request(vec![Message::user("two words")]))
            .await
            .unwrap();

        let mut text = String::new();
        let mut deltas = 0;
        let mut finals = 0;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.unwrap();
            if chunk.is_final() {
                finals += 1;
                assert_eq!(chunk.finish_reason, Some(FinishReason::Stop));
                assert_eq!(chunk.usage, Some(TokenUsage::new(2, 6)));
            } else {
                deltas += 1;
                text.push_str(&chunk.delta);
            }
        }

        assert_eq!(text, "Got it. You said: \"two words\"");
        assert_eq!(deltas, 6);
        assert_eq!(finals, 1);
    }

    #[tokio::test]
    async fn structured_output_is_unsupported() {
        let provider = EchoAIProvider::new();
        assert!(!provider.provider_info().supports_structured_output);

        let schema = OutputSchema::new("x", serde_json::json!({}));
        let err = provider
            .generate_object(request(vec![Message::user("hi")]), &schema)
            .await
            .unwrap_err();
        assert!(matches!(err, AIError::InvalidRequest(_)));
    }
}
