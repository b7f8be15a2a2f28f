//! Mock AI Provider for testing.
//!
//! Provides a configurable mock implementation of the AIProvider port,
//! allowing tests to run without calling real AI APIs.
//!
//! # Features
//!
//! - Pre-configured text responses and structured objects
//! - Simulated delays, per request and per streamed chunk
//! - Error injection, before a stream starts or part-way through it
//! - Panic injection part-way through a stream
//! - Call tracking for verification
//!
//! # Example
//!
//! ```ignore
//! let provider = MockAIProvider::new()
//!     .with_response("Hello, I'm the assistant!")
//!     .with_delay(Duration::from_millis(100));
//!
//! let stream = provider.stream_complete(request).await?;
//! assert_eq!(provider.call_count(), 1);
//! ```

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::task::Poll;
use std::time::Duration;
use tokio::time::sleep;

use crate::ports::{
    AIError, AIProvider, ChunkStream, CompletionRequest, FinishReason, OutputSchema, ProviderInfo,
    StreamChunk, TokenUsage,
};

/// Mock AI provider for testing.
///
/// Configurable to return specific responses, simulate delays, or inject errors.
#[derive(Debug, Clone)]
pub struct MockAIProvider {
    /// Pre-configured responses (consumed in order).
    responses: Arc<Mutex<VecDeque<MockResponse>>>,
    /// Pre-configured structured outputs (consumed in order).
    objects: Arc<Mutex<VecDeque<Result<serde_json::Value, MockError>>>>,
    /// Provider info to return.
    info: ProviderInfo,
    /// Simulated latency per request.
    delay: Duration,
    /// Simulated latency before each streamed chunk.
    chunk_delay: Duration,
    /// Call history for verification.
    calls: Arc<Mutex<Vec<CompletionRequest>>>,
    /// Schemas passed to `generate_object`, in call order.
    schemas: Arc<Mutex<Vec<OutputSchema>>>,
}

/// A configured mock response.
#[derive(Debug, Clone)]
pub enum MockResponse {
    /// Return a successful completion.
    Success {
        content: String,
        usage: TokenUsage,
        finish_reason: FinishReason,
    },
    /// Stream `content`, then fail.
    Interrupted { content: String, error: MockError },
    /// Stream `content`, then panic on the next poll.
    Panicking { content: String },
    /// Return an error.
    Error(MockError),
}

/// Mock error types for testing error handling.
#[derive(Debug, Clone)]
pub enum MockError {
    /// Simulate rate limiting.
    RateLimited { retry_after_secs: u32 },
    /// Simulate context too long.
    ContextTooLong { tokens: u32, max: u32 },
    /// Simulate content filtering.
    ContentFiltered { reason: String },
    /// Simulate provider unavailable.
    Unavailable { message: String },
    /// Simulate authentication failure.
    AuthenticationFailed,
    /// Simulate network error.
    Network { message: String },
    /// Simulate malformed provider output.
    Parse { message: String },
    /// Simulate timeout.
    Timeout { timeout_secs: u32 },
}

impl From<MockError> for AIError {
    fn from(err: MockError) -> Self {
        match err {
            MockError::RateLimited { retry_after_secs } => AIError::rate_limited(retry_after_secs),
            MockError::ContextTooLong { tokens, max } => AIError::context_too_long(tokens, max),
            MockError::ContentFiltered { reason } => AIError::content_filtered(reason),
            MockError::Unavailable { message } => AIError::unavailable(message),
            MockError::AuthenticationFailed => AIError::AuthenticationFailed,
            MockError::Network { message } => AIError::network(message),
            MockError::Parse { message } => AIError::parse(message),
            MockError::Timeout { timeout_secs } => AIError::Timeout { timeout_secs },
        }
    }
}

/// Locks a mock's shared state. A test that panicked while holding the lock
/// leaves the data usable, so poisoning is ignored.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Splits text into word-sized deltas whose concatenation is the input.
fn word_deltas(content: &str) -> Vec<String> {
    content.split_inclusive(' ').map(str::to_string).collect()
}

impl Default for MockAIProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MockAIProvider {
    /// Creates a new mock provider with default settings.
    pub fn new() -> Self {
        Self {
            responses: Arc::new(Mutex::new(VecDeque::new())),
            objects: Arc::new(Mutex::new(VecDeque::new())),
            info: ProviderInfo::new("mock", "mock-model-1").with_structured_output(false),
            delay: Duration::ZERO,
            chunk_delay: Duration::ZERO,
            calls: Arc::new(Mutex::new(Vec::new())),
            schemas: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Adds a successful response to the queue.
    pub fn with_response(self, content: impl Into<String>) -> Self {
        self.with_response_full(content, TokenUsage::new(10, 20), FinishReason::Stop)
    }

    /// Adds a successful response with full configuration.
    pub fn with_response_full(
        self,
        content: impl Into<String>,
        usage: TokenUsage,
        finish_reason: FinishReason,
    ) -> Self {
        lock(&self.responses).push_back(MockResponse::Success {
            content: content.into(),
            usage,
            finish_reason,
        });
        self
    }

    /// Adds a response that streams `content` and then fails with `error`.
    pub fn with_interrupted_response(self, content: impl Into<String>, error: MockError) -> Self {
        lock(&self.responses).push_back(MockResponse::Interrupted {
            content: content.into(),
            error,
        });
        self
    }

    /// Adds a response that streams `content` and then panics.
    pub fn with_panicking_response(self, content: impl Into<String>) -> Self {
        lock(&self.responses).push_back(MockResponse::Panicking {
            content: content.into(),
        });
        self
    }

    /// Adds an error response to the queue.
    pub fn with_error(self, error: MockError) -> Self {
        lock(&self.responses).push_back(MockResponse::Error(error));
        self
    }

    /// Adds a structured output for `generate_object` and enables
    /// structured output in the reported provider info.
    pub fn with_object(mut self, object: serde_json::Value) -> Self {
        lock(&self.objects).push_back(Ok(object));
        self.info.supports_structured_output = true;
        self
    }

    /// Adds a `generate_object` failure and enables structured output.
    pub fn with_object_error(mut self, error: MockError) -> Self {
        lock(&self.objects).push_back(Err(error));
        self.info.supports_structured_output = true;
        self
    }

    /// Sets simulated latency per request.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Sets simulated latency before each streamed chunk.
    pub fn with_chunk_delay(mut self, delay: Duration) -> Self {
        self.chunk_delay = delay;
        self
    }

    /// Sets the provider info.
    pub fn with_provider_info(mut self, info: ProviderInfo) -> Self {
        self.info = info;
        self
    }

    /// Returns the number of calls made to this provider.
    pub fn call_count(&self) -> usize {
        lock(&self.calls).len()
    }

    /// Returns all recorded calls.
    pub fn get_calls(&self) -> Vec<CompletionRequest> {
        lock(&self.calls).clone()
    }

    /// Returns the schemas passed to `generate_object`.
    pub fn get_schemas(&self) -> Vec<OutputSchema> {
        lock(&self.schemas).clone()
    }

    /// Clears the call history.
    pub fn clear_calls(&self) {
        lock(&self.calls).clear();
        lock(&self.schemas).clear();
    }

    /// Gets the next response or a default.
    fn next_response(&self) -> MockResponse {
        lock(&self.responses)
            .pop_front()
            .unwrap_or_else(|| MockResponse::Success {
                content: "Mock response".to_string(),
                usage: TokenUsage::new(5, 10),
                finish_reason: FinishReason::Stop,
            })
    }

    async fn record(&self, request: CompletionRequest) {
        lock(&self.calls).push(request);
        if !self.delay.is_zero() {
            sleep(self.delay).await;
        }
    }

    fn paced(&self, items: Vec<Result<StreamChunk, AIError>>) -> ChunkStream {
        let chunk_delay = self.chunk_delay;
        Box::pin(stream::iter(items).then(move |item| async move {
            if !chunk_delay.is_zero() {
                sleep(chunk_delay).await;
            }
            item
        }))
    }
}

#[async_trait]
impl AIProvider for MockAIProvider {
    async fn stream_complete(&self, request: CompletionRequest) -> Result<ChunkStream, AIError> {
        self.record(request).await;

        match self.next_response() {
            MockResponse::Success {
                content,
                usage,
                finish_reason,
            } => {
                let mut items: Vec<Result<StreamChunk, AIError>> = word_deltas(&content)
                    .into_iter()
                    .map(|delta| Ok(StreamChunk::content(delta)))
                    .collect();
                items.push(Ok(StreamChunk::final_chunk(finish_reason, usage)));
                Ok(self.paced(items))
            }
            MockResponse::Interrupted { content, error } => {
                let mut items: Vec<Result<StreamChunk, AIError>> = word_deltas(&content)
                    .into_iter()
                    .map(|delta| Ok(StreamChunk::content(delta)))
                    .collect();
                items.push(Err(error.into()));
                Ok(self.paced(items))
            }
            MockResponse::Panicking { content } => {
                let items = word_deltas(&content)
                    .into_iter()
                    .map(|delta| Ok(StreamChunk::content(delta)))
                    .collect();
                let boom = stream::poll_fn(|_| -> Poll<Option<Result<StreamChunk, AIError>>> {
                    panic!("mock provider stream panicked")
                });
                Ok(Box::pin(self.paced(items).chain(boom)))
            }
            MockResponse::Error(err) => Err(err.into()),
        }
    }

    async fn generate_object(
        &self,
        request: CompletionRequest,
        schema: &OutputSchema,
    ) -> Result<serde_json::Value, AIError> {
        lock(&self.schemas).push(schema.clone());
        self.record(request).await;

        match lock(&self.objects).pop_front() {
            Some(Ok(object)) => Ok(object),
            Some(Err(err)) => Err(err.into()),
            None => Err(AIError::invalid_request("no structured output configured")),
        }
    }

    fn provider_info(&self) -> ProviderInfo {
        self.info.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::ConversationId;
    use crate::ports::{MessageRole, RequestMetadata};
    use serde_json::json;

    fn test_request() -> CompletionRequest {
        CompletionRequest::new(RequestMetadata::new(ConversationId::new(1)))
            .with_message(MessageRole::User, "Hello")
    }

    async fn collect_text(mut stream: ChunkStream) -> (String, Option<StreamChunk>, Option<AIError>) {
        let mut content = String::new();
        let mut final_chunk = None;
        let mut error = None;
        while let Some(result) = stream.next().await {
            match result {
                Ok(chunk) if chunk.is_final() => final_chunk = Some(chunk),
                Ok(chunk) => content.push_str(&chunk.delta),
                Err(err) => error = Some(err),
            }
        }
        (content, final_chunk, error)
    }

    async fn reply_text(provider: &MockAIProvider) -> String {
        let stream = provider.stream_complete(test_request()).await.unwrap();
        collect_text(stream).await.0
    }

    #[tokio::test]
    async fn mock_provider_streams_configured_response() {
        let provider = MockAIProvider::new().with_response_full(
            "Hello from mock!",
            TokenUsage::new(3, 4),
            FinishReason::Length,
        );

        let stream = provider.stream_complete(test_request()).await.unwrap();
        let (content, final_chunk, _) = collect_text(stream).await;

        assert_eq!(content, "Hello from mock!");
        let final_chunk = final_chunk.unwrap();
        assert_eq!(final_chunk.finish_reason, Some(FinishReason::Length));
        assert_eq!(final_chunk.usage, Some(TokenUsage::new(3, 4)));
        assert_eq!(provider.provider_info().model, "mock-model-1");
    }

    #[tokio::test]
    async fn mock_provider_returns_responses_in_order() {
        let provider = MockAIProvider::new()
            .with_response("First")
            .with_response("Second");

        assert_eq!(reply_text(&provider).await, "First");
        assert_eq!(reply_text(&provider).await, "Second");
        assert_eq!(reply_text(&provider).await, "Mock response");
    }

    #[tokio::test]
    async fn mock_provider_returns_configured_error() {
        let provider = MockAIProvider::new()
            .with_error(MockError::RateLimited { retry_after_secs: 30 });

        match provider.stream_complete(test_request()).await {
            Ok(_) => panic!("Expected error, got stream"),
            Err(err) => {
                assert!(err.is_retryable());
                assert!(matches!(err, AIError::RateLimited { retry_after_secs: 30 }));
            }
        }
    }

    #[tokio::test]
    async fn mock_provider_tracks_calls() {
        let provider = MockAIProvider::new();
        assert_eq!(provider.call_count(), 0);

        reply_text(&provider).await;
        reply_text(&provider).await;
        assert_eq!(provider.call_count(), 2);
        assert_eq!(provider.get_calls()[0].last_user_message(), Some("Hello"));

        provider.clear_calls();
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn streaming_deltas_concatenate_to_exact_content() {
        let provider = MockAIProvider::new().with_response("Hello  world, from streaming");

        let stream = provider.stream_complete(test_request()).await.unwrap();
        let (content, final_chunk, error) = collect_text(stream).await;

        assert_eq!(content, "Hello  world, from streaming");
        assert_eq!(final_chunk.unwrap().finish_reason, Some(FinishReason::Stop));
        assert!(error.is_none());
    }

    #[tokio::test]
    async fn interrupted_stream_yields_partial_text_then_error() {
        let provider = MockAIProvider::new().with_interrupted_response(
            "partial reply",
            MockError::Network { message: "reset".to_string() },
        );

        let stream = provider.stream_complete(test_request()).await.unwrap();
        let (content, final_chunk, error) = collect_text(stream).await;

        assert_eq!(content, "partial reply");
        assert!(final_chunk.is_none());
        assert!(matches!(error, Some(AIError::Network(_))));
    }

    #[tokio::test]
    async fn panicking_stream_yields_partial_text_before_panicking() {
        let provider = MockAIProvider::new().with_panicking_response("half said");
        let mut stream = provider.stream_complete(test_request()).await.unwrap();

        assert_eq!(stream.next().await.unwrap().unwrap().delta, "half ");
        assert_eq!(stream.next().await.unwrap().unwrap().delta, "said");

        let rest = futures::FutureExt::catch_unwind(std::panic::AssertUnwindSafe(stream.next())).await;
        assert!(rest.is_err());
    }

    #[tokio::test]
    async fn mock_provider_streaming_returns_error() {
        let provider = MockAIProvider::new()
            .with_error(MockError::Unavailable { message: "Service down".to_string() });

        match provider.stream_complete(test_request()).await {
            Ok(_) => panic!("Expected error, got stream"),
            Err(err) => assert!(matches!(err, AIError::Unavailable { .. })),
        }
    }

    #[tokio::test]
    async fn generate_object_returns_queued_objects_and_records_schema() {
        let provider = MockAIProvider::new().with_object(json!({"name": "Kona"}));
        assert!(provider.provider_info().supports_structured_output);

        let schema = OutputSchema::new("thing", json!({"type": "object"}));
        let object = provider.generate_object(test_request(), &schema).await.unwrap();

        assert_eq!(object, json!({"name": "Kona"}));
        assert_eq!(provider.get_schemas(), vec![schema]);
    }

    #[tokio::test]
    async fn generate_object_without_queue_is_invalid_request() {
        let provider = MockAIProvider::new();
        let schema = OutputSchema::new("thing", json!({}));

        let err = provider.generate_object(test_request(), &schema).await.unwrap_err();
        assert!(matches!(err, AIError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn generate_object_returns_queued_error() {
        let provider = MockAIProvider::new()
            .with_object_error(MockError::Parse { message: "not json".to_string() });
        let schema = OutputSchema::new("thing", json!({}));

        let err = provider.generate_object(test_request(), &schema).await.unwrap_err();
        assert!(matches!(err, AIError::Parse(_)));
    }

    #[tokio::test]
    async fn mock_provider_respects_delay() {
        let provider = MockAIProvider::new()
            .with_response("Delayed response")
            .with_delay(Duration::from_millis(50));

        let start = std::time::Instant::now();
        provider.stream_complete(test_request()).await.unwrap();

        assert!(start.elapsed() >= Duration::from_millis(50));
    }

    #[test]
    fn mock_error_converts_to_ai_error() {
        let err: AIError = MockError::ContextTooLong { tokens: 100, max: 50 }.into();
        assert!(matches!(err, AIError::ContextTooLong { tokens: 100, max: 50 }));

        let err: AIError = MockError::AuthenticationFailed.into();
        assert!(matches!(err, AIError::AuthenticationFailed));

        let err: AIError = MockError::Timeout { timeout_secs: 30 }.into();
        assert!(matches!(err, AIError::Timeout { timeout_secs: 30 }));
    }
}
