//! OpenAI Provider - Implementation of AIProvider for OpenAI's API.
//!
//! Chat completions, streamed via SSE, plus structured output through the
//! `json_schema` response format.
//!
//! # Configuration
//!
//! ```ignore
//! let config = OpenAIConfig::new(api_key)
//!     .with_model("gpt-4o-mini")
//!     .with_base_url("https://api.openai.com/v1");
//!
//! let provider = OpenAIProvider::new(config)?;
//! ```
//!
//! # Streaming
//!
//! The response body is split into lines before parsing, so an SSE event
//! that straddles two network reads is still decoded whole. Each `data:` line
//! is yielded as a `StreamChunk`; the `[DONE]` marker ends the stream.

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use reqwest::{Client, Response};
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};
use std::io;
use std::time::Duration;
use tokio::time::sleep;
use tokio_util::codec::{FramedRead, LinesCodec};
use tokio_util::io::StreamReader;

use crate::ports::{
    AIError, AIProvider, ChunkStream, CompletionRequest, FinishReason, MessageRole, OutputSchema,
    ProviderInfo, StreamChunk, TokenUsage,
};

/// Longest SSE line accepted from the API.
const MAX_SSE_LINE_BYTES: usize = 1024 * 1024;

/// Configuration for the OpenAI provider.
#[derive(Debug, Clone)]
pub struct OpenAIConfig {
    /// API key for authentication.
    api_key: Secret<String>,
    /// Model to use (e.g., "gpt-4o-mini").
    pub model: String,
    /// Base URL for the API (default: https://api.openai.com/v1).
    pub base_url: String,
    /// Request timeout.
    pub timeout: Duration,
    /// Maximum retries on transient failures.
    pub max_retries: u32,
}

impl OpenAIConfig {
    /// Creates a new configuration with the given API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: Secret::new(api_key.into()),
            model: "gpt-4o-mini".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            timeout: Duration::from_secs(60),
            max_retries: 2,
        }
    }

    /// Sets the model to use.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Sets the base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the maximum retry count.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Exposes the API key (for making requests).
    fn api_key(&self) -> &str {
        self.api_key.expose_secret()
    }
}

/// OpenAI API provider implementation.
pub struct OpenAIProvider {
    config: OpenAIConfig,
    client: Client,
}

impl OpenAIProvider {
    /// Creates a new OpenAI provider with the given configuration.
    pub fn new(config: OpenAIConfig) -> Result<Self, AIError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| AIError::invalid_request(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    /// Builds the chat completions endpoint URL.
    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'))
    }

    /// Converts our request to OpenAI's format.
    fn to_openai_request(&self, request: &CompletionRequest, stream: bool) -> OpenAIRequest {
        let mut messages = Vec::new();

        if let Some(ref prompt) = request.system_prompt {
            messages.push(OpenAIMessage {
                role: "system".to_string(),
                content: prompt.clone(),
            });
        }

        for msg in &request.messages {
            messages.push(OpenAIMessage {
                role: match msg.role {
                    MessageRole::System => "system",
                    MessageRole::User => "user",
                    MessageRole::Assistant => "assistant",
                }
                .to_string(),
                content: msg.content.clone(),
            });
        }

        OpenAIRequest {
            model: self.config.model.clone(),
            messages,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            stream: Some(stream),
            stream_options: if stream {
                Some(StreamOptions {
                    include_usage: true,
                })
            } else {
                None
            },
            response_format: None,
        }
    }

    /// Sends one request and checks its status.
    async fn send(&self, body: &OpenAIRequest) -> Result<Response, AIError> {
        let response = self
            .client
            .post(self.completions_url())
            .header("Authorization", format!("Bearer {}", self.config.api_key()))
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AIError::Timeout {
                        timeout_secs: self.config.timeout.as_secs() as u32,
                    }
                } else if e.is_connect() {
                    AIError::network(format!("Connection failed: {}", e))
                } else {
                    AIError::network(e.to_string())
                }
            })?;

        self.handle_response_status(response).await
    }

    /// Sends a request, retrying transient failures with exponential backoff.
    async fn send_with_retries(&self, body: &OpenAIRequest) -> Result<Response, AIError> {
        let mut retry_count = 0;

        loop {
            match self.send(body).await {
                Ok(response) => return Ok(response),
                Err(err) if err.is_retryable() && retry_count < self.config.max_retries => {
                    tracing::warn!(
                        error = %err,
                        attempt = retry_count + 1,
                        "openai request failed, retrying"
                    );
                    // 1s, 2s, 4s, ...
                    sleep(Duration::from_secs(1 << retry_count)).await;
                    retry_count += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Parses the API response status and handles errors.
    async fn handle_response_status(&self, response: Response) -> Result<Response, AIError> {
        let status = response.status();

        if status.is_success() {
            return Ok(response);
        }

        let error_body = response.text().await.unwrap_or_default();

        match status.as_u16() {
            401 => Err(AIError::AuthenticationFailed),
            429 => Err(AIError::rate_limited(Self::parse_retry_after(&error_body))),
            400 => {
                if error_body.contains("maximum context length")
                    || error_body.contains("context_length_exceeded")
                {
                    Err(AIError::context_too_long(0, 0))
                } else {
                    Err(AIError::InvalidRequest(error_body))
                }
            }
            500..=599 => Err(AIError::unavailable(format!(
                "Server error {}: {}",
                status, error_body
            ))),
            _ => Err(AIError::network(format!(
                "Unexpected status {}: {}",
                status, error_body
            ))),
        }
    }

    /// Parses retry-after from error response. Defaults to 30 seconds.
    fn parse_retry_after(error_body: &str) -> u32 {
        let message = serde_json::from_str::<serde_json::Value>(error_body)
            .ok()
            .and_then(|parsed| {
                parsed
                    .get("error")
                    .and_then(|e| e.get("message"))
                    .and_then(|m| m.as_str())
                    .map(str::to_string)
            });

        message
            .as_deref()
            .and_then(|s| s.find("try again in ").map(|idx| &s[idx + 13..]))
            .and_then(|rest| {
                let end = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
                rest[..end].parse::<u32>().ok()
            })
            .unwrap_or(30)
    }

    /// Parses a non-streaming response body.
    async fn parse_response(response: Response) -> Result<OpenAIResponse, AIError> {
        response
            .json()
            .await
            .map_err(|e| AIError::parse(format!("Failed to parse response: {}", e)))
    }
}

fn finish_reason_from(reason: Option<&str>) -> FinishReason {
    match reason {
        Some("length") => FinishReason::Length,
        Some("content_filter") => FinishReason::ContentFilter,
        _ => FinishReason::Stop,
    }
}

#[async_trait]
impl AIProvider for OpenAIProvider {
    async fn stream_complete(&self, request: CompletionRequest) -> Result<ChunkStream, AIError> {
        let body = self.to_openai_request(&request, true);
        let response = self.send_with_retries(&body).await?;

        let bytes = Box::pin(
            response
                .bytes_stream()
                .map(|chunk| chunk.map_err(|e| io::Error::new(io::ErrorKind::Other, e))),
        );
        let lines = FramedRead::new(
            StreamReader::new(bytes),
            LinesCodec::new_with_max_length(MAX_SSE_LINE_BYTES),
        );

        let stream = lines
            .map(|line| match line {
                Ok(line) => parse_sse_line(&line),
                Err(e) => vec![Err(AIError::network(format!("Stream error: {}", e)))],
            })
            .flat_map(stream::iter);

        Ok(Box::pin(stream))
    }

    async fn generate_object(
        &self,
        request: CompletionRequest,
        schema: &OutputSchema,
    ) -> Result<serde_json::Value, AIError> {
        if !self.provider_info().supports_structured_output {
            return Err(AIError::invalid_request(format!(
                "model {} does not support structured output",
                self.config.model
            )));
        }

        let mut body = self.to_openai_request(&request, false);
        body.response_format = Some(ResponseFormat::json_schema(schema));

        let response = self.send_with_retries(&body).await?;
        let openai_response = Self::parse_response(response).await?;

        if let Some(usage) = &openai_response.usage {
            tracing::debug!(
                trace_id = %request.metadata.trace_id,
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                schema = %schema.name,
                "structured output generated"
            );
        }

        let choice = openai_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| AIError::parse("No choices in response"))?;

        if choice.finish_reason.as_deref() == Some("content_filter") {
            return Err(AIError::content_filtered("structured output refused"));
        }

        serde_json::from_str(&choice.message.content)
            .map_err(|e| AIError::parse(format!("Structured output is not valid JSON: {}", e)))
    }

    fn provider_info(&self) -> ProviderInfo {
        let model = self.config.model.as_str();
        let structured = model.starts_with("gpt-4o") || model.starts_with("gpt-4.1");

        ProviderInfo::new("openai", model).with_structured_output(structured)
    }
}

/// Parses one SSE line into zero or more StreamChunks.
fn parse_sse_line(line: &str) -> Vec<Result<StreamChunk, AIError>> {
    let mut results = Vec::new();

    let Some(data) = line.strip_prefix("data:").map(str::trim) else {
        return results;
    };
    if data.is_empty() || data == "[DONE]" {
        return results;
    }

    match serde_json::from_str::<StreamResponseChunk>(data) {
        Ok(chunk) => {
            let usage = chunk
                .usage
                .map(|u| TokenUsage::new(u.prompt_tokens, u.completion_tokens));

            match chunk.choices.first() {
                Some(choice) => {
                    if let Some(ref content) = choice.delta.content {
                        if !content.is_empty() {
                            results.push(Ok(StreamChunk::content(content)));
                        }
                    }
                    if let Some(ref reason) = choice.finish_reason {
                        results.push(Ok(StreamChunk::final_chunk(
                            finish_reason_from(Some(reason)),
                            usage.unwrap_or_default(),
                        )));
                    }
                }
                // With include_usage the usage arrives in a trailing chunk
                // with no choices.
                None => {
                    if let Some(usage) = usage {
                        results.push(Ok(StreamChunk::final_chunk(FinishReason::Stop, usage)));
                    }
                }
            }
        }
        Err(e) => results.push(Err(AIError::parse(format!(
            "Failed to parse SSE chunk: {}",
            e
        )))),
    }

    results
}

// ----- OpenAI API Types -----

#[derive(Debug, Serialize)]
struct OpenAIRequest {
    model: String,
    messages: Vec<OpenAIMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream_options: Option<StreamOptions>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Serialize)]
struct StreamOptions {
    include_usage: bool,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
    json_schema: JsonSchemaFormat,
}

impl ResponseFormat {
    fn json_schema(schema: &OutputSchema) -> Self {
        Self {
            kind: "json_schema",
            json_schema: JsonSchemaFormat {
                name: schema.name.clone(),
                schema: schema.schema.clone(),
                strict: true,
            },
        }
    }
}

#[derive(Debug, Serialize)]
struct JsonSchemaFormat {
    name: String,
    schema: serde_json::Value,
    strict: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct OpenAIMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
    usage: Option<OpenAIUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: OpenAIMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAIUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct StreamResponseChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    usage: Option<OpenAIUsage>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamDelta {
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::ConversationId;
    use crate::ports::RequestMetadata;
    use serde_json::json;

    fn provider(model: &str) -> OpenAIProvider {
        OpenAIProvider::new(OpenAIConfig::new("test").with_model(model)).unwrap()
    }

    #[test]
    fn config_builder_works() {
        let config = OpenAIConfig::new("test-key")
            .with_model("gpt-4o")
            .with_base_url("https://custom.api.com")
            .with_timeout(Duration::from_secs(30))
            .with_max_retries(5);

        assert_eq!(config.model, "gpt-4o");
        assert_eq!(config.base_url, "https://custom.api.com");
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.api_key(), "test-key");
    }

    #[test]
    fn config_debug_does_not_leak_key() {
        let config = OpenAIConfig::new("sk-very-secret");
        assert!(!format!("{:?}", config).contains("sk-very-secret"));
    }

    #[test]
    fn completions_url_tolerates_trailing_slash() {
        let provider = OpenAIProvider::new(
            OpenAIConfig::new("test").with_base_url("http://localhost:9999/v1/"),
        )
        .unwrap();
        assert_eq!(provider.completions_url(), "http://localhost:9999/v1/chat/completions");
    }

    #[test]
    fn request_puts_system_prompt_first() {
        let request = CompletionRequest::new(RequestMetadata::new(ConversationId::new(1)))
            .with_system_prompt("Be brief")
            .with_message(MessageRole::User, "Hi")
            .with_message(MessageRole::Assistant, "Hello");

        let body = provider("gpt-4o-mini").to_openai_request(&request, true);
        let roles: Vec<&str> = body.messages.iter().map(|m| m.role.as_str()).collect();

        assert_eq!(roles, vec!["system", "user", "assistant"]);
        assert_eq!(body.stream, Some(true));
        assert!(body.stream_options.is_some());
    }

    #[test]
    fn response_format_serializes_as_json_schema() {
        let schema = OutputSchema::new("coffee_suggestion", json!({"type": "object"}));
        let value = serde_json::to_value(ResponseFormat::json_schema(&schema)).unwrap();

        assert_eq!(value["type"], "json_schema");
        assert_eq!(value["json_schema"]["name"], "coffee_suggestion");
        assert_eq!(value["json_schema"]["strict"], true);
    }

    #[test]
    fn provider_info_gpt4o_mini_supports_structured_output() {
        let info = provider("gpt-4o-mini").provider_info();
        assert_eq!(info.name, "openai");
        assert_eq!(info.model, "gpt-4o-mini");
        assert!(info.supports_structured_output);
    }

    #[test]
    fn provider_info_gpt35_has_no_structured_output() {
        let info = provider("gpt-3.5-turbo").provider_info();
        assert!(!info.supports_structured_output);
    }

    #[test]
    fn parse_sse_content_chunk() {
        let line = r#"data: {"id":"chatcmpl-123","choices":[{"delta":{"content":"Hello"},"finish_reason":null}]}"#;
        let chunks = parse_sse_line(line);

        assert_eq!(chunks.len(), 1);
        let chunk = chunks[0].as_ref().unwrap();
        assert_eq!(chunk.delta, "Hello");
        assert!(!chunk.is_final());
    }

    #[test]
    fn parse_sse_final_chunk() {
        let line = r#"data: {"choices":[{"delta":{},"finish_reason":"length"}],"usage":{"prompt_tokens":10,"completion_tokens":5}}"#;
        let chunks = parse_sse_line(line);

        assert_eq!(chunks.len(), 1);
        let chunk = chunks[0].as_ref().unwrap();
        assert!(chunk.is_final());
        assert_eq!(chunk.finish_reason, Some(FinishReason::Length));
        assert_eq!(chunk.usage.as_ref().unwrap().total_tokens, 15);
    }

    #[test]
    fn parse_sse_usage_only_chunk() {
        let line = r#"data: {"choices":[],"usage":{"prompt_tokens":3,"completion_tokens":4}}"#;
        let chunks = parse_sse_line(line);

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].as_ref().unwrap().usage.as_ref().unwrap().total_tokens, 7);
    }

    #[test]
    fn parse_sse_ignores_done_comments_and_blank_lines() {
        assert!(parse_sse_line("data: [DONE]").is_empty());
        assert!(parse_sse_line(": keep-alive").is_empty());
        assert!(parse_sse_line("").is_empty());
    }

    #[test]
    fn parse_sse_malformed_data_is_parse_error() {
        let chunks = parse_sse_line("data: {not json");
        assert!(matches!(chunks[0], Err(AIError::Parse(_))));
    }

    #[test]
    fn parse_retry_after_from_message() {
        let error = r#"{"error":{"message":"Rate limit exceeded. Please try again in 30 seconds."}}"#;
        assert_eq!(OpenAIProvider::parse_retry_after(error), 30);

        let error = r#"{"error":{"message":"Please try again in 7s"}}"#;
        assert_eq!(OpenAIProvider::parse_retry_after(error), 7);
    }

    #[test]
    fn parse_retry_after_default() {
        let error = r#"{"error":{"message":"Something went wrong"}}"#;
        assert_eq!(OpenAIProvider::parse_retry_after(error), 30);
    }
}
