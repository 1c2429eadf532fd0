//! Provider port: the only surface the loop uses to talk to a model
//!
//! Adapters normalize wire formats into [`ProviderResponse`] /
//! [`StreamEvent`] and classify transport failures into
//! [`ProviderError`]. The loop never sees provider-specific payloads.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::sync::mpsc;

use centavo_domain::{Message, ProviderResponse, StreamEvent, ToolCallIntent};

/// Failure classification for provider calls.
///
/// `is_retryable` drives the retry policy: rate limits, timeouts and
/// upstream unavailability are transient; auth failures and malformed
/// responses are not.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ProviderError {
    #[error("rate limited by provider")]
    RateLimited { retry_after: Option<Duration> },

    #[error("provider request timed out")]
    Timeout,

    #[error("invalid provider response: {0}")]
    InvalidResponse(String),

    #[error("provider authentication failed: {0}")]
    AuthFailed(String),

    #[error("provider unavailable: {0}")]
    Unavailable(String),
}

impl ProviderError {
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ProviderError::RateLimited { .. }
                | ProviderError::Timeout
                | ProviderError::Unavailable(_)
        )
    }

    /// Provider-mandated minimum wait before the next attempt, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            ProviderError::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}

/// One model call: conversation, instructions, sampling knobs and the
/// tool list in provider wire shape.
#[derive(Debug, Clone, Default)]
pub struct CompletionRequest {
    pub messages: Vec<Message>,
    pub system_prompt: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub tools: Vec<serde_json::Value>,
}

impl CompletionRequest {
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            messages,
            ..Default::default()
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_tools(mut self, tools: Vec<serde_json::Value>) -> Self {
        self.tools = tools;
        self
    }
}

/// Identity of a configured provider, for logs and the CLI banner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderInfo {
    pub provider: String,
    pub model: String,
    /// Wire protocol revision the adapter speaks (API version header
    /// or URL path segment).
    pub protocol_version: String,
}

/// Receiving side of a streaming completion.
pub struct StreamHandle {
    receiver: mpsc::Receiver<StreamEvent>,
}

impl StreamHandle {
    pub fn new(receiver: mpsc::Receiver<StreamEvent>) -> Self {
        Self { receiver }
    }

    pub async fn next_event(&mut self) -> Option<StreamEvent> {
        self.receiver.recv().await
    }

    /// Drain the stream into a single normalized response.
    pub async fn collect_response(mut self) -> Result<ProviderResponse, ProviderError> {
        let mut assembler = StreamAssembler::new();
        while let Some(event) = self.receiver.recv().await {
            if let Some(outcome) = assembler.push(event) {
                return outcome;
            }
        }
        Err(ProviderError::InvalidResponse(
            "stream ended without a terminal event".to_string(),
        ))
    }
}

/// Accumulates stream events into a final [`ProviderResponse`].
///
/// Text deltas concatenate; tool-call fragments buffer per index and
/// are only parsed at the terminal event — partial JSON is never
/// treated as a call boundary.
#[derive(Debug, Default)]
pub struct StreamAssembler {
    text: String,
    partial_calls: BTreeMap<usize, PartialToolCall>,
}

#[derive(Debug, Default)]
struct PartialToolCall {
    id: Option<String>,
    name: Option<String>,
    arguments: String,
}

impl StreamAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accumulated text so far (for live display).
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Feed one event. Returns `Some` once a terminal event arrives.
    pub fn push(&mut self, event: StreamEvent) -> Option<Result<ProviderResponse, ProviderError>> {
        match event {
            StreamEvent::Delta(chunk) => {
                self.text.push_str(&chunk);
                None
            }
            StreamEvent::ToolCallDelta {
                index,
                id,
                name,
                arguments_delta,
            } => {
                let partial = self.partial_calls.entry(index).or_default();
                if let Some(id) = id {
                    partial.id = Some(id);
                }
                if let Some(name) = name {
                    partial.name = Some(name);
                }
                if let Some(delta) = arguments_delta {
                    partial.arguments.push_str(&delta);
                }
                None
            }
            StreamEvent::Completed(response) => Some(self.finalize(response)),
            StreamEvent::Error(message) => Some(Err(ProviderError::InvalidResponse(format!(
                "stream error: {}",
                message
            )))),
        }
    }

    fn finalize(
        &mut self,
        mut response: ProviderResponse,
    ) -> Result<ProviderResponse, ProviderError> {
        if response.content.is_empty() && !self.text.is_empty() {
            response.content = std::mem::take(&mut self.text);
        }
        if response.tool_calls.is_empty() && !self.partial_calls.is_empty() {
            let mut intents = Vec::with_capacity(self.partial_calls.len());
            for (index, partial) in std::mem::take(&mut self.partial_calls) {
                let Some(name) = partial.name else {
                    return Err(ProviderError::InvalidResponse(format!(
                        "tool call fragment {} never received a name",
                        index
                    )));
                };
                let id = partial
                    .id
                    .unwrap_or_else(|| format!("call_{}", uuid::Uuid::new_v4().simple()));
                let raw_arguments = if partial.arguments.trim().is_empty() {
                    serde_json::json!({})
                } else {
                    serde_json::from_str(&partial.arguments).map_err(|e| {
                        ProviderError::InvalidResponse(format!(
                            "tool call {} arguments are not valid JSON: {}",
                            name, e
                        ))
                    })?
                };
                intents.push(ToolCallIntent::new(id, name, raw_arguments));
            }
            response.tool_calls = intents;
        }
        Ok(response)
    }
}

/// Contract every model adapter implements.
#[async_trait]
pub trait ProviderPort: Send + Sync {
    /// One blocking completion call.
    async fn complete(&self, request: &CompletionRequest)
    -> Result<ProviderResponse, ProviderError>;

    /// Streaming completion. Adapters without native streaming keep
    /// this default, which wraps `complete` into a single-event stream.
    async fn stream_complete(
        &self,
        request: &CompletionRequest,
    ) -> Result<StreamHandle, ProviderError> {
        let response = self.complete(request).await?;
        let (tx, rx) = mpsc::channel(1);
        let _ = tx.send(StreamEvent::Completed(response)).await;
        Ok(StreamHandle::new(rx))
    }

    /// Identity of this adapter for logs and display.
    fn info(&self) -> ProviderInfo;
}
