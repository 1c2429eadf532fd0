//! Claude adapter (Anthropic Messages API)
//!
//! Converts the neutral conversation into Messages API wire shape and
//! back. Tool results travel as `tool_result` blocks in a user message
//! immediately after the assistant's `tool_use` turn, so consecutive
//! tool messages are grouped into one user message. Streaming uses SSE
//! with tool-call argument JSON arriving as `input_json_delta`
//! fragments.

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::StatusCode;
use serde_json::{Value, json};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use centavo_application::ports::{
    CompletionRequest, ProviderError, ProviderInfo, ProviderPort, StreamHandle,
};
use centavo_domain::{
    FinishReason, MessageRole, ProviderResponse, StreamEvent, TokenUsage, ToolCallIntent,
};

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const API_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: u32 = 4096;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

pub struct ClaudeAdapter {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl ClaudeAdapter {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .unwrap_or_default(),
            api_key: api_key.into(),
            model: model.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/messages", self.base_url)
    }

    async fn send(&self, body: &Value) -> Result<reqwest::Response, ProviderError> {
        let response = self
            .client
            .post(self.endpoint())
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(body)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let retry_after = parse_retry_after(response.headers());
        let detail = response.text().await.unwrap_or_default();
        Err(classify_status(status, retry_after, &detail))
    }
}

#[async_trait]
impl ProviderPort for ClaudeAdapter {
    async fn complete(
        &self,
        request: &CompletionRequest,
    ) -> Result<ProviderResponse, ProviderError> {
        let body = build_request_body(&self.model, request, false);
        debug!(model = %self.model, messages = request.messages.len(), "claude complete");
        let payload: Value = self
            .send(&body)
            .await?
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;
        parse_response(&payload)
    }

    async fn stream_complete(
        &self,
        request: &CompletionRequest,
    ) -> Result<StreamHandle, ProviderError> {
        let body = build_request_body(&self.model, request, true);
        let response = self.send(&body).await?;

        let (tx, rx) = mpsc::channel(32);
        tokio::spawn(async move {
            let mut bytes = response.bytes_stream();
            let mut lines = SseLineBuffer::default();
            let mut state = StreamState::default();
            while let Some(chunk) = bytes.next().await {
                let chunk = match chunk {
                    Ok(c) => c,
                    Err(e) => {
                        let _ = tx.send(StreamEvent::Error(e.to_string())).await;
                        return;
                    }
                };
                for data in lines.push(&chunk) {
                    let Ok(value) = serde_json::from_str::<Value>(&data) else {
                        warn!("skipping unparseable SSE payload");
                        continue;
                    };
                    for event in state.handle(&value) {
                        let terminal = event.is_terminal();
                        if tx.send(event).await.is_err() || terminal {
                            return;
                        }
                    }
                }
            }
        });
        Ok(StreamHandle::new(rx))
    }

    fn info(&self) -> ProviderInfo {
        ProviderInfo {
            provider: "claude".to_string(),
            model: self.model.clone(),
            protocol_version: API_VERSION.to_string(),
        }
    }
}

fn transport_error(e: reqwest::Error) -> ProviderError {
    if e.is_timeout() {
        ProviderError::Timeout
    } else {
        ProviderError::Unavailable(e.to_string())
    }
}

fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<Duration> {
    headers
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

fn classify_status(status: StatusCode, retry_after: Option<Duration>, detail: &str) -> ProviderError {
    match status.as_u16() {
        401 | 403 => ProviderError::AuthFailed(short(detail)),
        408 => ProviderError::Timeout,
        429 => ProviderError::RateLimited { retry_after },
        500..=599 => ProviderError::Unavailable(format!("{}: {}", status, short(detail))),
        _ => ProviderError::InvalidResponse(format!("{}: {}", status, short(detail))),
    }
}

fn short(detail: &str) -> String {
    centavo_domain::core::string::truncate(detail, 200)
}

/// Build the Messages API request body from the neutral request.
fn build_request_body(model: &str, request: &CompletionRequest, stream: bool) -> Value {
    let mut system = request.system_prompt.clone().unwrap_or_default();
    let mut messages: Vec<Value> = Vec::new();
    let mut tool_results: Vec<Value> = Vec::new();

    fn flush(tool_results: &mut Vec<Value>, messages: &mut Vec<Value>) {
        if !tool_results.is_empty() {
            messages.push(json!({
                "role": "user",
                "content": std::mem::take(tool_results),
            }));
        }
    }

    for message in &request.messages {
        match message.role {
            MessageRole::System => {
                if !system.is_empty() {
                    system.push_str("\n\n");
                }
                system.push_str(&message.content);
            }
            MessageRole::User => {
                flush(&mut tool_results, &mut messages);
                messages.push(json!({"role": "user", "content": message.content}));
            }
            MessageRole::Assistant => {
                flush(&mut tool_results, &mut messages);
                let mut blocks: Vec<Value> = Vec::new();
                if !message.content.is_empty() {
                    blocks.push(json!({"type": "text", "text": message.content}));
                }
                for call in &message.tool_calls {
                    blocks.push(json!({
                        "type": "tool_use",
                        "id": call.correlation_id,
                        "name": call.tool_name,
                        "input": call.raw_arguments,
                    }));
                }
                if !blocks.is_empty() {
                    messages.push(json!({"role": "assistant", "content": blocks}));
                }
            }
            MessageRole::Tool => {
                tool_results.push(json!({
                    "type": "tool_result",
                    "tool_use_id": message.tool_call_id,
                    "content": message.content,
                }));
            }
        }
    }
    flush(&mut tool_results, &mut messages);

    let mut body = json!({
        "model": model,
        "max_tokens": request.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
        "messages": messages,
    });
    if !system.is_empty() {
        body["system"] = json!(system);
    }
    if let Some(temperature) = request.temperature {
        body["temperature"] = json!(temperature);
    }
    if !request.tools.is_empty() {
        body["tools"] = json!(request.tools);
    }
    if stream {
        body["stream"] = json!(true);
    }
    body
}

fn map_stop_reason(stop_reason: Option<&str>) -> FinishReason {
    match stop_reason {
        Some("end_turn") | Some("stop_sequence") | None => FinishReason::Stop,
        Some("max_tokens") => FinishReason::Length,
        Some("tool_use") => FinishReason::ToolCalls,
        Some(other) => FinishReason::Other(other.to_string()),
    }
}

fn parse_usage(value: &Value) -> TokenUsage {
    TokenUsage::new(
        value["input_tokens"].as_u64().unwrap_or(0),
        value["output_tokens"].as_u64().unwrap_or(0),
    )
}

/// Normalize a non-streaming Messages API response.
fn parse_response(payload: &Value) -> Result<ProviderResponse, ProviderError> {
    let blocks = payload["content"]
        .as_array()
        .ok_or_else(|| ProviderError::InvalidResponse("response has no content array".into()))?;

    let mut content = String::new();
    let mut tool_calls = Vec::new();
    for block in blocks {
        match block["type"].as_str() {
            Some("text") => content.push_str(block["text"].as_str().unwrap_or_default()),
            Some("tool_use") => {
                let id = block["id"]
                    .as_str()
                    .ok_or_else(|| ProviderError::InvalidResponse("tool_use without id".into()))?;
                let name = block["name"].as_str().ok_or_else(|| {
                    ProviderError::InvalidResponse("tool_use without name".into())
                })?;
                tool_calls.push(ToolCallIntent::new(id, name, block["input"].clone()));
            }
            _ => {}
        }
    }

    Ok(ProviderResponse {
        content,
        tool_calls,
        usage: parse_usage(&payload["usage"]),
        finish_reason: map_stop_reason(payload["stop_reason"].as_str()),
    })
}

/// Splits a byte stream into SSE `data:` payloads.
#[derive(Default)]
struct SseLineBuffer {
    buffer: String,
}

impl SseLineBuffer {
    fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.push_str(&String::from_utf8_lossy(chunk));
        let mut payloads = Vec::new();
        while let Some(pos) = self.buffer.find('\n') {
            let line: String = self.buffer.drain(..=pos).collect();
            let line = line.trim_end();
            if let Some(data) = line.strip_prefix("data:") {
                let data = data.trim();
                if !data.is_empty() && data != "[DONE]" {
                    payloads.push(data.to_string());
                }
            }
        }
        payloads
    }
}

/// Per-stream accumulator for stop reason and usage. Text and
/// tool-call content are forwarded as events; assembly happens in the
/// application layer.
#[derive(Default)]
struct StreamState {
    usage: TokenUsage,
    stop_reason: Option<String>,
}

impl StreamState {
    fn handle(&mut self, value: &Value) -> Vec<StreamEvent> {
        match value["type"].as_str() {
            Some("message_start") => {
                self.usage.add(parse_usage(&value["message"]["usage"]));
                Vec::new()
            }
            Some("content_block_start") => {
                let index = value["index"].as_u64().unwrap_or(0) as usize;
                let block = &value["content_block"];
                if block["type"].as_str() == Some("tool_use") {
                    vec![StreamEvent::ToolCallDelta {
                        index,
                        id: block["id"].as_str().map(String::from),
                        name: block["name"].as_str().map(String::from),
                        arguments_delta: None,
                    }]
                } else {
                    Vec::new()
                }
            }
            Some("content_block_delta") => {
                let index = value["index"].as_u64().unwrap_or(0) as usize;
                let delta = &value["delta"];
                match delta["type"].as_str() {
                    Some("text_delta") => delta["text"]
                        .as_str()
                        .map(|t| vec![StreamEvent::Delta(t.to_string())])
                        .unwrap_or_default(),
                    Some("input_json_delta") => delta["partial_json"]
                        .as_str()
                        .map(|j| {
                            vec![StreamEvent::ToolCallDelta {
                                index,
                                id: None,
                                name: None,
                                arguments_delta: Some(j.to_string()),
                            }]
                        })
                        .unwrap_or_default(),
                    _ => Vec::new(),
                }
            }
            Some("message_delta") => {
                if let Some(reason) = value["delta"]["stop_reason"].as_str() {
                    self.stop_reason = Some(reason.to_string());
                }
                self.usage.add(parse_usage(&value["usage"]));
                Vec::new()
            }
            Some("message_stop") => {
                vec![StreamEvent::Completed(ProviderResponse {
                    content: String::new(),
                    tool_calls: Vec::new(),
                    usage: self.usage,
                    finish_reason: map_stop_reason(self.stop_reason.as_deref()),
                })]
            }
            Some("error") => {
                let message = value["error"]["message"]
                    .as_str()
                    .unwrap_or("unknown stream error");
                vec![StreamEvent::Error(message.to_string())]
            }
            _ => Vec::new(),
        }
    }
}
