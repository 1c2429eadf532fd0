//! Gemini adapter (generateContent API)
//!
//! Gemini has no native tool-call ids, so the adapter synthesizes
//! `call_<uuid>` correlation ids when normalizing responses. Replaying
//! history needs the tool name for each `functionResponse`, which is
//! recovered from the assistant turn that carried the original intent.
//! Streaming keeps the port default (one terminal event).

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

use centavo_application::ports::{CompletionRequest, ProviderError, ProviderInfo, ProviderPort};
use centavo_domain::{FinishReason, MessageRole, ProviderResponse, TokenUsage, ToolCallIntent};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const PROTOCOL_VERSION: &str = "v1beta";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

pub struct GeminiAdapter {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiAdapter {
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
        format!(
            "{}/{}/models/{}:generateContent",
            self.base_url, PROTOCOL_VERSION, self.model
        )
    }
}

#[async_trait]
impl ProviderPort for GeminiAdapter {
    async fn complete(
        &self,
        request: &CompletionRequest,
    ) -> Result<ProviderResponse, ProviderError> {
        let body = build_request_body(request);
        debug!(model = %self.model, messages = request.messages.len(), "gemini complete");

        let response = self
            .client
            .post(self.endpoint())
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout
                } else {
                    ProviderError::Unavailable(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(classify_status(status, &detail));
        }
        let payload: Value = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;
        parse_response(&payload)
    }

    fn info(&self) -> ProviderInfo {
        ProviderInfo {
            provider: "gemini".to_string(),
            model: self.model.clone(),
            protocol_version: PROTOCOL_VERSION.to_string(),
        }
    }
}

fn classify_status(status: StatusCode, detail: &str) -> ProviderError {
    let short = centavo_domain::core::string::truncate(detail, 200);
    match status.as_u16() {
        400 if detail.contains("API_KEY_INVALID") => ProviderError::AuthFailed(short),
        401 | 403 => ProviderError::AuthFailed(short),
        408 => ProviderError::Timeout,
        429 => ProviderError::RateLimited { retry_after: None },
        500..=599 => ProviderError::Unavailable(format!("{}: {}", status, short)),
        _ => ProviderError::InvalidResponse(format!("{}: {}", status, short)),
    }
}

/// Convert a provider-shape tool (Messages API style) into a Gemini
/// function declaration. Input examples have no Gemini equivalent and
/// are dropped.
fn to_function_declaration(tool: &Value) -> Value {
    let mut parameters = tool["input_schema"].clone();
    if let Some(obj) = parameters.as_object_mut() {
        obj.remove("additionalProperties");
    }
    json!({
        "name": tool["name"],
        "description": tool["description"],
        "parameters": parameters,
    })
}

fn build_request_body(request: &CompletionRequest) -> Value {
    // functionResponse parts need the tool's name; recover it from the
    // assistant turns that announced each call.
    let mut call_names: HashMap<&str, &str> = HashMap::new();
    for message in &request.messages {
        for call in &message.tool_calls {
            call_names.insert(&call.correlation_id, &call.tool_name);
        }
    }

    let mut contents: Vec<Value> = Vec::new();
    for message in &request.messages {
        match message.role {
            MessageRole::System => {
                // Folded into systemInstruction below.
            }
            MessageRole::User => {
                contents.push(json!({
                    "role": "user",
                    "parts": [{"text": message.content}],
                }));
            }
            MessageRole::Assistant => {
                let mut parts: Vec<Value> = Vec::new();
                if !message.content.is_empty() {
                    parts.push(json!({"text": message.content}));
                }
                for call in &message.tool_calls {
                    parts.push(json!({
                        "functionCall": {
                            "name": call.tool_name,
                            "args": call.raw_arguments,
                        }
                    }));
                }
                if !parts.is_empty() {
                    contents.push(json!({"role": "model", "parts": parts}));
                }
            }
            MessageRole::Tool => {
                let name = message
                    .tool_call_id
                    .as_deref()
                    .and_then(|id| call_names.get(id).copied())
                    .unwrap_or("unknown");
                contents.push(json!({
                    "role": "user",
                    "parts": [{
                        "functionResponse": {
                            "name": name,
                            "response": {"content": message.content},
                        }
                    }],
                }));
            }
        }
    }

    let mut system = request.system_prompt.clone().unwrap_or_default();
    for message in &request.messages {
        if message.role == MessageRole::System {
            if !system.is_empty() {
                system.push_str("\n\n");
            }
            system.push_str(&message.content);
        }
    }

    let mut body = json!({"contents": contents});
    if !system.is_empty() {
        body["systemInstruction"] = json!({"parts": [{"text": system}]});
    }
    if !request.tools.is_empty() {
        let declarations: Vec<Value> =
            request.tools.iter().map(to_function_declaration).collect();
        body["tools"] = json!([{"functionDeclarations": declarations}]);
    }
    let mut generation = serde_json::Map::new();
    if let Some(temperature) = request.temperature {
        generation.insert("temperature".to_string(), json!(temperature));
    }
    if let Some(max_tokens) = request.max_tokens {
        generation.insert("maxOutputTokens".to_string(), json!(max_tokens));
    }
    if !generation.is_empty() {
        body["generationConfig"] = Value::Object(generation);
    }
    body
}

fn parse_response(payload: &Value) -> Result<ProviderResponse, ProviderError> {
    let candidate = payload["candidates"]
        .get(0)
        .ok_or_else(|| ProviderError::InvalidResponse("response has no candidates".into()))?;

    let mut content = String::new();
    let mut tool_calls = Vec::new();
    if let Some(parts) = candidate["content"]["parts"].as_array() {
        for part in parts {
            if let Some(text) = part["text"].as_str() {
                content.push_str(text);
            }
            if let Some(call) = part.get("functionCall") {
                let name = call["name"].as_str().ok_or_else(|| {
                    ProviderError::InvalidResponse("functionCall without name".into())
                })?;
                tool_calls.push(ToolCallIntent::new(
                    format!("call_{}", Uuid::new_v4().simple()),
                    name,
                    call["args"].clone(),
                ));
            }
        }
    }

    let finish_reason = match candidate["finishReason"].as_str() {
        _ if !tool_calls.is_empty() => FinishReason::ToolCalls,
        Some("STOP") | None => FinishReason::Stop,
        Some("MAX_TOKENS") => FinishReason::Length,
        Some(other) => FinishReason::Other(other.to_string()),
    };

    let usage = TokenUsage::new(
        payload["usageMetadata"]["promptTokenCount"]
            .as_u64()
            .unwrap_or(0),
        payload["usageMetadata"]["candidatesTokenCount"]
            .as_u64()
            .unwrap_or(0),
    );

    Ok(ProviderResponse {
        content,
        tool_calls,
        usage,
        finish_reason,
    })
}
