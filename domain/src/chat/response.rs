//! Normalized provider response types
//!
//! Every provider adapter converts its wire format into a
//! [`ProviderResponse`]: final text, zero or more unvalidated
//! [`ToolCallIntent`]s, token usage and a [`FinishReason`]. The loop
//! only ever sees this shape, never a raw provider payload.

use crate::tool::calls::ToolCallIntent;
use serde::{Deserialize, Serialize};

/// Provider-reported cause for ending a single model response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// Natural end of response — the model is done.
    Stop,
    /// Hit the token limit — the response may be cut off.
    Length,
    /// The model requested tool calls — execute them and report back.
    ToolCalls,
    /// Provider-specific reason that maps to none of the above.
    Other(String),
}

impl FinishReason {
    pub fn is_tool_calls(&self) -> bool {
        matches!(self, FinishReason::ToolCalls)
    }
}

/// Token usage counters for one provider call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl TokenUsage {
    pub fn new(input_tokens: u64, output_tokens: u64) -> Self {
        Self {
            input_tokens,
            output_tokens,
        }
    }

    /// Accumulate another usage reading into this one.
    pub fn add(&mut self, other: TokenUsage) {
        self.input_tokens = self.input_tokens.saturating_add(other.input_tokens);
        self.output_tokens = self.output_tokens.saturating_add(other.output_tokens);
    }

    pub fn total(&self) -> u64 {
        self.input_tokens.saturating_add(self.output_tokens)
    }
}

/// A complete response from a conversational model, normalized across
/// providers.
#[derive(Debug, Clone)]
pub struct ProviderResponse {
    /// Assistant text content (may be empty when only tools were called)
    pub content: String,
    /// Tool call intents in the order the model emitted them
    pub tool_calls: Vec<ToolCallIntent>,
    /// Token usage for this call
    pub usage: TokenUsage,
    /// Why the model stopped
    pub finish_reason: FinishReason,
}

impl ProviderResponse {
    /// A plain text response with no tool calls.
    pub fn from_text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            tool_calls: Vec::new(),
            usage: TokenUsage::default(),
            finish_reason: FinishReason::Stop,
        }
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}
