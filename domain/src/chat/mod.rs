//! Conversation entities
//!
//! A conversation is an ordered, append-only sequence of [`Message`]s.
//! During one orchestration run the sequence is owned exclusively by the
//! tool loop; tool results enter the history as `Tool` messages carrying
//! the correlation id of the call they answer.

pub mod response;
pub mod stream;

use serde::{Deserialize, Serialize};

use crate::tool::calls::ToolCallIntent;

/// Role of a message in the conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
    System,
    Tool,
}

impl MessageRole {
    pub fn as_str(&self) -> &str {
        match self {
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
            MessageRole::System => "system",
            MessageRole::Tool => "tool",
        }
    }
}

impl std::fmt::Display for MessageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single message in the conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Role of the sender
    pub role: MessageRole,
    /// Text content
    pub content: String,
    /// Correlation id of the tool call this message answers
    /// (set on `Tool` messages only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    /// Tool calls the assistant made in this turn (set on `Assistant`
    /// messages only). Adapters use these to rebuild provider history.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCallIntent>,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
            tool_call_id: None,
            tool_calls: Vec::new(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
            tool_call_id: None,
            tool_calls: Vec::new(),
        }
    }

    /// Build an assistant message that requested tool calls. The
    /// intents are kept verbatim so later provider calls can replay the
    /// turn on the wire.
    pub fn assistant_with_tools(
        content: impl Into<String>,
        tool_calls: Vec<ToolCallIntent>,
    ) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
            tool_call_id: None,
            tool_calls,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
            tool_call_id: None,
            tool_calls: Vec::new(),
        }
    }

    /// Build a tool-result message answering the call identified by
    /// `tool_call_id`.
    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Tool,
            content: content.into(),
            tool_call_id: Some(tool_call_id.into()),
            tool_calls: Vec::new(),
        }
    }

    pub fn is_tool_result(&self) -> bool {
        self.role == MessageRole::Tool
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructors_set_roles() {
        assert_eq!(Message::user("oi").role, MessageRole::User);
        assert_eq!(Message::assistant("olá").role, MessageRole::Assistant);
        assert_eq!(Message::system("você é...").role, MessageRole::System);
    }

    #[test]
    fn tool_result_carries_correlation_id() {
        let msg = Message::tool_result("toolu_123", "ok");
        assert!(msg.is_tool_result());
        assert_eq!(msg.tool_call_id.as_deref(), Some("toolu_123"));
    }

    #[test]
    fn non_tool_messages_have_no_correlation_id() {
        assert!(Message::user("oi").tool_call_id.is_none());
    }

    #[test]
    fn assistant_with_tools_keeps_intents() {
        let intent = ToolCallIntent::new("toolu_1", "get_bills", serde_json::json!({}));
        let msg = Message::assistant_with_tools("", vec![intent]);
        assert_eq!(msg.role, MessageRole::Assistant);
        assert_eq!(msg.tool_calls.len(), 1);
        assert_eq!(msg.tool_calls[0].correlation_id, "toolu_1");
    }
}
