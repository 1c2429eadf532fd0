//! Tool execution results and errors
//!
//! A [`ToolExecutionResult`] is always produced for every intent —
//! validation failures, gate rejections and handler faults included —
//! and never thrown past the loop boundary. The error kind drives what
//! the model is told on the next turn.

use serde::{Deserialize, Serialize};

use crate::chat::Message;

use super::schema::FieldDiagnostic;

/// Classification of a tool failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolErrorKind {
    /// The requested tool is not in the catalog.
    UnknownTool,
    /// Arguments failed schema validation; diagnostics name the fields.
    InvalidArguments,
    /// The user declined the confirmation for a write tool.
    UserRejected,
    /// The confirmation expired before a decision arrived.
    Expired,
    /// The handler itself failed.
    ExecutionFailed,
}

impl ToolErrorKind {
    pub fn as_str(&self) -> &str {
        match self {
            ToolErrorKind::UnknownTool => "unknown_tool",
            ToolErrorKind::InvalidArguments => "invalid_arguments",
            ToolErrorKind::UserRejected => "user_rejected",
            ToolErrorKind::Expired => "expired",
            ToolErrorKind::ExecutionFailed => "execution_failed",
        }
    }
}

/// Error from the tool pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolError {
    pub kind: ToolErrorKind,
    pub message: String,
    /// Field-level findings (populated for `InvalidArguments`)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<FieldDiagnostic>,
}

impl ToolError {
    pub fn new(kind: ToolErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            diagnostics: Vec::new(),
        }
    }

    pub fn unknown_tool(name: &str) -> Self {
        Self::new(
            ToolErrorKind::UnknownTool,
            format!("unknown tool: {}", name),
        )
    }

    pub fn invalid_arguments(tool_name: &str, diagnostics: Vec<FieldDiagnostic>) -> Self {
        let detail = diagnostics
            .iter()
            .map(|d| d.to_string())
            .collect::<Vec<_>>()
            .join("; ");
        Self {
            kind: ToolErrorKind::InvalidArguments,
            message: format!("invalid arguments for {}: {}", tool_name, detail),
            diagnostics,
        }
    }

    pub fn user_rejected() -> Self {
        Self::new(
            ToolErrorKind::UserRejected,
            "the user declined this action",
        )
    }

    pub fn expired() -> Self {
        Self::new(
            ToolErrorKind::Expired,
            "the confirmation expired before a decision was made",
        )
    }

    pub fn execution_failed(message: impl Into<String>) -> Self {
        Self::new(ToolErrorKind::ExecutionFailed, message)
    }

    /// Rendering fed back to the model. An expired confirmation reads
    /// exactly like a rejection so the model reacts the same way to
    /// both; the kind stays distinct for callers and telemetry.
    pub fn model_text(&self) -> String {
        match self.kind {
            ToolErrorKind::Expired => ToolError::user_rejected().to_string(),
            _ => self.to_string(),
        }
    }
}

impl std::fmt::Display for ToolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.kind.as_str(), self.message)
    }
}

impl std::error::Error for ToolError {}

/// Outcome of one tool call, keyed by its correlation id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolExecutionResult {
    /// Correlation id of the originating intent
    pub correlation_id: String,
    pub tool_name: String,
    pub success: bool,
    /// Payload for the model (serialized JSON), on success
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ToolError>,
}

impl ToolExecutionResult {
    pub fn success(
        correlation_id: impl Into<String>,
        tool_name: impl Into<String>,
        output: impl Into<String>,
    ) -> Self {
        Self {
            correlation_id: correlation_id.into(),
            tool_name: tool_name.into(),
            success: true,
            output: Some(output.into()),
            error: None,
        }
    }

    pub fn failure(
        correlation_id: impl Into<String>,
        tool_name: impl Into<String>,
        error: ToolError,
    ) -> Self {
        Self {
            correlation_id: correlation_id.into(),
            tool_name: tool_name.into(),
            success: false,
            output: None,
            error: Some(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    pub fn error_kind(&self) -> Option<ToolErrorKind> {
        self.error.as_ref().map(|e| e.kind)
    }

    /// Render this result as the tool message fed back to the model.
    ///
    /// The correlation id is preserved so the model can match the
    /// result to the call it made.
    pub fn into_message(self) -> Message {
        let content = match (&self.output, &self.error) {
            (Some(output), _) => output.clone(),
            (None, Some(error)) => format!("Error: {}", error.model_text()),
            (None, None) => String::new(),
        };
        Message::tool_result(self.correlation_id, content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::MessageRole;

    #[test]
    fn success_result_renders_payload() {
        let result = ToolExecutionResult::success("toolu_1", "get_expenses", r#"{"total": 450}"#);
        assert!(result.is_success());
        assert_eq!(result.error_kind(), None);

        let msg = result.into_message();
        assert_eq!(msg.role, MessageRole::Tool);
        assert_eq!(msg.tool_call_id.as_deref(), Some("toolu_1"));
        assert_eq!(msg.content, r#"{"total": 450}"#);
    }

    #[test]
    fn failure_result_renders_error_prefix() {
        let result =
            ToolExecutionResult::failure("toolu_2", "create_expense", ToolError::user_rejected());
        assert!(!result.is_success());
        assert_eq!(result.error_kind(), Some(ToolErrorKind::UserRejected));

        let msg = result.into_message();
        assert!(msg.content.starts_with("Error: [user_rejected]"));
    }

    #[test]
    fn invalid_arguments_message_names_fields() {
        let err = ToolError::invalid_arguments(
            "mark_bill_paid",
            vec![FieldDiagnostic::new("billId", "'x' is not a valid UUID")],
        );
        assert!(err.message.contains("billId"));
        assert!(err.message.contains("mark_bill_paid"));
        assert_eq!(err.diagnostics.len(), 1);
    }

    #[test]
    fn expiry_and_rejection_are_distinct_kinds() {
        assert_eq!(ToolError::expired().kind, ToolErrorKind::Expired);
        assert_eq!(ToolError::user_rejected().kind, ToolErrorKind::UserRejected);
    }

    #[test]
    fn expiry_renders_like_rejection_for_the_model() {
        let rejected =
            ToolExecutionResult::failure("toolu_1", "create_expense", ToolError::user_rejected())
                .into_message();
        let expired =
            ToolExecutionResult::failure("toolu_1", "create_expense", ToolError::expired())
                .into_message();
        assert_eq!(rejected.content, expired.content);
        assert!(rejected.content.starts_with("Error: [user_rejected]"));
    }
}
