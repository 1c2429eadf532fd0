//! Tool handler port

use async_trait::async_trait;

use centavo_domain::{ToolError, ValidatedArgs};

/// Per-run context passed to every handler.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    /// Identifier of the user this run acts on behalf of
    pub caller_id: String,
    /// IANA timezone for date defaults (e.g. "America/Sao_Paulo")
    pub timezone: Option<String>,
}

impl ExecutionContext {
    pub fn new(caller_id: impl Into<String>) -> Self {
        Self {
            caller_id: caller_id.into(),
            timezone: None,
        }
    }

    pub fn with_timezone(mut self, timezone: impl Into<String>) -> Self {
        self.timezone = Some(timezone.into());
        self
    }
}

/// Business logic behind one catalog entry.
///
/// Handlers only ever receive validated arguments; they never re-check
/// structure, only enforce domain rules (existence, ownership, state).
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn handle(
        &self,
        arguments: &ValidatedArgs,
        context: &ExecutionContext,
    ) -> Result<serde_json::Value, ToolError>;
}
