//! Loop progress notifications
//!
//! The loop reports what it is doing through this port so a frontend
//! can render streaming text, tool activity and confirmation prompts
//! without the application layer knowing about terminals.

use centavo_domain::{PendingConfirmation, ToolExecutionResult, ValidatedToolCall};

/// Observer for one tool-loop run. All methods default to no-ops.
pub trait LoopProgress: Send + Sync {
    /// A chunk of assistant text arrived.
    fn on_content_delta(&self, _chunk: &str) {}

    /// A validated tool call is about to run (or enter the gate).
    fn on_tool_call(&self, _call: &ValidatedToolCall) {}

    /// A tool call finished (success or failure).
    fn on_tool_result(&self, _result: &ToolExecutionResult) {}

    /// A write tool call is waiting for a decision.
    fn on_confirmation_required(&self, _pending: &PendingConfirmation) {}

    /// The loop is starting another model call.
    fn on_iteration(&self, _iteration: u32) {}
}

/// Silent observer for headless runs and tests.
pub struct NoProgress;

impl LoopProgress for NoProgress {}
