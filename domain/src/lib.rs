//! Domain layer for centavo
//!
//! Core business entities and value objects with no I/O:
//! conversation messages, normalized provider responses, the tool
//! catalog with structural argument validation, and the confirmation
//! state machine that guards write tools.

pub mod chat;
pub mod confirmation;
pub mod core;
pub mod tool;

// Re-export main types for convenience
pub use chat::response::{FinishReason, ProviderResponse, TokenUsage};
pub use chat::stream::StreamEvent;
pub use chat::{Message, MessageRole};
pub use confirmation::{
    ConfirmationDecision, ConfirmationState, PendingConfirmation, Resolution,
};
pub use tool::calls::{ToolCallIntent, ValidatedArgs, ValidatedToolCall};
pub use tool::entities::{ToolCatalog, ToolDefinition};
pub use tool::result::{ToolError, ToolErrorKind, ToolExecutionResult};
pub use tool::schema::{FieldDiagnostic, FieldSpec, FieldType, ParameterSchema};
