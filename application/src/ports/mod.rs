//! Ports: contracts between the application layer and the outside world

pub mod progress;
pub mod provider;
pub mod tool_handler;

pub use progress::{LoopProgress, NoProgress};
pub use provider::{
    CompletionRequest, ProviderError, ProviderInfo, ProviderPort, StreamAssembler, StreamHandle,
};
pub use tool_handler::{ExecutionContext, ToolHandler};
