//! Application layer for centavo
//!
//! Orchestration around the domain: the provider and tool-handler
//! ports, the tool executor, the confirmation gate that guards write
//! tools, the retry policy for provider calls and the tool loop that
//! ties them together.

pub mod executor;
pub mod gate;
pub mod ports;
pub mod retry;
pub mod use_cases;

pub use executor::ToolExecutor;
pub use gate::{ConfirmationGate, GateError};
pub use ports::{
    CompletionRequest, ExecutionContext, LoopProgress, NoProgress, ProviderError, ProviderInfo,
    ProviderPort, StreamAssembler, StreamHandle, ToolHandler,
};
pub use retry::RetryPolicy;
pub use use_cases::{
    DEFAULT_MAX_ITERATIONS, LoopFinish, RunToolLoopUseCase, ToolLoopInput, ToolLoopOutcome,
};
