//! Use cases: orchestration flows built on the ports

pub mod run_tool_loop;

pub use run_tool_loop::{
    DEFAULT_MAX_ITERATIONS, LoopFinish, RunToolLoopUseCase, ToolLoopInput, ToolLoopOutcome,
};
