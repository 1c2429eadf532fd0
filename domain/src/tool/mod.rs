//! Tool system entities
//!
//! The tool pipeline has three stages with distinct types:
//!
//! ```text
//! ToolCallIntent (raw, from provider)
//!     → ParameterSchema::validate → ValidatedToolCall
//!     → executor / confirmation gate → ToolExecutionResult
//! ```
//!
//! Only a [`ValidatedToolCall`](calls::ValidatedToolCall) may reach the
//! gate or an executor, and every result traces back to its intent via
//! the correlation id.

pub mod calls;
pub mod entities;
pub mod result;
pub mod schema;
