//! Tool executor: dispatches validated calls to registered handlers
//!
//! The executor owns the catalog and a handler per catalog entry.
//! Dispatch is by exact name, and every outcome — including a handler
//! fault — comes back as a [`ToolExecutionResult`] so the loop never
//! has to unwind.

use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

use centavo_domain::{ToolCatalog, ToolError, ToolExecutionResult, ValidatedToolCall};

use crate::ports::{ExecutionContext, ToolHandler};

pub struct ToolExecutor {
    catalog: Arc<ToolCatalog>,
    handlers: HashMap<String, Arc<dyn ToolHandler>>,
}

impl ToolExecutor {
    pub fn new(catalog: Arc<ToolCatalog>) -> Self {
        Self {
            catalog,
            handlers: HashMap::new(),
        }
    }

    /// Register the handler for a catalog entry (startup only).
    pub fn register(mut self, name: impl Into<String>, handler: Arc<dyn ToolHandler>) -> Self {
        self.handlers.insert(name.into(), handler);
        self
    }

    pub fn catalog(&self) -> &ToolCatalog {
        &self.catalog
    }

    /// Run one validated call to completion.
    pub async fn execute(
        &self,
        call: &ValidatedToolCall,
        context: &ExecutionContext,
    ) -> ToolExecutionResult {
        let Some(handler) = self.handlers.get(&call.tool_name) else {
            // Cataloged but unwired: a deployment bug, not a model error.
            warn!(tool = %call.tool_name, "no handler registered for cataloged tool");
            return ToolExecutionResult::failure(
                &call.correlation_id,
                &call.tool_name,
                ToolError::execution_failed(format!(
                    "no handler registered for tool: {}",
                    call.tool_name
                )),
            );
        };

        debug!(tool = %call.tool_name, correlation_id = %call.correlation_id, "executing tool");
        match handler.handle(&call.arguments, context).await {
            Ok(output) => match serde_json::to_string(&output) {
                Ok(payload) => {
                    ToolExecutionResult::success(&call.correlation_id, &call.tool_name, payload)
                }
                Err(e) => ToolExecutionResult::failure(
                    &call.correlation_id,
                    &call.tool_name,
                    ToolError::execution_failed(format!("unserializable tool output: {}", e)),
                ),
            },
            Err(error) => {
                warn!(tool = %call.tool_name, %error, "tool handler failed");
                ToolExecutionResult::failure(&call.correlation_id, &call.tool_name, error)
            }
        }
    }
}
