//! Tool definitions and the catalog

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::calls::{ToolCallIntent, ValidatedToolCall};
use super::result::{ToolError, ToolErrorKind};
use super::schema::ParameterSchema;

/// Definition of a tool the model may invoke.
///
/// Identity key is `name`. `requires_confirmation` marks state-mutating
/// (write) tools that must pass the confirmation gate before executing;
/// read-only tools leave it false.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Unique snake_case name (e.g. "create_expense")
    pub name: String,
    /// Human-readable description shown to the model
    pub description: String,
    /// Structural validator for the tool's arguments
    pub parameters: ParameterSchema,
    /// Whether an explicit user confirmation must precede execution
    pub requires_confirmation: bool,
    /// Sample parameter sets sent to providers for accuracy
    pub examples: Vec<serde_json::Value>,
}

impl ToolDefinition {
    pub fn read(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: ParameterSchema::new(),
            requires_confirmation: false,
            examples: Vec::new(),
        }
    }

    pub fn write(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: ParameterSchema::new(),
            requires_confirmation: true,
            examples: Vec::new(),
        }
    }

    pub fn with_parameters(mut self, parameters: ParameterSchema) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn with_example(mut self, example: serde_json::Value) -> Self {
        self.examples.push(example);
        self
    }

    pub fn is_write(&self) -> bool {
        self.requires_confirmation
    }

    /// Provider wire shape for this tool.
    pub fn to_api_tool(&self) -> serde_json::Value {
        let mut tool = serde_json::json!({
            "name": self.name,
            "description": self.description,
            "input_schema": self.parameters.to_json_schema(),
        });
        if !self.examples.is_empty() {
            tool["input_examples"] = serde_json::Value::Array(self.examples.clone());
        }
        tool
    }
}

/// Immutable registry of tool definitions, built once at startup.
///
/// Lookup by name is O(1) and fails closed: an unknown name is never
/// treated as unrestricted or silently ignored — it validates to
/// [`ToolErrorKind::UnknownTool`].
#[derive(Debug, Clone, Default)]
pub struct ToolCatalog {
    tools: HashMap<String, ToolDefinition>,
    /// Registration order, kept stable for provider tool lists
    order: Vec<String>,
}

impl ToolCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a definition (startup only — the catalog is never
    /// mutated once the loop is active).
    pub fn register(mut self, tool: ToolDefinition) -> Self {
        if !self.tools.contains_key(&tool.name) {
            self.order.push(tool.name.clone());
        }
        self.tools.insert(tool.name.clone(), tool);
        self
    }

    pub fn get(&self, name: &str) -> Option<&ToolDefinition> {
        self.tools.get(name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn all(&self) -> impl Iterator<Item = &ToolDefinition> {
        self.order.iter().filter_map(|name| self.tools.get(name))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(|s| s.as_str())
    }

    pub fn write_tools(&self) -> impl Iterator<Item = &ToolDefinition> {
        self.all().filter(|t| t.is_write())
    }

    pub fn read_tools(&self) -> impl Iterator<Item = &ToolDefinition> {
        self.all().filter(|t| !t.is_write())
    }

    /// Validate a raw intent against the catalog.
    ///
    /// Unknown tool names and schema violations both fail here; only a
    /// successful validation produces a [`ValidatedToolCall`].
    pub fn validate_intent(&self, intent: &ToolCallIntent) -> Result<ValidatedToolCall, ToolError> {
        let Some(definition) = self.get(&intent.tool_name) else {
            return Err(ToolError::unknown_tool(&intent.tool_name));
        };
        match definition.parameters.validate(&intent.raw_arguments) {
            Ok(arguments) => Ok(ValidatedToolCall::new(
                &intent.correlation_id,
                &intent.tool_name,
                arguments,
            )),
            Err(diagnostics) => Err(ToolError::invalid_arguments(&intent.tool_name, diagnostics)),
        }
    }

    /// Provider wire shape for the whole catalog, in registration order.
    pub fn to_api_tools(&self) -> Vec<serde_json::Value> {
        self.all().map(|t| t.to_api_tool()).collect()
    }
}
