//! Tool call types: raw intents and validated calls

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A tool call as emitted by the provider — not yet validated.
///
/// The correlation id links this intent to its eventual result (and,
/// for write tools, to its pending confirmation). It is
/// provider-assigned where the API supplies one, or synthesized by the
/// adapter otherwise.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallIntent {
    pub correlation_id: String,
    pub tool_name: String,
    /// Raw argument JSON, exactly as the model produced it
    pub raw_arguments: serde_json::Value,
}

impl ToolCallIntent {
    pub fn new(
        correlation_id: impl Into<String>,
        tool_name: impl Into<String>,
        raw_arguments: serde_json::Value,
    ) -> Self {
        Self {
            correlation_id: correlation_id.into(),
            tool_name: tool_name.into(),
            raw_arguments,
        }
    }
}

/// Arguments that passed schema validation.
///
/// Only constructible through [`ParameterSchema::validate`]
/// (`crate::tool::schema`), which guarantees each entry matched its
/// declared field type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidatedArgs(BTreeMap<String, serde_json::Value>);

impl ValidatedArgs {
    pub(crate) fn new(map: BTreeMap<String, serde_json::Value>) -> Self {
        Self(map)
    }

    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.0.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(|v| v.as_str())
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.0.get(key).and_then(|v| v.as_i64())
    }

    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.0.get(key).and_then(|v| v.as_f64())
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.0.get(key).and_then(|v| v.as_bool())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &serde_json::Value)> {
        self.0.iter()
    }

    /// Render as a JSON object (for confirmation prompts and logs).
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Object(
            self.0
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        )
    }
}

/// A tool call that passed catalog validation — the only form the
/// confirmation gate or an executor may accept.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidatedToolCall {
    pub correlation_id: String,
    pub tool_name: String,
    pub arguments: ValidatedArgs,
}

impl ValidatedToolCall {
    pub fn new(
        correlation_id: impl Into<String>,
        tool_name: impl Into<String>,
        arguments: ValidatedArgs,
    ) -> Self {
        Self {
            correlation_id: correlation_id.into(),
            tool_name: tool_name.into(),
            arguments,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::schema::{FieldSpec, FieldType, ParameterSchema};
    use serde_json::json;

    #[test]
    fn validated_args_accessors() {
        let schema = ParameterSchema::new()
            .with_field(FieldSpec::required("name", "nome", FieldType::Text))
            .with_field(FieldSpec::optional("month", "mês", FieldType::integer()))
            .with_field(FieldSpec::optional("paid", "paga", FieldType::Boolean));

        let args = schema
            .validate(&json!({"name": "Luz", "month": 3, "paid": true}))
            .unwrap();

        assert_eq!(args.get_str("name"), Some("Luz"));
        assert_eq!(args.get_i64("month"), Some(3));
        assert_eq!(args.get_bool("paid"), Some(true));
        assert_eq!(args.get("missing"), None);
        assert!(!args.is_empty());
        assert_eq!(args.to_json()["name"], "Luz");
    }

    #[test]
    fn intent_round_trips_through_serde() {
        let intent = ToolCallIntent::new("toolu_9", "get_bills", json!({"month": 2}));
        let text = serde_json::to_string(&intent).unwrap();
        let back: ToolCallIntent = serde_json::from_str(&text).unwrap();
        assert_eq!(back.correlation_id, "toolu_9");
        assert_eq!(back.tool_name, "get_bills");
        assert_eq!(back.raw_arguments["month"], 2);
    }
}
