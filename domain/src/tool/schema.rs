//! Structural parameter validation
//!
//! Each tool declares a [`ParameterSchema`]; raw arguments from the
//! model are validated strictly against it. Unknown fields, missing
//! required fields and type mismatches all fail, and every failure
//! carries a [`FieldDiagnostic`] naming the offending field so the loop
//! can relay an actionable correction to the model instead of aborting.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::calls::ValidatedArgs;

/// Accepted type of a single tool parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FieldType {
    /// Free-form text.
    Text,
    /// Whole number, optionally range-restricted (inclusive).
    Integer {
        #[serde(skip_serializing_if = "Option::is_none")]
        min: Option<i64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        max: Option<i64>,
    },
    /// Floating-point number (integers are accepted too).
    Number,
    /// Boolean flag.
    Boolean,
    /// Text constrained to RFC 4122 UUID format.
    Uuid,
    /// Text constrained to a closed set of values.
    Choice { values: Vec<String> },
}

impl FieldType {
    pub fn integer() -> Self {
        FieldType::Integer {
            min: None,
            max: None,
        }
    }

    pub fn integer_range(min: i64, max: i64) -> Self {
        FieldType::Integer {
            min: Some(min),
            max: Some(max),
        }
    }

    pub fn choice(values: impl IntoIterator<Item = impl Into<String>>) -> Self {
        FieldType::Choice {
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// JSON Schema type name for the provider wire format.
    fn json_type(&self) -> &'static str {
        match self {
            FieldType::Text | FieldType::Uuid | FieldType::Choice { .. } => "string",
            FieldType::Integer { .. } => "integer",
            FieldType::Number => "number",
            FieldType::Boolean => "boolean",
        }
    }
}

/// Specification of one tool parameter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    pub description: String,
    pub field_type: FieldType,
    pub required: bool,
}

impl FieldSpec {
    pub fn required(
        name: impl Into<String>,
        description: impl Into<String>,
        field_type: FieldType,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            field_type,
            required: true,
        }
    }

    pub fn optional(
        name: impl Into<String>,
        description: impl Into<String>,
        field_type: FieldType,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            field_type,
            required: false,
        }
    }
}

/// A field-level validation finding, actionable by the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDiagnostic {
    /// Name of the offending field
    pub field: String,
    /// What is wrong with it
    pub problem: String,
}

impl FieldDiagnostic {
    pub fn new(field: impl Into<String>, problem: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            problem: problem.into(),
        }
    }
}

impl std::fmt::Display for FieldDiagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.problem)
    }
}

/// Structural validator for a tool's arguments.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParameterSchema {
    fields: Vec<FieldSpec>,
}

impl ParameterSchema {
    pub fn new() -> Self {
        Self { fields: Vec::new() }
    }

    pub fn with_field(mut self, field: FieldSpec) -> Self {
        self.fields.push(field);
        self
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    /// Validate raw arguments strictly against this schema.
    ///
    /// Returns the validated argument map, or the full list of
    /// field-level diagnostics (never just the first one).
    pub fn validate(&self, raw: &serde_json::Value) -> Result<ValidatedArgs, Vec<FieldDiagnostic>> {
        let mut diagnostics = Vec::new();

        let object = match raw {
            serde_json::Value::Object(map) => map.clone(),
            serde_json::Value::Null => serde_json::Map::new(),
            other => {
                return Err(vec![FieldDiagnostic::new(
                    "(arguments)",
                    format!("expected a JSON object, got {}", json_type_name(other)),
                )]);
            }
        };

        // Unknown fields fail closed
        for key in object.keys() {
            if !self.fields.iter().any(|f| f.name == *key) {
                diagnostics.push(FieldDiagnostic::new(key, "unknown field"));
            }
        }

        let mut validated = BTreeMap::new();
        for spec in &self.fields {
            match object.get(&spec.name) {
                None | Some(serde_json::Value::Null) => {
                    if spec.required {
                        diagnostics.push(FieldDiagnostic::new(&spec.name, "required field is missing"));
                    }
                }
                Some(value) => match check_type(&spec.field_type, value) {
                    Ok(()) => {
                        validated.insert(spec.name.clone(), value.clone());
                    }
                    Err(problem) => diagnostics.push(FieldDiagnostic::new(&spec.name, problem)),
                },
            }
        }

        if diagnostics.is_empty() {
            Ok(ValidatedArgs::new(validated))
        } else {
            Err(diagnostics)
        }
    }

    /// Render this schema as a JSON Schema object for provider APIs.
    pub fn to_json_schema(&self) -> serde_json::Value {
        let mut properties = serde_json::Map::new();
        let mut required = Vec::new();

        for spec in &self.fields {
            let mut prop = serde_json::Map::new();
            prop.insert("type".into(), spec.field_type.json_type().into());
            prop.insert("description".into(), spec.description.clone().into());
            match &spec.field_type {
                FieldType::Uuid => {
                    prop.insert("format".into(), "uuid".into());
                }
                FieldType::Choice { values } => {
                    prop.insert(
                        "enum".into(),
                        serde_json::Value::Array(
                            values.iter().map(|v| v.clone().into()).collect(),
                        ),
                    );
                }
                FieldType::Integer { min, max } => {
                    if let Some(min) = min {
                        prop.insert("minimum".into(), (*min).into());
                    }
                    if let Some(max) = max {
                        prop.insert("maximum".into(), (*max).into());
                    }
                }
                _ => {}
            }
            properties.insert(spec.name.clone(), serde_json::Value::Object(prop));
            if spec.required {
                required.push(serde_json::Value::String(spec.name.clone()));
            }
        }

        serde_json::json!({
            "type": "object",
            "properties": properties,
            "required": required,
            "additionalProperties": false,
        })
    }
}

fn check_type(field_type: &FieldType, value: &serde_json::Value) -> Result<(), String> {
    match field_type {
        FieldType::Text => {
            if value.is_string() {
                Ok(())
            } else {
                Err(format!("expected a string, got {}", json_type_name(value)))
            }
        }
        FieldType::Integer { min, max } => {
            let Some(n) = value.as_i64() else {
                return Err(format!("expected an integer, got {}", json_type_name(value)));
            };
            if let Some(min) = min
                && n < *min
            {
                return Err(format!("must be >= {}, got {}", min, n));
            }
            if let Some(max) = max
                && n > *max
            {
                return Err(format!("must be <= {}, got {}", max, n));
            }
            Ok(())
        }
        FieldType::Number => {
            if value.is_number() {
                Ok(())
            } else {
                Err(format!("expected a number, got {}", json_type_name(value)))
            }
        }
        FieldType::Boolean => {
            if value.is_boolean() {
                Ok(())
            } else {
                Err(format!("expected a boolean, got {}", json_type_name(value)))
            }
        }
        FieldType::Uuid => {
            let Some(s) = value.as_str() else {
                return Err(format!("expected a UUID string, got {}", json_type_name(value)));
            };
            if uuid::Uuid::parse_str(s).is_ok() {
                Ok(())
            } else {
                Err(format!("'{}' is not a valid UUID", s))
            }
        }
        FieldType::Choice { values } => {
            let Some(s) = value.as_str() else {
                return Err(format!("expected a string, got {}", json_type_name(value)));
            };
            if values.iter().any(|v| v == s) {
                Ok(())
            } else {
                Err(format!("'{}' is not one of: {}", s, values.join(", ")))
            }
        }
    }
}

fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn expense_schema() -> ParameterSchema {
        ParameterSchema::new()
            .with_field(FieldSpec::required("name", "Nome da despesa", FieldType::Text))
            .with_field(FieldSpec::required(
                "category",
                "Categoria da despesa",
                FieldType::choice(["alimentacao", "transporte", "lazer", "outros"]),
            ))
            .with_field(FieldSpec::optional(
                "actualAmount",
                "Valor gasto",
                FieldType::Number,
            ))
            .with_field(FieldSpec::optional(
                "isRecurring",
                "Despesa recorrente",
                FieldType::Boolean,
            ))
    }

    #[test]
    fn valid_arguments_pass() {
        let args = expense_schema()
            .validate(&json!({
                "name": "Mercado",
                "category": "alimentacao",
                "actualAmount": 450.0,
            }))
            .unwrap();
        assert_eq!(args.get_str("name"), Some("Mercado"));
        assert_eq!(args.get_f64("actualAmount"), Some(450.0));
        assert_eq!(args.get_bool("isRecurring"), None);
    }

    #[test]
    fn missing_required_field_is_diagnosed() {
        let err = expense_schema()
            .validate(&json!({"name": "Mercado"}))
            .unwrap_err();
        assert_eq!(err.len(), 1);
        assert_eq!(err[0].field, "category");
        assert!(err[0].problem.contains("missing"));
    }

    #[test]
    fn unknown_field_fails_closed() {
        let err = expense_schema()
            .validate(&json!({
                "name": "Mercado",
                "category": "alimentacao",
                "valor": 10,
            }))
            .unwrap_err();
        assert_eq!(err.len(), 1);
        assert_eq!(err[0].field, "valor");
        assert_eq!(err[0].problem, "unknown field");
    }

    #[test]
    fn type_mismatch_is_diagnosed_per_field() {
        let err = expense_schema()
            .validate(&json!({
                "name": 42,
                "category": "contabilidade",
                "isRecurring": "sim",
            }))
            .unwrap_err();
        // All three problems reported, not just the first
        assert_eq!(err.len(), 3);
        let fields: Vec<&str> = err.iter().map(|d| d.field.as_str()).collect();
        assert_eq!(fields, vec!["name", "category", "isRecurring"]);
    }

    #[test]
    fn uuid_format_is_enforced() {
        let schema = ParameterSchema::new()
            .with_field(FieldSpec::required("billId", "Id da conta", FieldType::Uuid));

        let err = schema.validate(&json!({"billId": "not-a-uuid"})).unwrap_err();
        assert_eq!(err[0].field, "billId");
        assert!(err[0].problem.contains("not a valid UUID"));

        let ok = schema.validate(&json!({"billId": "7f9c24e8-3b12-4f6a-9ad0-1c2b3d4e5f60"}));
        assert!(ok.is_ok());
    }

    #[test]
    fn integer_range_is_enforced() {
        let schema = ParameterSchema::new().with_field(FieldSpec::optional(
            "month",
            "Mês (1-12)",
            FieldType::integer_range(1, 12),
        ));

        assert!(schema.validate(&json!({"month": 1})).is_ok());
        assert!(schema.validate(&json!({"month": 12})).is_ok());
        let err = schema.validate(&json!({"month": 13})).unwrap_err();
        assert!(err[0].problem.contains("<= 12"));
        let err = schema.validate(&json!({"month": 0})).unwrap_err();
        assert!(err[0].problem.contains(">= 1"));
    }

    #[test]
    fn null_arguments_are_an_empty_object() {
        let schema = ParameterSchema::new().with_field(FieldSpec::optional(
            "month",
            "Mês",
            FieldType::integer(),
        ));
        assert!(schema.validate(&serde_json::Value::Null).is_ok());
    }

    #[test]
    fn non_object_arguments_are_rejected() {
        let err = expense_schema().validate(&json!([1, 2, 3])).unwrap_err();
        assert_eq!(err[0].field, "(arguments)");
        assert!(err[0].problem.contains("array"));
    }

    #[test]
    fn json_schema_rendering() {
        let schema = expense_schema().to_json_schema();
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["additionalProperties"], false);
        assert_eq!(schema["properties"]["category"]["enum"][0], "alimentacao");
        assert_eq!(schema["required"][0], "name");
        assert_eq!(schema["required"][1], "category");
    }
}
