//! User-facing confirmation prompts (PT-BR)
//!
//! Each write tool has a message template filled from its validated
//! arguments; anything without a template falls back to a generic
//! "Executar <tool>?".

use crate::tool::calls::ValidatedToolCall;

/// Build the confirmation prompt for a single write tool call.
pub fn confirmation_message(call: &ValidatedToolCall) -> String {
    let args = &call.arguments;
    match call.tool_name.as_str() {
        "create_expense" => {
            let amount = args
                .get_f64("actualAmount")
                .or_else(|| args.get_f64("budgetedAmount"))
                .unwrap_or(0.0);
            let category = args.get_str("category").unwrap_or("outros");
            format!("Registrar gasto de R${:.2} em {}?", amount, category)
        }
        "mark_bill_paid" => match args.get_str("paidDate") {
            Some(date) => format!("Marcar conta como paga em {}?", date),
            None => "Marcar conta como paga hoje?".to_string(),
        },
        _ => fallback_message(&call.tool_name),
    }
}

/// Build one prompt covering several write tool calls from the same
/// model turn.
pub fn batch_message(calls: &[&ValidatedToolCall]) -> String {
    match calls {
        [] => String::new(),
        [single] => confirmation_message(single),
        many => {
            let bullets = many
                .iter()
                .map(|c| format!("• {}", confirmation_message(c)))
                .collect::<Vec<_>>()
                .join("\n");
            format!("Executar {} operações?\n{}", many.len(), bullets)
        }
    }
}

fn fallback_message(tool_name: &str) -> String {
    format!("Executar {}?", tool_name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::calls::ValidatedArgs;
    use crate::tool::schema::{FieldSpec, FieldType, ParameterSchema};
    use serde_json::json;

    fn validated(tool: &str, schema: ParameterSchema, raw: serde_json::Value) -> ValidatedToolCall {
        ValidatedToolCall::new("toolu_1", tool, schema.validate(&raw).unwrap())
    }

    fn expense_call(amount: f64) -> ValidatedToolCall {
        let schema = ParameterSchema::new()
            .with_field(FieldSpec::required("name", "Nome", FieldType::Text))
            .with_field(FieldSpec::required(
                "category",
                "Categoria",
                FieldType::choice(["alimentacao", "transporte"]),
            ))
            .with_field(FieldSpec::optional(
                "actualAmount",
                "Valor",
                FieldType::Number,
            ));
        validated(
            "create_expense",
            schema,
            json!({"name": "Mercado", "category": "alimentacao", "actualAmount": amount}),
        )
    }

    #[test]
    fn create_expense_prompt_names_amount_and_category() {
        let msg = confirmation_message(&expense_call(450.0));
        assert_eq!(msg, "Registrar gasto de R$450.00 em alimentacao?");
    }

    #[test]
    fn unknown_write_tool_falls_back_to_generic_prompt() {
        let call = ValidatedToolCall::new("toolu_2", "delete_everything", ValidatedArgs::default());
        assert_eq!(confirmation_message(&call), "Executar delete_everything?");
    }

    #[test]
    fn batch_of_one_uses_the_single_prompt() {
        let call = expense_call(10.0);
        assert_eq!(batch_message(&[&call]), confirmation_message(&call));
    }

    #[test]
    fn batch_of_many_lists_bullets() {
        let a = expense_call(10.0);
        let b = expense_call(20.0);
        let msg = batch_message(&[&a, &b]);
        assert!(msg.starts_with("Executar 2 operações?"));
        assert_eq!(msg.matches('•').count(), 2);
    }
}
