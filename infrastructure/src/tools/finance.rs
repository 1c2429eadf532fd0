//! Finance tools: catalog definitions and handlers
//!
//! Five read tools and two write tools over the [`FinanceStore`].
//! Handlers receive schema-validated arguments and only enforce domain
//! rules (existence, date parsing, defaults). All descriptions and
//! messages are PT-BR, matching the assistant's audience.

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate, Utc};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

use centavo_application::ports::{ExecutionContext, ToolHandler};
use centavo_application::ToolExecutor;
use centavo_domain::{
    FieldDiagnostic, FieldSpec, FieldType, ParameterSchema, ToolCatalog, ToolDefinition, ToolError,
    ValidatedArgs,
};

use super::store::{FinanceStore, NewExpense, StoreError};

/// Expense categories the assistant understands.
pub const CATEGORIES: [&str; 7] = [
    "alimentacao",
    "transporte",
    "lazer",
    "saude",
    "educacao",
    "vestuario",
    "outros",
];

const DEFAULT_MONTHS_AHEAD: i64 = 3;

impl From<StoreError> for ToolError {
    fn from(error: StoreError) -> Self {
        ToolError::execution_failed(error.to_string())
    }
}

/// Catalog of every finance tool, in the order the model sees them.
pub fn finance_catalog() -> ToolCatalog {
    let month_field = || {
        FieldSpec::optional(
            "month",
            "Mês de referência (1-12); padrão: mês atual",
            FieldType::integer_range(1, 12),
        )
    };
    let year_field = || {
        FieldSpec::optional(
            "year",
            "Ano de referência; padrão: ano atual",
            FieldType::integer_range(2000, 2100),
        )
    };

    ToolCatalog::new()
        .register(
            ToolDefinition::read(
                "get_expenses",
                "Lista as despesas variáveis do mês com totais orçados e gastos",
            )
            .with_parameters(
                ParameterSchema::new()
                    .with_field(month_field())
                    .with_field(year_field()),
            ),
        )
        .register(
            ToolDefinition::read(
                "get_bills",
                "Lista as contas fixas do mês com situação de pagamento",
            )
            .with_parameters(
                ParameterSchema::new()
                    .with_field(month_field())
                    .with_field(year_field())
                    .with_field(FieldSpec::optional(
                        "onlyUnpaid",
                        "Retornar apenas contas em aberto",
                        FieldType::Boolean,
                    )),
            ),
        )
        .register(
            ToolDefinition::read(
                "get_finance_summary",
                "Resumo do mês: despesas, contas pagas e em aberto, total comprometido",
            )
            .with_parameters(
                ParameterSchema::new()
                    .with_field(month_field())
                    .with_field(year_field()),
            ),
        )
        .register(ToolDefinition::read(
            "get_debt_progress",
            "Progresso de pagamento das dívidas de longo prazo",
        ))
        .register(
            ToolDefinition::read(
                "get_upcoming_installments",
                "Parcelas que vencem nos próximos meses",
            )
            .with_parameters(ParameterSchema::new().with_field(FieldSpec::optional(
                "monthsAhead",
                "Horizonte em meses (1-24); padrão: 3",
                FieldType::integer_range(1, 24),
            ))),
        )
        .register(
            ToolDefinition::write(
                "create_expense",
                "Registra uma despesa variável no mês corrente",
            )
            .with_parameters(
                ParameterSchema::new()
                    .with_field(FieldSpec::required(
                        "name",
                        "Descrição da despesa",
                        FieldType::Text,
                    ))
                    .with_field(FieldSpec::required(
                        "category",
                        "Categoria da despesa",
                        FieldType::choice(CATEGORIES),
                    ))
                    .with_field(FieldSpec::optional(
                        "budgetedAmount",
                        "Valor orçado em reais",
                        FieldType::Number,
                    ))
                    .with_field(FieldSpec::optional(
                        "actualAmount",
                        "Valor efetivamente gasto em reais",
                        FieldType::Number,
                    ))
                    .with_field(FieldSpec::optional(
                        "date",
                        "Data da despesa (AAAA-MM-DD); padrão: hoje",
                        FieldType::Text,
                    )),
            )
            .with_example(json!({
                "name": "Mercado",
                "category": "alimentacao",
                "actualAmount": 450.0,
            })),
        )
        .register(
            ToolDefinition::write("mark_bill_paid", "Marca uma conta fixa como paga")
                .with_parameters(
                    ParameterSchema::new()
                        .with_field(FieldSpec::required(
                            "billId",
                            "Identificador da conta",
                            FieldType::Uuid,
                        ))
                        .with_field(FieldSpec::optional(
                            "paidDate",
                            "Data do pagamento (AAAA-MM-DD); padrão: hoje",
                            FieldType::Text,
                        )),
                )
                .with_example(json!({
                    "billId": "3fa85f64-5717-4562-b3fc-2c963f66afa6",
                })),
        )
}

/// Executor with every finance handler wired to `store`.
pub fn finance_executor(store: Arc<dyn FinanceStore>) -> ToolExecutor {
    ToolExecutor::new(Arc::new(finance_catalog()))
        .register("get_expenses", Arc::new(GetExpenses::new(store.clone())))
        .register("get_bills", Arc::new(GetBills::new(store.clone())))
        .register(
            "get_finance_summary",
            Arc::new(GetFinanceSummary::new(store.clone())),
        )
        .register(
            "get_debt_progress",
            Arc::new(GetDebtProgress::new(store.clone())),
        )
        .register(
            "get_upcoming_installments",
            Arc::new(GetUpcomingInstallments::new(store.clone())),
        )
        .register("create_expense", Arc::new(CreateExpense::new(store.clone())))
        .register("mark_bill_paid", Arc::new(MarkBillPaid::new(store)))
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

fn month_year(args: &ValidatedArgs, today: NaiveDate) -> (u32, i32) {
    let month = args
        .get_i64("month")
        .map(|m| m as u32)
        .unwrap_or_else(|| today.month());
    let year = args
        .get_i64("year")
        .map(|y| y as i32)
        .unwrap_or_else(|| today.year());
    (month, year)
}

fn parse_date(tool: &str, field: &str, value: &str) -> Result<NaiveDate, ToolError> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| {
        ToolError::invalid_arguments(
            tool,
            vec![FieldDiagnostic::new(
                field,
                format!("'{}' não é uma data válida (use AAAA-MM-DD)", value),
            )],
        )
    })
}

macro_rules! store_handler {
    ($name:ident) => {
        pub struct $name {
            store: Arc<dyn FinanceStore>,
        }

        impl $name {
            pub fn new(store: Arc<dyn FinanceStore>) -> Self {
                Self { store }
            }
        }
    };
}

store_handler!(GetExpenses);

#[async_trait]
impl ToolHandler for GetExpenses {
    async fn handle(
        &self,
        args: &ValidatedArgs,
        context: &ExecutionContext,
    ) -> Result<serde_json::Value, ToolError> {
        let (month, year) = month_year(args, today());
        let expenses = self.store.expenses(&context.caller_id, month, year).await?;
        let total_budgeted: f64 = expenses.iter().map(|e| e.budgeted_amount).sum();
        let total_actual: f64 = expenses.iter().filter_map(|e| e.actual_amount).sum();
        Ok(json!({
            "month": month,
            "year": year,
            "count": expenses.len(),
            "totalBudgeted": total_budgeted,
            "totalActual": total_actual,
            "items": expenses,
        }))
    }
}

store_handler!(GetBills);

#[async_trait]
impl ToolHandler for GetBills {
    async fn handle(
        &self,
        args: &ValidatedArgs,
        context: &ExecutionContext,
    ) -> Result<serde_json::Value, ToolError> {
        let (month, year) = month_year(args, today());
        let mut bills = self.store.bills(&context.caller_id, month, year).await?;
        if args.get_bool("onlyUnpaid").unwrap_or(false) {
            bills.retain(|b| !b.paid);
        }
        let total_open: f64 = bills.iter().filter(|b| !b.paid).map(|b| b.amount).sum();
        let total_paid: f64 = bills.iter().filter(|b| b.paid).map(|b| b.amount).sum();
        Ok(json!({
            "month": month,
            "year": year,
            "count": bills.len(),
            "totalOpen": total_open,
            "totalPaid": total_paid,
            "items": bills,
        }))
    }
}

store_handler!(GetFinanceSummary);

#[async_trait]
impl ToolHandler for GetFinanceSummary {
    async fn handle(
        &self,
        args: &ValidatedArgs,
        context: &ExecutionContext,
    ) -> Result<serde_json::Value, ToolError> {
        let (month, year) = month_year(args, today());
        let expenses = self.store.expenses(&context.caller_id, month, year).await?;
        let bills = self.store.bills(&context.caller_id, month, year).await?;

        let total_expenses: f64 = expenses
            .iter()
            .map(|e| e.actual_amount.unwrap_or(e.budgeted_amount))
            .sum();
        let bills_paid: f64 = bills.iter().filter(|b| b.paid).map(|b| b.amount).sum();
        let bills_open: f64 = bills.iter().filter(|b| !b.paid).map(|b| b.amount).sum();

        Ok(json!({
            "month": month,
            "year": year,
            "totalExpenses": total_expenses,
            "billsPaid": bills_paid,
            "billsOpen": bills_open,
            "totalCommitted": total_expenses + bills_paid + bills_open,
        }))
    }
}

store_handler!(GetDebtProgress);

#[async_trait]
impl ToolHandler for GetDebtProgress {
    async fn handle(
        &self,
        _args: &ValidatedArgs,
        context: &ExecutionContext,
    ) -> Result<serde_json::Value, ToolError> {
        let debts = self.store.debts(&context.caller_id).await?;
        let total: f64 = debts.iter().map(|d| d.total_amount).sum();
        let paid: f64 = debts.iter().map(|d| d.paid_amount).sum();
        let overall = if total > 0.0 { paid / total * 100.0 } else { 100.0 };

        let items: Vec<_> = debts
            .iter()
            .map(|d| {
                json!({
                    "id": d.id,
                    "name": d.name,
                    "totalAmount": d.total_amount,
                    "paidAmount": d.paid_amount,
                    "percentPaid": d.percent_paid(),
                })
            })
            .collect();
        Ok(json!({
            "count": items.len(),
            "overallPercentPaid": overall,
            "items": items,
        }))
    }
}

store_handler!(GetUpcomingInstallments);

#[async_trait]
impl ToolHandler for GetUpcomingInstallments {
    async fn handle(
        &self,
        args: &ValidatedArgs,
        context: &ExecutionContext,
    ) -> Result<serde_json::Value, ToolError> {
        let months_ahead = args.get_i64("monthsAhead").unwrap_or(DEFAULT_MONTHS_AHEAD);
        let until = today() + chrono::Duration::days(months_ahead * 30);
        let installments = self
            .store
            .installments_until(&context.caller_id, until)
            .await?;
        let total: f64 = installments.iter().map(|i| i.amount).sum();
        Ok(json!({
            "monthsAhead": months_ahead,
            "count": installments.len(),
            "totalDue": total,
            "items": installments,
        }))
    }
}

store_handler!(CreateExpense);

#[async_trait]
impl ToolHandler for CreateExpense {
    async fn handle(
        &self,
        args: &ValidatedArgs,
        context: &ExecutionContext,
    ) -> Result<serde_json::Value, ToolError> {
        let date = match args.get_str("date") {
            Some(raw) => parse_date("create_expense", "date", raw)?,
            None => today(),
        };
        let actual_amount = args.get_f64("actualAmount");
        let budgeted = args
            .get_f64("budgetedAmount")
            .or(actual_amount)
            .unwrap_or(0.0);

        let expense = self
            .store
            .add_expense(
                &context.caller_id,
                NewExpense {
                    name: args.get_str("name").unwrap_or_default().to_string(),
                    category: args.get_str("category").unwrap_or("outros").to_string(),
                    budgeted_amount: budgeted,
                    actual_amount,
                    date,
                },
            )
            .await?;
        Ok(json!({"created": expense}))
    }
}

store_handler!(MarkBillPaid);

#[async_trait]
impl ToolHandler for MarkBillPaid {
    async fn handle(
        &self,
        args: &ValidatedArgs,
        context: &ExecutionContext,
    ) -> Result<serde_json::Value, ToolError> {
        let bill_id = args
            .get_str("billId")
            .and_then(|raw| Uuid::parse_str(raw).ok())
            .ok_or_else(|| ToolError::execution_failed("billId ausente ou inválido"))?;
        let paid_date = match args.get_str("paidDate") {
            Some(raw) => parse_date("mark_bill_paid", "paidDate", raw)?,
            None => today(),
        };

        let bill = self
            .store
            .mark_bill_paid(&context.caller_id, bill_id, paid_date)
            .await
            .map_err(|e| match e {
                StoreError::NotFound(_) => {
                    ToolError::execution_failed(format!("conta {} não encontrada", bill_id))
                }
                other => other.into(),
            })?;
        Ok(json!({"paid": bill}))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::store::{Bill, InMemoryFinanceStore};
    use centavo_domain::{ToolCallIntent, ToolErrorKind};

    fn context() -> ExecutionContext {
        ExecutionContext::new("ana").with_timezone("America/Sao_Paulo")
    }

    fn validated(tool: &str, raw: serde_json::Value) -> ValidatedArgs {
        finance_catalog()
            .get(tool)
            .unwrap()
            .parameters
            .validate(&raw)
            .unwrap()
    }

    #[test]
    fn catalog_has_the_expected_read_write_split() {
        let catalog = finance_catalog();
        assert_eq!(catalog.len(), 7);
        assert_eq!(catalog.read_tools().count(), 5);
        let writes: Vec<_> = catalog.write_tools().map(|t| t.name.as_str()).collect();
        assert_eq!(writes, ["create_expense", "mark_bill_paid"]);
    }

    #[test]
    fn category_must_be_a_known_choice() {
        let intent = ToolCallIntent::new(
            "toolu_1",
            "create_expense",
            json!({"name": "Pastel", "category": "jantinha"}),
        );
        let err = finance_catalog().validate_intent(&intent).unwrap_err();
        assert_eq!(err.kind, ToolErrorKind::InvalidArguments);
        assert_eq!(err.diagnostics[0].field, "category");
    }

    #[tokio::test]
    async fn create_expense_defaults_budget_to_actual() {
        let store = Arc::new(InMemoryFinanceStore::new());
        let handler = CreateExpense::new(store.clone());
        let args = validated(
            "create_expense",
            json!({"name": "Mercado", "category": "alimentacao", "actualAmount": 450.0}),
        );

        let output = handler.handle(&args, &context()).await.unwrap();
        assert_eq!(output["created"]["budgetedAmount"], 450.0);

        let today = Utc::now().date_naive();
        let saved = store
            .expenses("ana", today.month(), today.year())
            .await
            .unwrap();
        assert_eq!(saved.len(), 1);
    }

    #[tokio::test]
    async fn create_expense_rejects_malformed_date() {
        let handler = CreateExpense::new(Arc::new(InMemoryFinanceStore::new()));
        let args = validated(
            "create_expense",
            json!({"name": "Mercado", "category": "outros", "date": "12/08/2026"}),
        );
        let err = handler.handle(&args, &context()).await.unwrap_err();
        assert_eq!(err.kind, ToolErrorKind::InvalidArguments);
        assert_eq!(err.diagnostics[0].field, "date");
    }

    #[tokio::test]
    async fn mark_bill_paid_reports_missing_bill() {
        let handler = MarkBillPaid::new(Arc::new(InMemoryFinanceStore::new()));
        let args = validated(
            "mark_bill_paid",
            json!({"billId": "3fa85f64-5717-4562-b3fc-2c963f66afa6"}),
        );
        let err = handler.handle(&args, &context()).await.unwrap_err();
        assert_eq!(err.kind, ToolErrorKind::ExecutionFailed);
        assert!(err.message.contains("não encontrada"));
    }

    #[tokio::test]
    async fn summary_combines_expenses_and_bills() {
        let store = Arc::new(InMemoryFinanceStore::new());
        let today = Utc::now().date_naive();
        store.insert_bill(
            "ana",
            Bill {
                id: Uuid::new_v4(),
                name: "Luz".into(),
                amount: 150.0,
                due_day: 10,
                month: today.month(),
                year: today.year(),
                paid: false,
                paid_date: None,
            },
        );
        CreateExpense::new(store.clone())
            .handle(
                &validated(
                    "create_expense",
                    json!({"name": "Mercado", "category": "alimentacao", "actualAmount": 450.0}),
                ),
                &context(),
            )
            .await
            .unwrap();

        let summary = GetFinanceSummary::new(store)
            .handle(&validated("get_finance_summary", json!({})), &context())
            .await
            .unwrap();
        assert_eq!(summary["totalExpenses"], 450.0);
        assert_eq!(summary["billsOpen"], 150.0);
        assert_eq!(summary["totalCommitted"], 600.0);
    }

    #[tokio::test]
    async fn only_unpaid_filter_drops_paid_bills() {
        let store = Arc::new(InMemoryFinanceStore::new());
        store.seed_demo("ana");
        let output = GetBills::new(store)
            .handle(
                &validated("get_bills", json!({"onlyUnpaid": true})),
                &context(),
            )
            .await
            .unwrap();
        assert_eq!(output["count"], 1);
        assert_eq!(output["items"][0]["name"], "Energia elétrica");
    }
}
