//! Finance data store: entities, port and in-memory implementation

use async_trait::async_trait;
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// A variable expense in a month's budget.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Expense {
    pub id: Uuid,
    pub name: String,
    pub category: String,
    pub budgeted_amount: f64,
    pub actual_amount: Option<f64>,
    pub date: NaiveDate,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewExpense {
    pub name: String,
    pub category: String,
    pub budgeted_amount: f64,
    pub actual_amount: Option<f64>,
    pub date: NaiveDate,
}

/// A recurring bill within one month.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bill {
    pub id: Uuid,
    pub name: String,
    pub amount: f64,
    pub due_day: u32,
    pub month: u32,
    pub year: i32,
    pub paid: bool,
    pub paid_date: Option<NaiveDate>,
}

/// A long-running debt being paid down.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Debt {
    pub id: Uuid,
    pub name: String,
    pub total_amount: f64,
    pub paid_amount: f64,
}

impl Debt {
    pub fn percent_paid(&self) -> f64 {
        if self.total_amount <= 0.0 {
            return 100.0;
        }
        (self.paid_amount / self.total_amount * 100.0).clamp(0.0, 100.0)
    }
}

/// One future installment of a financed purchase.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Installment {
    pub id: Uuid,
    pub description: String,
    pub amount: f64,
    pub due_date: NaiveDate,
    pub number: u32,
    pub total: u32,
}

/// Persistence port for the finance tools.
#[async_trait]
pub trait FinanceStore: Send + Sync {
    async fn expenses(
        &self,
        caller: &str,
        month: u32,
        year: i32,
    ) -> Result<Vec<Expense>, StoreError>;

    async fn add_expense(&self, caller: &str, expense: NewExpense) -> Result<Expense, StoreError>;

    async fn bills(&self, caller: &str, month: u32, year: i32) -> Result<Vec<Bill>, StoreError>;

    /// Marks a bill paid on `paid_date`. Idempotent: paying an
    /// already-paid bill keeps the original paid date.
    async fn mark_bill_paid(
        &self,
        caller: &str,
        bill_id: Uuid,
        paid_date: NaiveDate,
    ) -> Result<Bill, StoreError>;

    async fn debts(&self, caller: &str) -> Result<Vec<Debt>, StoreError>;

    async fn installments_until(
        &self,
        caller: &str,
        until: NaiveDate,
    ) -> Result<Vec<Installment>, StoreError>;
}

#[derive(Default)]
struct UserBook {
    expenses: Vec<Expense>,
    bills: Vec<Bill>,
    debts: Vec<Debt>,
    installments: Vec<Installment>,
}

/// In-memory store, one book per caller.
#[derive(Default)]
pub struct InMemoryFinanceStore {
    books: Mutex<HashMap<String, UserBook>>,
}

impl InMemoryFinanceStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_book<T>(&self, caller: &str, f: impl FnOnce(&mut UserBook) -> T) -> T {
        let mut books = self.books.lock().expect("store lock poisoned");
        f(books.entry(caller.to_string()).or_default())
    }

    pub fn insert_bill(&self, caller: &str, bill: Bill) {
        self.with_book(caller, |book| book.bills.push(bill));
    }

    pub fn insert_debt(&self, caller: &str, debt: Debt) {
        self.with_book(caller, |book| book.debts.push(debt));
    }

    pub fn insert_installment(&self, caller: &str, installment: Installment) {
        self.with_book(caller, |book| book.installments.push(installment));
    }

    /// Populate a caller with sample data for interactive demos.
    pub fn seed_demo(&self, caller: &str) {
        let today = Utc::now().date_naive();
        let (month, year) = (today.month(), today.year());

        self.insert_bill(
            caller,
            Bill {
                id: Uuid::new_v4(),
                name: "Energia elétrica".to_string(),
                amount: 180.0,
                due_day: 10,
                month,
                year,
                paid: false,
                paid_date: None,
            },
        );
        self.insert_bill(
            caller,
            Bill {
                id: Uuid::new_v4(),
                name: "Internet".to_string(),
                amount: 99.9,
                due_day: 15,
                month,
                year,
                paid: true,
                paid_date: today.with_day(5),
            },
        );
        self.insert_debt(
            caller,
            Debt {
                id: Uuid::new_v4(),
                name: "Financiamento do carro".to_string(),
                total_amount: 42000.0,
                paid_amount: 15750.0,
            },
        );
        self.insert_installment(
            caller,
            Installment {
                id: Uuid::new_v4(),
                description: "Notebook (6/10)".to_string(),
                amount: 350.0,
                due_date: today + chrono::Duration::days(20),
                number: 6,
                total: 10,
            },
        );
    }
}

#[async_trait]
impl FinanceStore for InMemoryFinanceStore {
    async fn expenses(
        &self,
        caller: &str,
        month: u32,
        year: i32,
    ) -> Result<Vec<Expense>, StoreError> {
        Ok(self.with_book(caller, |book| {
            book.expenses
                .iter()
                .filter(|e| e.date.month() == month && e.date.year() == year)
                .cloned()
                .collect()
        }))
    }

    async fn add_expense(&self, caller: &str, expense: NewExpense) -> Result<Expense, StoreError> {
        let expense = Expense {
            id: Uuid::new_v4(),
            name: expense.name,
            category: expense.category,
            budgeted_amount: expense.budgeted_amount,
            actual_amount: expense.actual_amount,
            date: expense.date,
            created_at: Utc::now(),
        };
        self.with_book(caller, |book| book.expenses.push(expense.clone()));
        Ok(expense)
    }

    async fn bills(&self, caller: &str, month: u32, year: i32) -> Result<Vec<Bill>, StoreError> {
        Ok(self.with_book(caller, |book| {
            book.bills
                .iter()
                .filter(|b| b.month == month && b.year == year)
                .cloned()
                .collect()
        }))
    }

    async fn mark_bill_paid(
        &self,
        caller: &str,
        bill_id: Uuid,
        paid_date: NaiveDate,
    ) -> Result<Bill, StoreError> {
        self.with_book(caller, |book| {
            let bill = book
                .bills
                .iter_mut()
                .find(|b| b.id == bill_id)
                .ok_or_else(|| StoreError::NotFound(format!("bill {}", bill_id)))?;
            if !bill.paid {
                bill.paid = true;
                bill.paid_date = Some(paid_date);
            }
            Ok(bill.clone())
        })
    }

    async fn debts(&self, caller: &str) -> Result<Vec<Debt>, StoreError> {
        Ok(self.with_book(caller, |book| book.debts.clone()))
    }

    async fn installments_until(
        &self,
        caller: &str,
        until: NaiveDate,
    ) -> Result<Vec<Installment>, StoreError> {
        Ok(self.with_book(caller, |book| {
            let mut due: Vec<_> = book
                .installments
                .iter()
                .filter(|i| i.due_date <= until)
                .cloned()
                .collect();
            due.sort_by_key(|i| i.due_date);
            due
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[tokio::test]
    async fn expenses_filter_by_month_and_caller() {
        let store = InMemoryFinanceStore::new();
        store
            .add_expense(
                "ana",
                NewExpense {
                    name: "Mercado".into(),
                    category: "alimentacao".into(),
                    budgeted_amount: 500.0,
                    actual_amount: Some(450.0),
                    date: date(2026, 8, 12),
                },
            )
            .await
            .unwrap();
        store
            .add_expense(
                "ana",
                NewExpense {
                    name: "Gasolina".into(),
                    category: "transporte".into(),
                    budgeted_amount: 200.0,
                    actual_amount: None,
                    date: date(2026, 7, 2),
                },
            )
            .await
            .unwrap();

        let august = store.expenses("ana", 8, 2026).await.unwrap();
        assert_eq!(august.len(), 1);
        assert_eq!(august[0].name, "Mercado");

        // A different caller sees nothing.
        assert!(store.expenses("bia", 8, 2026).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn marking_a_bill_paid_is_idempotent() {
        let store = InMemoryFinanceStore::new();
        let id = Uuid::new_v4();
        store.insert_bill(
            "ana",
            Bill {
                id,
                name: "Luz".into(),
                amount: 150.0,
                due_day: 10,
                month: 8,
                year: 2026,
                paid: false,
                paid_date: None,
            },
        );

        let first = store
            .mark_bill_paid("ana", id, date(2026, 8, 9))
            .await
            .unwrap();
        assert!(first.paid);
        assert_eq!(first.paid_date, Some(date(2026, 8, 9)));

        // Paying again keeps the original date.
        let second = store
            .mark_bill_paid("ana", id, date(2026, 8, 20))
            .await
            .unwrap();
        assert_eq!(second.paid_date, Some(date(2026, 8, 9)));
    }

    #[tokio::test]
    async fn unknown_bill_is_not_found() {
        let store = InMemoryFinanceStore::new();
        let err = store
            .mark_bill_paid("ana", Uuid::new_v4(), date(2026, 8, 9))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn installments_sort_by_due_date_within_window() {
        let store = InMemoryFinanceStore::new();
        for (desc, day) in [("b", 20), ("a", 5)] {
            store.insert_installment(
                "ana",
                Installment {
                    id: Uuid::new_v4(),
                    description: desc.into(),
                    amount: 100.0,
                    due_date: date(2026, 9, day),
                    number: 1,
                    total: 2,
                },
            );
        }
        let due = store
            .installments_until("ana", date(2026, 9, 30))
            .await
            .unwrap();
        assert_eq!(due[0].description, "a");
        assert_eq!(due[1].description, "b");
        assert!(
            store
                .installments_until("ana", date(2026, 9, 1))
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[test]
    fn debt_progress_percentage() {
        let debt = Debt {
            id: Uuid::new_v4(),
            name: "Carro".into(),
            total_amount: 1000.0,
            paid_amount: 250.0,
        };
        assert!((debt.percent_paid() - 25.0).abs() < f64::EPSILON);
    }
}
