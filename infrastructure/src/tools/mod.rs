//! Finance tool implementations behind the application ports

pub mod finance;
pub mod store;

pub use finance::{CATEGORIES, finance_catalog, finance_executor};
pub use store::{
    Bill, Debt, Expense, FinanceStore, InMemoryFinanceStore, Installment, NewExpense, StoreError,
};
