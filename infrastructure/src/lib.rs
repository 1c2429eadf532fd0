//! Infrastructure layer for centavo
//!
//! Adapters behind the application ports: the Claude and Gemini
//! provider adapters, the finance store with its tool handlers, and
//! configuration loading.

pub mod config;
pub mod providers;
pub mod tools;

// Re-export commonly used types
pub use config::{AppConfig, ConfigError, ConfigLoader, ProviderKind, ProviderSettings};
pub use providers::{ClaudeAdapter, GeminiAdapter, build_provider};
pub use tools::{FinanceStore, InMemoryFinanceStore, finance_catalog, finance_executor};
