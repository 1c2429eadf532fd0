//! Provider adapters and the factory that picks one from config

pub mod claude;
pub mod gemini;

use std::sync::Arc;

use centavo_application::ports::ProviderPort;

use crate::config::{ConfigError, ProviderKind, ProviderSettings};

pub use claude::ClaudeAdapter;
pub use gemini::GeminiAdapter;

/// Build the configured provider adapter.
pub fn build_provider(settings: &ProviderSettings) -> Result<Arc<dyn ProviderPort>, ConfigError> {
    let api_key = settings.resolve_api_key()?;
    Ok(match settings.kind {
        ProviderKind::Claude => {
            let mut adapter = ClaudeAdapter::new(api_key, settings.model.as_str());
            if let Some(base_url) = &settings.base_url {
                adapter = adapter.with_base_url(base_url);
            }
            Arc::new(adapter)
        }
        ProviderKind::Gemini => {
            let mut adapter = GeminiAdapter::new(api_key, settings.model.as_str());
            if let Some(base_url) = &settings.base_url {
                adapter = adapter.with_base_url(base_url);
            }
            Arc::new(adapter)
        }
    })
}
