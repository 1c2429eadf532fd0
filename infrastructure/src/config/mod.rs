//! Configuration loading with multi-source merging
//!
//! Priority (highest to lowest): `CENTAVO_*` environment variables,
//! explicit `--config` path, project `./centavo.toml`, global
//! `~/.config/centavo/config.toml`, built-in defaults.

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] Box<figment::Error>),

    #[error("unknown provider kind: {0} (expected \"claude\" or \"gemini\")")]
    UnknownProvider(String),

    #[error("no API key configured: set provider.api_key or the {0} environment variable")]
    MissingApiKey(&'static str),
}

/// Which model backend to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Claude,
    Gemini,
}

impl ProviderKind {
    /// Environment variable holding this provider's API key.
    pub fn api_key_env(&self) -> &'static str {
        match self {
            ProviderKind::Claude => "ANTHROPIC_API_KEY",
            ProviderKind::Gemini => "GEMINI_API_KEY",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderSettings {
    pub kind: ProviderKind,
    pub model: String,
    /// Falls back to the provider's environment variable when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            kind: ProviderKind::Claude,
            model: "claude-sonnet-4-5".to_string(),
            api_key: None,
            base_url: None,
        }
    }
}

impl ProviderSettings {
    /// Explicit key, or the provider's environment variable.
    pub fn resolve_api_key(&self) -> Result<String, ConfigError> {
        if let Some(key) = &self.api_key
            && !key.is_empty()
        {
            return Ok(key.clone());
        }
        std::env::var(self.kind.api_key_env())
            .map_err(|_| ConfigError::MissingApiKey(self.kind.api_key_env()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSettings {
    /// Cap on provider calls per run
    pub max_iterations: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            max_iterations: 10,
            temperature: None,
            max_tokens: Some(4096),
            system_prompt: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfirmationSettings {
    /// Seconds before an unanswered confirmation expires
    pub ttl_seconds: u64,
}

impl Default for ConfirmationSettings {
    fn default() -> Self {
        // Mirrors the 5 minute window users expect from the chat UI.
        Self { ttl_seconds: 300 }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RetrySettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_attempts: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub provider: ProviderSettings,
    #[serde(default)]
    pub run: RunSettings,
    #[serde(default)]
    pub confirmation: ConfirmationSettings,
    #[serde(default)]
    pub retry: RetrySettings,
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn load(config_path: Option<&PathBuf>) -> Result<AppConfig, ConfigError> {
        let mut figment = Figment::new().merge(Serialized::defaults(AppConfig::default()));

        if let Some(global) = Self::global_config_path()
            && global.exists()
        {
            figment = figment.merge(Toml::file(&global));
        }

        let project = PathBuf::from("centavo.toml");
        if project.exists() {
            figment = figment.merge(Toml::file(&project));
        }

        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        // CENTAVO_PROVIDER__MODEL=... style overrides win over files.
        figment = figment.merge(Env::prefixed("CENTAVO_").split("__"));

        figment.extract().map_err(|e| ConfigError::Load(Box::new(e)))
    }

    pub fn load_defaults() -> AppConfig {
        AppConfig::default()
    }

    pub fn global_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("centavo").join("config.toml"))
    }
}
