//! Process-wide configuration
//!
//! `Config` is built once at startup and handed to the components that need
//! it (LLM provider, stores, stock configuration). Nothing below `main` reads
//! the environment directly.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while assembling the configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A variable is present but cannot be parsed
    #[error("Invalid value for {key}: {reason}")]
    InvalidValue { key: String, reason: String },

    /// A required setting is missing
    #[error("Missing configuration: {0}")]
    Missing(String),
}

/// Output format of the tracing subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human readable lines
    #[default]
    Pretty,
    /// One JSON object per event
    Json,
}

/// Environment variable names
pub mod env_keys {
    pub const APP_ENV: &str = "MONEY_APP_ENV";
    pub const DATA_DIR: &str = "MONEY_DATA_DIR";
    pub const LLM_API_KEY: &str = "LLM_API_KEY";
    /// Fallback key name kept for existing deployments
    pub const MINIMAX_API_KEY: &str = "MINIMAX_API_KEY";
    pub const LLM_API_BASE: &str = "LLM_API_BASE";
    pub const LLM_MODEL: &str = "LLM_MODEL";
    pub const LOG_FILTER: &str = "RUST_LOG";
    pub const LOG_FORMAT: &str = "MONEY_LOG_FORMAT";
}

const DEFAULT_API_BASE: &str = "https://api.minimax.chat/v1";
const DEFAULT_MODEL: &str = "MiniMax-Text-01";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Application name
    pub app_name: String,
    /// Environment (dev, prod, etc.)
    pub environment: String,
    /// Directory holding the trade ledger and memory files
    pub data_dir: PathBuf,
    /// API key for the completion backend
    #[serde(skip_serializing)]
    pub llm_api_key: Option<String>,
    /// Base URL of the OpenAI-compatible completion endpoint
    pub llm_api_base: String,
    /// Model identifier sent with each completion request
    pub llm_model: String,
    /// `EnvFilter` directive used when `RUST_LOG` is absent
    pub log_filter: String,
    /// Tracing output format
    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            app_name: "money-agent".to_string(),
            environment: "development".to_string(),
            data_dir: PathBuf::from("data"),
            llm_api_key: None,
            llm_api_base: DEFAULT_API_BASE.to_string(),
            llm_model: DEFAULT_MODEL.to_string(),
            log_filter: "info".to_string(),
            log_format: LogFormat::Pretty,
        }
    }
}

impl Config {
    /// Build the configuration from process environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup
    ///
    /// Empty values are treated as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let log_format = match get(env_keys::LOG_FORMAT).as_deref() {
            None => defaults.log_format,
            Some("json") => LogFormat::Json,
            Some("pretty" | "text") => LogFormat::Pretty,
            Some(other) => {
                return Err(ConfigError::InvalidValue {
                    key: env_keys::LOG_FORMAT.to_string(),
                    reason: format!("expected 'json' or 'pretty', got '{other}'"),
                });
            }
        };

        Ok(Self {
            app_name: defaults.app_name,
            environment: get(env_keys::APP_ENV).unwrap_or(defaults.environment),
            data_dir: get(env_keys::DATA_DIR).map_or(defaults.data_dir, PathBuf::from),
            llm_api_key: get(env_keys::LLM_API_KEY).or_else(|| get(env_keys::MINIMAX_API_KEY)),
            llm_api_base: get(env_keys::LLM_API_BASE).unwrap_or(defaults.llm_api_base),
            llm_model: get(env_keys::LLM_MODEL).unwrap_or(defaults.llm_model),
            log_filter: get(env_keys::LOG_FILTER).unwrap_or(defaults.log_filter),
            log_format,
        })
    }

    /// API key, or an error naming the variables that can provide it
    pub fn require_api_key(&self) -> Result<&str, ConfigError> {
        self.llm_api_key.as_deref().ok_or_else(|| {
            ConfigError::Missing(format!(
                "set {} (or {}) to enable the completion backend",
                env_keys::LLM_API_KEY,
                env_keys::MINIMAX_API_KEY
            ))
        })
    }

    /// Path of the JSON trade ledger
    pub fn trades_file(&self) -> PathBuf {
        self.data_dir.join("trades.json")
    }

    /// Path of the JSON memory store
    pub fn memory_file(&self) -> PathBuf {
        self.data_dir.join("memory.json")
    }

    /// Path of the market snapshot served to the data tools
    pub fn market_file(&self) -> PathBuf {
        self.data_dir.join("market.json")
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}
