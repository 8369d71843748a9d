//! Runtime configuration

use crate::RetryPolicy;
use agent_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Time budgets, retry policies and sampling defaults for collaborator calls
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Model sent with every completion request
    pub model: String,

    /// Default completion length
    pub max_tokens: usize,

    /// Sampling temperature, provider default when `None`
    pub temperature: Option<f32>,

    /// Budget for one completion attempt
    pub llm_timeout: Duration,

    /// Budget for one tool attempt
    pub tool_timeout: Duration,

    /// Budget for one memory-store read or write; never retried
    pub memory_timeout: Duration,

    /// Retries for idempotent tools after a timeout or transient failure
    pub tool_retry: RetryPolicy,

    /// Retries for completion calls
    pub completion_retry: RetryPolicy,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            model: "MiniMax-Text-01".to_string(),
            max_tokens: 1024,
            temperature: Some(0.3),
            llm_timeout: Duration::from_secs(30),
            tool_timeout: Duration::from_secs(10),
            memory_timeout: Duration::from_secs(5),
            tool_retry: RetryPolicy::linear(2, Duration::from_millis(500)),
            completion_retry: RetryPolicy::linear(1, Duration::from_secs(1)),
        }
    }
}

impl RuntimeConfig {
    /// Create a new configuration builder
    pub fn builder() -> RuntimeConfigBuilder {
        RuntimeConfigBuilder::default()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.model.trim().is_empty() {
            return Err(Error::InitializationFailed("model must not be empty".to_string()));
        }
        if self.max_tokens == 0 {
            return Err(Error::InitializationFailed(
                "max_tokens must be greater than 0".to_string(),
            ));
        }
        if self.llm_timeout.is_zero() || self.tool_timeout.is_zero() || self.memory_timeout.is_zero() {
            return Err(Error::InitializationFailed(
                "timeouts must be greater than 0".to_string(),
            ));
        }
        if let Some(t) = self.temperature {
            if !(0.0..=2.0).contains(&t) {
                return Err(Error::InitializationFailed(format!(
                    "temperature {t} is outside 0.0..=2.0"
                )));
            }
        }
        Ok(())
    }
}

/// Builder for RuntimeConfig
#[derive(Debug, Default)]
pub struct RuntimeConfigBuilder {
    model: Option<String>,
    max_tokens: Option<usize>,
    temperature: Option<Option<f32>>,
    llm_timeout: Option<Duration>,
    tool_timeout: Option<Duration>,
    memory_timeout: Option<Duration>,
    tool_retry: Option<RetryPolicy>,
    completion_retry: Option<RetryPolicy>,
}

impl RuntimeConfigBuilder {
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn llm_timeout(mut self, timeout: Duration) -> Self {
        self.llm_timeout = Some(timeout);
        self
    }

    pub fn tool_timeout(mut self, timeout: Duration) -> Self {
        self.tool_timeout = Some(timeout);
        self
    }

    pub fn memory_timeout(mut self, timeout: Duration) -> Self {
        self.memory_timeout = Some(timeout);
        self
    }

    pub fn tool_retry(mut self, policy: RetryPolicy) -> Self {
        self.tool_retry = Some(policy);
        self
    }

    pub fn completion_retry(mut self, policy: RetryPolicy) -> Self {
        self.completion_retry = Some(policy);
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<RuntimeConfig> {
        let defaults = RuntimeConfig::default();

        let config = RuntimeConfig {
            model: self.model.unwrap_or(defaults.model),
            max_tokens: self.max_tokens.unwrap_or(defaults.max_tokens),
            temperature: self.temperature.unwrap_or(defaults.temperature),
            llm_timeout: self.llm_timeout.unwrap_or(defaults.llm_timeout),
            tool_timeout: self.tool_timeout.unwrap_or(defaults.tool_timeout),
            memory_timeout: self.memory_timeout.unwrap_or(defaults.memory_timeout),
            tool_retry: self.tool_retry.unwrap_or(defaults.tool_retry),
            completion_retry: self.completion_retry.unwrap_or(defaults.completion_retry),
        };

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_budgets() {
        let config = RuntimeConfig::default();
        assert_eq!(config.llm_timeout, Duration::from_secs(30));
        assert_eq!(config.tool_timeout, Duration::from_secs(10));
        assert_eq!(config.memory_timeout, Duration::from_secs(5));
        assert_eq!(config.tool_retry.max_retries, 2);
        assert_eq!(config.completion_retry.max_retries, 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_overrides() {
        let config = RuntimeConfig::builder()
            .model("local-model")
            .tool_timeout(Duration::from_millis(50))
            .temperature(None)
            .build()
            .unwrap();
        assert_eq!(config.model, "local-model");
        assert_eq!(config.tool_timeout, Duration::from_millis(50));
        assert!(config.temperature.is_none());
        assert_eq!(config.max_tokens, 1024);
    }

    #[test]
    fn test_builder_rejects_zero_timeout() {
        let result = RuntimeConfig::builder().llm_timeout(Duration::ZERO).build();
        assert!(matches!(result, Err(Error::InitializationFailed(_))));
    }

    #[test]
    fn test_builder_rejects_zero_memory_timeout() {
        let result = RuntimeConfig::builder().memory_timeout(Duration::ZERO).build();
        assert!(matches!(result, Err(Error::InitializationFailed(_))));
    }

    #[test]
    fn test_builder_rejects_bad_temperature() {
        assert!(RuntimeConfig::builder().temperature(Some(3.5)).build().is_err());
    }
}
