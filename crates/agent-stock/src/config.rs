//! Configuration for stock analysis runs

use crate::error::{Result, StockError};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for stock analysis runs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockConfig {
    /// Number of daily bars fetched for technical analysis
    pub kline_days: usize,

    /// Identical trades recorded within this window are rejected
    pub duplicate_trade_window: Duration,

    /// Cache TTL for real-time data (quotes)
    pub cache_ttl_realtime: Duration,

    /// Cache TTL for reference data (stock info, daily bars)
    pub cache_ttl_reference: Duration,

    /// Entries per section in the memory brief
    pub memory_history_limit: usize,

    /// Ask the LLM for a label when no keyword rule matches
    pub llm_classification: bool,
}

impl Default for StockConfig {
    fn default() -> Self {
        Self {
            kline_days: 30,
            duplicate_trade_window: Duration::from_secs(60),
            cache_ttl_realtime: Duration::from_secs(30),
            cache_ttl_reference: Duration::from_secs(300),
            memory_history_limit: 5,
            llm_classification: true,
        }
    }
}

impl StockConfig {
    /// Create a new configuration builder
    pub fn builder() -> StockConfigBuilder {
        StockConfigBuilder::default()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.kline_days == 0 || self.kline_days > 250 {
            return Err(StockError::Config(
                "kline_days must be between 1 and 250".to_string(),
            ));
        }

        if self.cache_ttl_realtime.is_zero() || self.cache_ttl_reference.is_zero() {
            return Err(StockError::Config("cache TTLs must be non-zero".to_string()));
        }

        if self.memory_history_limit == 0 {
            return Err(StockError::Config(
                "memory_history_limit must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

/// Builder for StockConfig
#[derive(Debug, Default)]
pub struct StockConfigBuilder {
    kline_days: Option<usize>,
    duplicate_trade_window: Option<Duration>,
    cache_ttl_realtime: Option<Duration>,
    cache_ttl_reference: Option<Duration>,
    memory_history_limit: Option<usize>,
    llm_classification: Option<bool>,
}

impl StockConfigBuilder {
    pub fn kline_days(mut self, days: usize) -> Self {
        self.kline_days = Some(days);
        self
    }

    /// A zero window disables duplicate detection
    pub fn duplicate_trade_window(mut self, window: Duration) -> Self {
        self.duplicate_trade_window = Some(window);
        self
    }

    pub fn cache_ttl_realtime(mut self, ttl: Duration) -> Self {
        self.cache_ttl_realtime = Some(ttl);
        self
    }

    pub fn cache_ttl_reference(mut self, ttl: Duration) -> Self {
        self.cache_ttl_reference = Some(ttl);
        self
    }

    pub fn memory_history_limit(mut self, limit: usize) -> Self {
        self.memory_history_limit = Some(limit);
        self
    }

    pub fn llm_classification(mut self, enabled: bool) -> Self {
        self.llm_classification = Some(enabled);
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<StockConfig> {
        let defaults = StockConfig::default();

        let config = StockConfig {
            kline_days: self.kline_days.unwrap_or(defaults.kline_days),
            duplicate_trade_window: self
                .duplicate_trade_window
                .unwrap_or(defaults.duplicate_trade_window),
            cache_ttl_realtime: self.cache_ttl_realtime.unwrap_or(defaults.cache_ttl_realtime),
            cache_ttl_reference: self.cache_ttl_reference.unwrap_or(defaults.cache_ttl_reference),
            memory_history_limit: self
                .memory_history_limit
                .unwrap_or(defaults.memory_history_limit),
            llm_classification: self.llm_classification.unwrap_or(defaults.llm_classification),
        };

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = StockConfig::default();
        assert_eq!(config.kline_days, 30);
        assert_eq!(config.duplicate_trade_window, Duration::from_secs(60));
        assert!(config.llm_classification);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_overrides() {
        let config = StockConfig::builder()
            .kline_days(60)
            .llm_classification(false)
            .build()
            .unwrap();
        assert_eq!(config.kline_days, 60);
        assert!(!config.llm_classification);
        assert_eq!(config.memory_history_limit, 5);
    }

    #[test]
    fn test_validation() {
        assert!(StockConfig::builder().kline_days(0).build().is_err());
        assert!(StockConfig::builder().memory_history_limit(0).build().is_err());
        assert!(StockConfig::builder().cache_ttl_realtime(Duration::ZERO).build().is_err());
        assert!(
            StockConfig::builder()
                .duplicate_trade_window(Duration::ZERO)
                .build()
                .is_ok()
        );
    }
}
