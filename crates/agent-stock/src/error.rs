//! Error types for stock analysis operations

use agent_core::ToolError;
use thiserror::Error;

/// Stock analysis specific errors
#[derive(Debug, Error)]
pub enum StockError {
    /// Data not available for the requested stock
    #[error("Data not available for {code}: {reason}")]
    DataUnavailable { code: String, reason: String },

    /// Upstream data source hiccup; worth retrying
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// Not a six-digit A-share code
    #[error("Invalid stock code: {0}")]
    InvalidCode(String),

    /// Identical trade recorded moments ago
    #[error("Duplicate trade: {0}")]
    DuplicateTrade(String),

    /// Trade ledger could not be read or written
    #[error("Ledger error: {0}")]
    Ledger(String),

    /// Technical indicator calculation error
    #[error("Technical indicator error: {0}")]
    Indicator(String),

    /// Prompt template failed to render
    #[error("Template error: {0}")]
    Template(#[from] minijinja::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

/// Result type alias for stock operations
pub type Result<T> = std::result::Result<T, StockError>;

impl StockError {
    /// Map onto the tool failure taxonomy for the tool named `tool`
    pub fn into_tool_error(self, tool: &str) -> ToolError {
        match self {
            Self::Upstream(msg) => ToolError::transient(tool, msg),
            Self::InvalidCode(code) => ToolError::invalid_params(tool, format!("invalid stock code: {code}")),
            Self::DuplicateTrade(msg) => ToolError::rejected(tool, msg),
            other => ToolError::failed(tool, other.to_string()),
        }
    }
}

impl From<StockError> for agent_core::Error {
    fn from(err: StockError) -> Self {
        agent_core::Error::ProcessingFailed(err.to_string())
    }
}

impl From<agent_memory::MemoryError> for StockError {
    fn from(err: agent_memory::MemoryError) -> Self {
        StockError::Other(err.to_string())
    }
}
