//! Error types for memory stores

use thiserror::Error;

/// Result type for memory operations
pub type Result<T> = std::result::Result<T, MemoryError>;

#[derive(Error, Debug)]
pub enum MemoryError {
    /// Entry content was blank
    #[error("Memory content must not be empty")]
    EmptyContent,

    /// Unknown category name
    #[error("Unknown memory category '{0}' (expected principles, patterns or cases)")]
    InvalidCategory(String),

    /// Unknown provenance tag
    #[error("Unknown memory source '{0}' (expected llm_analysis, user_input or system)")]
    InvalidProvenance(String),

    /// Reading or writing the backing file failed
    #[error("Memory store I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The backing file holds malformed JSON
    #[error("Memory store serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
