//! Error types for agent-core

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for agent-core
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for workflow operations
///
/// The first five variants are the run-level taxonomy: how the executor
/// reacts to each of them is decided by the stage that raised it.
#[derive(Error, Debug, Clone)]
pub enum Error {
    /// The request could not be mapped to an intent or its entity
    #[error("Classification failed: {0}")]
    Classification(String),

    /// No usable plan could be produced for a data-requiring intent
    #[error("Planning failed: {0}")]
    Planning(String),

    /// A tool invocation failed
    #[error(transparent)]
    Tool(#[from] ToolError),

    /// The completion backend failed after its retry budget
    #[error("Completion failed: {0}")]
    Completion(String),

    /// A collaborator call exceeded its time budget
    #[error("{operation} timed out after {after:?}")]
    Timeout { operation: String, after: Duration },

    /// A namespaced context key was written twice
    #[error("Context key already written: {0}")]
    ContextConflict(String),

    /// A context value does not match the shape registered for its key
    #[error("Context key {key} expects {expected}, got {found}")]
    ContextSchema {
        key: String,
        expected: String,
        found: String,
    },

    /// A context key is not of the form `<namespace>.<name>`
    #[error("Invalid context key: {0}")]
    InvalidContextKey(String),

    /// The run result was already set
    #[error("Run result already set")]
    ResultAlreadySet,

    /// The run was cancelled between stages
    #[error("Run cancelled")]
    Cancelled,

    /// Component initialization failed
    #[error("Initialization failed: {0}")]
    InitializationFailed(String),

    /// Generic processing failure
    #[error("Processing failed: {0}")]
    ProcessingFailed(String),
}

impl Error {
    /// Whether the run can carry on past this error with a degraded result
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            Self::Classification(_) | Self::InitializationFailed(_) | Self::Cancelled
        )
    }
}

/// Category of a tool failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolErrorKind {
    /// No tool with that name is registered
    NotFound,
    /// Parameters do not satisfy the tool's input schema
    InvalidParams,
    /// The call exceeded the tool time budget
    Timeout,
    /// Network or upstream hiccup, worth retrying
    Transient,
    /// The tool refused the request by policy (e.g. duplicate trade)
    Rejected,
    /// Any other failure
    Failed,
}

impl ToolErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::InvalidParams => "invalid_params",
            Self::Timeout => "timeout",
            Self::Transient => "transient",
            Self::Rejected => "rejected",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for ToolErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure of a single tool invocation
///
/// Serializable so the data fetcher can record it in the run context in place
/// of the payload it could not obtain.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("Tool {tool} failed ({kind}): {message}")]
pub struct ToolError {
    /// Name of the tool that failed
    pub tool: String,
    /// Failure category
    pub kind: ToolErrorKind,
    /// Human readable detail
    pub message: String,
    /// Number of attempts made before giving up
    pub attempts: u32,
}

impl ToolError {
    /// Create a tool error after a single attempt
    pub fn new(tool: impl Into<String>, kind: ToolErrorKind, message: impl Into<String>) -> Self {
        Self {
            tool: tool.into(),
            kind,
            message: message.into(),
            attempts: 1,
        }
    }

    pub fn not_found(tool: impl Into<String>) -> Self {
        let tool = tool.into();
        let message = format!("no tool named '{tool}' is registered");
        Self::new(tool, ToolErrorKind::NotFound, message)
    }

    pub fn invalid_params(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(tool, ToolErrorKind::InvalidParams, message)
    }

    pub fn timeout(tool: impl Into<String>, after: Duration) -> Self {
        Self::new(tool, ToolErrorKind::Timeout, format!("no response within {after:?}"))
    }

    pub fn transient(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(tool, ToolErrorKind::Transient, message)
    }

    pub fn rejected(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(tool, ToolErrorKind::Rejected, message)
    }

    pub fn failed(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(tool, ToolErrorKind::Failed, message)
    }

    /// Record the number of attempts made
    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }

    /// Timeouts and transient failures may succeed on a later attempt
    pub fn is_retryable(&self) -> bool {
        matches!(self.kind, ToolErrorKind::Timeout | ToolErrorKind::Transient)
    }
}
