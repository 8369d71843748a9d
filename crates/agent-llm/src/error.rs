//! Provider failures and how the runtime should treat them

use thiserror::Error;

pub type Result<T> = std::result::Result<T, LLMError>;

#[derive(Error, Debug)]
pub enum LLMError {
    /// The backend answered with a server-side failure (5xx and friends)
    #[error("completion request failed: {0}")]
    RequestFailed(String),

    #[error("LLM backend rejected the API key")]
    AuthenticationFailed,

    #[error("LLM backend is throttling: {0}")]
    RateLimitExceeded(String),

    /// The request itself is wrong; resending it cannot help
    #[error("LLM backend refused the request: {0}")]
    InvalidRequest(String),

    #[error("LLM backend did not answer in time")]
    Timeout,

    /// Connection-level failure before any status was received
    #[error("transport error: {0}")]
    Transport(reqwest::Error),

    #[error("unexpected completion payload: {0}")]
    UnexpectedResponse(String),

    #[error("LLM provider misconfigured: {0}")]
    ConfigurationError(String),
}

impl From<reqwest::Error> for LLMError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else {
            Self::Transport(err)
        }
    }
}

impl LLMError {
    /// Failures a second attempt may fix
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Timeout | Self::RateLimitExceeded(_) | Self::RequestFailed(_) | Self::Transport(_)
        )
    }
}
