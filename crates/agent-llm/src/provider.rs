//! The seam between the runtime and a completion backend

use crate::{CompletionRequest, CompletionResponse, Result};
use async_trait::async_trait;

/// A completion backend shared by every concurrent run
///
/// Timeouts and retries are applied by the caller; an implementation makes
/// exactly one upstream attempt per `complete` call and reports transport
/// failures through [`LLMError`](crate::LLMError) so the caller can tell
/// retryable faults apart.
#[async_trait]
pub trait LLMProvider: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse>;

    /// Short name used in log fields
    fn name(&self) -> &str;
}
