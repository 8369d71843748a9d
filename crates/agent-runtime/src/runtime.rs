//! Shared collaborators for workflow runs
//!
//! Every suspension point of a run goes through `AgentRuntime`: completions,
//! tool calls and memory access. Timeouts are applied per attempt and count
//! as ordinary failures for the retry policy.

use crate::{RetryPolicy, RuntimeConfig};
use agent_core::{Error, Result, ToolError};
use agent_llm::{CompletionRequest, LLMError, LLMProvider, Message};
use agent_memory::{InMemoryMemoryStore, MemoryEntry, MemoryStore, StockNote};
use agent_tools::ToolRegistry;
use serde_json::Value;
use std::sync::Arc;
use tokio::time::timeout;
use tracing::{debug, instrument, warn};

/// Runtime holding the LLM provider, tool catalogue and memory store
///
/// # Example
///
/// ```no_run
/// use agent_runtime::{AgentRuntime, RuntimeConfig};
/// use agent_tools::ToolRegistry;
/// use std::sync::Arc;
///
/// # fn example(provider: Arc<dyn agent_llm::LLMProvider>) -> agent_core::Result<()> {
/// let runtime = AgentRuntime::builder()
///     .provider(provider)
///     .tool_registry(Arc::new(ToolRegistry::new()))
///     .config(RuntimeConfig::default())
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct AgentRuntime {
    provider: Arc<dyn LLMProvider>,
    tool_registry: Arc<ToolRegistry>,
    memory: Arc<dyn MemoryStore>,
    config: RuntimeConfig,
}

impl AgentRuntime {
    /// Create a new runtime builder
    pub fn builder() -> AgentRuntimeBuilder {
        AgentRuntimeBuilder::new()
    }

    /// Get a reference to the LLM provider
    pub fn provider(&self) -> &Arc<dyn LLMProvider> {
        &self.provider
    }

    /// Get a reference to the tool registry
    pub fn tools(&self) -> &Arc<ToolRegistry> {
        &self.tool_registry
    }

    /// Get a reference to the memory store
    ///
    /// Workflow stages go through the bounded helpers below instead.
    pub fn memory(&self) -> &Arc<dyn MemoryStore> {
        &self.memory
    }

    /// Get a reference to the runtime configuration
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// A request builder pre-filled with the configured model and sampling
    pub fn request(&self) -> agent_llm::completion::CompletionRequestBuilder {
        let builder = CompletionRequest::builder(&self.config.model).max_tokens(self.config.max_tokens);
        match self.config.temperature {
            Some(t) => builder.temperature(t),
            None => builder,
        }
    }

    /// Complete `messages` under a system prompt and return the reply text
    pub async fn complete(&self, system: &str, messages: &[Message]) -> Result<String> {
        let request = self.request().system(system).messages(messages.to_vec()).build();
        self.complete_request(request).await
    }

    /// Send a prepared request under the completion time budget and retry policy
    ///
    /// Exhausted retries surface as `Error::Timeout` when the last attempt
    /// timed out and `Error::Completion` otherwise.
    #[instrument(skip(self, request), fields(model = %request.model, provider = self.provider.name()))]
    pub async fn complete_request(&self, request: CompletionRequest) -> Result<String> {
        let budget = self.config.llm_timeout;
        let (result, attempts) = self
            .config
            .completion_retry
            .execute("completion", LLMError::is_retryable, || {
                let request = request.clone();
                async move {
                    match timeout(budget, self.provider.complete(request)).await {
                        Ok(response) => response,
                        Err(_) => Err(LLMError::Timeout),
                    }
                }
            })
            .await;

        match result {
            Ok(response) => {
                if response.is_truncated() {
                    warn!(stop_reason = ?response.stop_reason, "completion cut short");
                }
                debug!(attempts, tokens = response.usage.total(), "completion ok");
                Ok(response.message.content)
            }
            Err(LLMError::Timeout) => {
                warn!(attempts, "completion timed out");
                Err(Error::Timeout {
                    operation: "completion".to_string(),
                    after: budget,
                })
            }
            Err(e) => {
                warn!(attempts, error = %e, "completion failed");
                Err(Error::Completion(e.to_string()))
            }
        }
    }

    /// Call a registered tool under the tool time budget
    ///
    /// Idempotent tools are retried on timeouts and transient failures;
    /// other tools run at most once. The returned error records how many
    /// attempts were made.
    #[instrument(skip(self, params))]
    pub async fn call_tool(&self, name: &str, params: Value) -> std::result::Result<Value, ToolError> {
        let tool = self
            .tool_registry
            .get(name)
            .ok_or_else(|| ToolError::not_found(name))?;

        let policy = if tool.idempotent() {
            self.config.tool_retry
        } else {
            RetryPolicy::none()
        };
        let budget = self.config.tool_timeout;
        let registry = &self.tool_registry;

        let (result, attempts) = policy
            .execute(name, ToolError::is_retryable, || {
                let params = params.clone();
                async move {
                    match timeout(budget, registry.call(name, params)).await {
                        Ok(outcome) => outcome,
                        Err(_) => Err(ToolError::timeout(name, budget)),
                    }
                }
            })
            .await;

        result.map_err(|e| e.with_attempts(attempts))
    }

    /// Write a memory entry; a duplicate returns the existing id
    #[instrument(skip(self, entry))]
    pub async fn remember(&self, entry: MemoryEntry) -> Result<u64> {
        self.bounded_memory("memory write", self.memory.write(entry)).await
    }

    /// Append a note to one stock's context history
    #[instrument(skip(self, note), fields(stock = %note.stock_code))]
    pub async fn record_stock_context(&self, note: StockNote) -> Result<u64> {
        self.bounded_memory("stock context write", self.memory.record_stock_context(note))
            .await
    }

    /// Principles, patterns and the stock's history as one prompt fragment
    #[instrument(skip(self))]
    pub async fn memory_brief(&self, stock_code: Option<&str>, history_limit: usize) -> Result<String> {
        self.bounded_memory(
            "memory brief",
            agent_memory::build_brief(self.memory.as_ref(), stock_code, history_limit),
        )
        .await
    }

    /// One memory-store call under the memory time budget
    ///
    /// An expired budget is an `Error::Timeout`; store failures become
    /// `Error::ProcessingFailed`. Neither is retried.
    async fn bounded_memory<T>(
        &self,
        operation: &str,
        call: impl Future<Output = agent_memory::Result<T>>,
    ) -> Result<T> {
        let budget = self.config.memory_timeout;
        match timeout(budget, call).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(Error::ProcessingFailed(format!("{operation} failed: {e}"))),
            Err(_) => {
                warn!(operation, ?budget, "memory store did not answer");
                Err(Error::Timeout {
                    operation: operation.to_string(),
                    after: budget,
                })
            }
        }
    }
}

impl std::fmt::Debug for AgentRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentRuntime")
            .field("provider", &self.provider.name())
            .field("tools", &self.tool_registry)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Builder for AgentRuntime
#[derive(Default)]
pub struct AgentRuntimeBuilder {
    provider: Option<Arc<dyn LLMProvider>>,
    tool_registry: Option<Arc<ToolRegistry>>,
    memory: Option<Arc<dyn MemoryStore>>,
    config: RuntimeConfig,
}

impl AgentRuntimeBuilder {
    /// Create a new runtime builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the LLM provider
    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Set the tool registry
    pub fn tool_registry(mut self, registry: Arc<ToolRegistry>) -> Self {
        self.tool_registry = Some(registry);
        self
    }

    /// Set the memory store; an in-process store is used otherwise
    pub fn memory(mut self, memory: Arc<dyn MemoryStore>) -> Self {
        self.memory = Some(memory);
        self
    }

    /// Set the runtime configuration
    pub fn config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    /// Build the runtime
    ///
    /// # Errors
    ///
    /// Returns an error if the provider is not set or the config is invalid
    pub fn build(self) -> Result<AgentRuntime> {
        let provider = self
            .provider
            .ok_or_else(|| Error::InitializationFailed("Provider not set".to_string()))?;
        self.config.validate()?;

        Ok(AgentRuntime {
            provider,
            tool_registry: self.tool_registry.unwrap_or_default(),
            memory: self
                .memory
                .unwrap_or_else(|| Arc::new(InMemoryMemoryStore::new())),
            config: self.config,
        })
    }
}
