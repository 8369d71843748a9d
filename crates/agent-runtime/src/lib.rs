//! Runtime for money-agent
//!
//! `AgentRuntime` owns the collaborators every workflow stage may call (the
//! LLM provider, the tool registry and the memory store) and wraps each call
//! in the configured time budget and retry policy. Runs share one runtime
//! behind an `Arc`; nothing in it is specific to a single run.

pub mod config;
pub mod retry;
pub mod runtime;

pub use config::{RuntimeConfig, RuntimeConfigBuilder};
pub use retry::RetryPolicy;
pub use runtime::{AgentRuntime, AgentRuntimeBuilder};
