//! LLM completion backend abstraction for money-agent
//!
//! Workflow stages never talk to an HTTP API directly. They build a
//! `CompletionRequest` and hand it to whatever `LLMProvider` the runtime was
//! constructed with: the OpenAI-compatible client in `providers` in
//! production, a scripted fake in tests.

pub mod completion;
pub mod error;
pub mod messages;
pub mod provider;
pub mod providers;

pub use completion::{CompletionRequest, CompletionResponse, StopReason, TokenUsage};
pub use error::{LLMError, Result};
pub use messages::{Message, Role};
pub use provider::LLMProvider;
