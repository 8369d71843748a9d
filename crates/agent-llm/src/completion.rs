//! What goes to a provider and what comes back

use crate::Message;
use serde::{Deserialize, Serialize};

/// Token ceiling used when the caller does not set one
pub const DEFAULT_MAX_TOKENS: usize = 1024;

/// One completion call: a system prompt plus the conversation turns
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<Message>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    pub max_tokens: usize,
    /// Sampling temperature; the provider default applies when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

impl CompletionRequest {
    pub fn builder(model: impl Into<String>) -> CompletionRequestBuilder {
        CompletionRequestBuilder {
            request: Self {
                model: model.into(),
                messages: Vec::new(),
                system: None,
                max_tokens: DEFAULT_MAX_TOKENS,
                temperature: None,
            },
        }
    }
}

/// Fluent construction of a [`CompletionRequest`]
#[derive(Debug, Clone)]
pub struct CompletionRequestBuilder {
    request: CompletionRequest,
}

impl CompletionRequestBuilder {
    /// Replace the conversation turns
    pub fn messages(mut self, messages: Vec<Message>) -> Self {
        self.request.messages = messages;
        self
    }

    pub fn add_message(mut self, message: Message) -> Self {
        self.request.messages.push(message);
        self
    }

    /// Blank prompts are dropped rather than sent as an empty system turn
    pub fn system(mut self, system: impl Into<String>) -> Self {
        let system = system.into();
        self.request.system = (!system.trim().is_empty()).then_some(system);
        self
    }

    pub fn max_tokens(mut self, max_tokens: usize) -> Self {
        self.request.max_tokens = max_tokens;
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.request.temperature = Some(temperature);
        self
    }

    pub fn build(self) -> CompletionRequest {
        self.request
    }
}

/// The assistant turn a provider produced
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionResponse {
    pub message: Message,
    pub stop_reason: StopReason,
    pub usage: TokenUsage,
}

impl CompletionResponse {
    pub fn text(&self) -> &str {
        self.message.text()
    }

    /// Generation stopped before the model finished its turn
    pub fn is_truncated(&self) -> bool {
        matches!(self.stop_reason, StopReason::MaxTokens | StopReason::ContentFilter)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    EndTurn,
    /// Hit `max_tokens`
    MaxTokens,
    /// Cut short by the upstream content filter
    ContentFilter,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: usize,
    pub output_tokens: usize,
}

impl TokenUsage {
    pub fn total(&self) -> usize {
        self.input_tokens + self.output_tokens
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_defaults_and_overrides() {
        let request = CompletionRequest::builder("MiniMax-Text-01")
            .system("你是一个A股投资助手")
            .add_message(Message::user("分析一下600519"))
            .temperature(0.3)
            .build();

        assert_eq!(request.model, "MiniMax-Text-01");
        assert_eq!(request.max_tokens, DEFAULT_MAX_TOKENS);
        assert_eq!(request.temperature, Some(0.3));
        assert_eq!(request.system.as_deref(), Some("你是一个A股投资助手"));
    }

    #[test]
    fn blank_system_prompt_is_dropped() {
        let request = CompletionRequest::builder("m").system("  ").build();
        assert!(request.system.is_none());
    }

    #[test]
    fn truncation_follows_stop_reason() {
        let response = |stop_reason| CompletionResponse {
            message: Message::assistant("…"),
            stop_reason,
            usage: TokenUsage {
                input_tokens: 120,
                output_tokens: 30,
            },
        };
        assert!(!response(StopReason::EndTurn).is_truncated());
        assert!(response(StopReason::MaxTokens).is_truncated());
        assert_eq!(response(StopReason::EndTurn).usage.total(), 150);
    }
}
