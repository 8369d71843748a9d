//! Classifier: intent and entity of the latest user message

use agent_core::{ContextValue, Error, Result};
use agent_llm::Message;
use agent_runtime::AgentRuntime;
use agent_workflow::{Node, NodeId, State, Transition};
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::keys;
use crate::config::StockConfig;
use crate::prompts::Prompts;
use crate::router::{CLARIFY_PREFIX, Intent, IntentRouter, RouteSource, extract_code};
use crate::trade::TradeDraft;

pub struct ClassifierNode {
    runtime: Arc<AgentRuntime>,
    config: Arc<StockConfig>,
    prompts: Arc<Prompts>,
    router: IntentRouter,
}

impl ClassifierNode {
    pub fn new(runtime: Arc<AgentRuntime>, config: Arc<StockConfig>, prompts: Arc<Prompts>) -> Self {
        Self {
            runtime,
            config,
            prompts,
            router: IntentRouter::new(),
        }
    }

    /// Ask the LLM for one label; anything unusable is chat
    async fn ask_llm(&self, message: &str) -> std::result::Result<(Intent, RouteSource), Error> {
        if !self.config.llm_classification {
            return Ok((Intent::Chat, RouteSource::Default));
        }

        let system = self.prompts.classify_system()?;
        let user = self.prompts.classify_user(message)?;
        let reply = self.runtime.complete(&system, &[Message::user(user)]).await?;

        match reply.parse::<Intent>() {
            Ok(intent) => Ok((intent, RouteSource::Llm)),
            Err(e) => {
                debug!(error = %e, "unusable classification reply");
                Ok((Intent::Chat, RouteSource::Default))
            }
        }
    }
}

#[async_trait]
impl Node for ClassifierNode {
    fn id(&self) -> NodeId {
        NodeId::Classifier
    }

    async fn run(&self, state: &mut State) -> Result<Transition> {
        let message = state.user_message().trim().to_string();
        if message.is_empty() {
            return Err(Error::Classification("empty message".to_string()));
        }

        let routing = match self.router.route(&message, state.prior_messages()) {
            Some(routing) => routing,
            None => {
                let (intent, source) = match self.ask_llm(&message).await {
                    Ok(decided) => decided,
                    Err(e) => {
                        warn!(error = %e, "LLM classification failed, treating as chat");
                        state.record_issue(NodeId::Classifier, e);
                        (Intent::Chat, RouteSource::Default)
                    }
                };
                self.router
                    .resolve(intent, source, extract_code(&message), state.prior_messages())
            }
        };

        let mut task = routing.task();
        let context = state.context_mut();
        context.insert(keys::INTENT, ContextValue::Text(routing.intent.to_string()))?;
        context.insert(keys::ROUTE_SOURCE, ContextValue::Text(routing.source.as_str().to_string()))?;
        if let Some(code) = &routing.stock_code {
            context.insert(keys::ENTITY, ContextValue::Text(code.clone()))?;
        }

        if routing.intent == Intent::RecordTrade {
            let draft = TradeDraft::parse(&message, chrono::Local::now().date_naive());
            let missing = draft.missing();
            match draft.to_params() {
                Some(params) if missing.is_empty() => {
                    context.insert(keys::TRADE, ContextValue::Payload(params))?;
                }
                _ => {
                    context.insert(keys::MISSING, ContextValue::Payload(json!(missing)))?;
                    task = routing.intent.clarification_task();
                }
            }
        }

        info!(
            intent = %routing.intent,
            source = routing.source.as_str(),
            stock = routing.stock_code.as_deref().unwrap_or("-"),
            carried_over = routing.carried_over,
            "classified"
        );

        let clarify = task.starts_with(CLARIFY_PREFIX);
        state.set_task(task)?;
        Ok(if clarify {
            Transition::ShortCircuit
        } else {
            Transition::Continue
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeProvider, runtime_with};

    fn node(provider: Arc<FakeProvider>, llm_classification: bool) -> ClassifierNode {
        let config = StockConfig::builder().llm_classification(llm_classification).build().unwrap();
        ClassifierNode::new(
            runtime_with(provider),
            Arc::new(config),
            Arc::new(Prompts::new().unwrap()),
        )
    }

    #[tokio::test]
    async fn test_keyword_route_with_entity() {
        let node = node(FakeProvider::new(), true);
        let mut state = State::new(vec![], "分析一下600519");

        assert_eq!(node.run(&mut state).await.unwrap(), Transition::Continue);
        assert_eq!(state.task(), "analyze_stock");
        assert_eq!(state.context().text(keys::ENTITY), Some("600519"));
        assert_eq!(state.context().text(keys::ROUTE_SOURCE), Some("keyword"));
    }

    #[tokio::test]
    async fn test_missing_code_short_circuits() {
        let node = node(FakeProvider::new(), true);
        let mut state = State::new(vec![], "帮我分析一下");

        assert_eq!(node.run(&mut state).await.unwrap(), Transition::ShortCircuit);
        assert_eq!(state.task(), "clarify:analyze_stock");
        assert!(!state.context().contains_key(keys::ENTITY));
    }

    #[tokio::test]
    async fn test_code_carried_from_prior_turn() {
        let node = node(FakeProvider::new(), true);
        let prior = vec![Message::user("分析一下000001"), Message::assistant("...")];
        let mut state = State::new(prior, "再分析一下");

        node.run(&mut state).await.unwrap();
        assert_eq!(state.task(), "analyze_stock");
        assert_eq!(state.context().text(keys::ENTITY), Some("000001"));
    }

    #[tokio::test]
    async fn test_trade_parsed_into_params() {
        let node = node(FakeProvider::new(), true);
        let mut state = State::new(vec![], "买入 600519 100股 价格1700");

        assert_eq!(node.run(&mut state).await.unwrap(), Transition::Continue);
        let params = state.context().payload(keys::TRADE).unwrap();
        assert_eq!(params["direction"], "buy");
        assert_eq!(params["quantity"], 100);
    }

    #[tokio::test]
    async fn test_incomplete_trade_asks_for_fields() {
        let node = node(FakeProvider::new(), true);
        let mut state = State::new(vec![], "买入 600519");

        assert_eq!(node.run(&mut state).await.unwrap(), Transition::ShortCircuit);
        assert_eq!(state.task(), "clarify:record_trade");
        assert_eq!(
            state.context().payload(keys::MISSING).unwrap(),
            &json!(["quantity", "price"])
        );
    }

    #[tokio::test]
    async fn test_llm_fallback_label() {
        let provider = FakeProvider::new().classify_as("market_scan");
        let node = node(provider.clone(), true);
        let mut state = State::new(vec![], "最近有什么机会");

        node.run(&mut state).await.unwrap();
        assert_eq!(state.task(), "market_scan");
        assert_eq!(state.context().text(keys::ROUTE_SOURCE), Some("llm"));
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn test_llm_fallback_disabled_means_chat() {
        let provider = FakeProvider::new().classify_as("market_scan");
        let node = node(provider.clone(), false);
        let mut state = State::new(vec![], "最近有什么机会");

        node.run(&mut state).await.unwrap();
        assert_eq!(state.task(), "chat");
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn test_failed_llm_is_chat_with_issue() {
        let node = node(FakeProvider::new().failing(), true);
        let mut state = State::new(vec![], "最近有什么机会");

        node.run(&mut state).await.unwrap();
        assert_eq!(state.task(), "chat");
        assert_eq!(state.issues().len(), 1);
    }

    #[tokio::test]
    async fn test_empty_message_is_classification_error() {
        let node = node(FakeProvider::new(), true);
        let mut state = State::new(vec![], "   ");
        assert!(matches!(node.run(&mut state).await, Err(Error::Classification(_))));
    }
}
