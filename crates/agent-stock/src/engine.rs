//! Stock agent: wires the six stages into a workflow and runs requests
//!
//! One [`StockAgent`] is shared by all conversations. Each call to
//! [`StockAgent::run`] builds its own state, so concurrent runs only meet in
//! the runtime's collaborators (ledger, memory, caches).

use agent_core::{Context, Error, Result};
use agent_llm::{LLMProvider, Message};
use agent_memory::MemoryStore;
use agent_runtime::{AgentRuntime, RuntimeConfig};
use agent_workflow::{CancellationToken, Node, NodeId, State, TransitionTable, Workflow};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::config::StockConfig;
use crate::ledger::{InMemoryTradeLedger, TradeLedger};
use crate::market::MarketData;
use crate::nodes::{
    AnalyzerNode, ClassifierNode, DataFetcherNode, PlannerNode, ReporterNode, ResponderNode,
};
use crate::prompts::Prompts;
use crate::report::Report;
use crate::tools::catalogue;

/// Reply used when the responder itself produced nothing
const FALLBACK_REPLY: &str = "抱歉，暂时无法处理这个请求，请稍后再试。";

/// Everything a caller gets back from one run
#[derive(Debug, Clone, Serialize)]
pub struct RunOutput {
    pub run_id: Uuid,
    pub final_message: String,
    pub result: Option<Report>,
    /// The full conversation including this turn's reply
    pub messages: Vec<Message>,
    /// `node: error` lines for every problem recorded during the run
    pub issues: Vec<String>,
    pub trace: Vec<NodeId>,
    pub cancelled: bool,
    pub degraded: bool,
    /// Everything the stages wrote, keyed `<stage>.<name>`
    #[serde(skip)]
    pub context: Context,
}

impl RunOutput {
    fn from_state(state: &State) -> Self {
        let result: Option<Report> = state
            .result()
            .and_then(|value| serde_json::from_value(value.clone()).ok());
        let degraded = result.as_ref().is_some_and(|r| r.degraded) || !state.issues().is_empty();

        Self {
            run_id: state.run_id(),
            final_message: state.final_message().unwrap_or_default().to_string(),
            result,
            messages: state.messages().to_vec(),
            issues: state
                .issues()
                .iter()
                .map(|issue| format!("{}: {}", issue.node, issue.error))
                .collect(),
            trace: state.trace().to_vec(),
            cancelled: state.is_cancelled(),
            degraded,
            context: state.context().clone(),
        }
    }
}

pub struct StockAgent {
    workflow: Workflow,
    runtime: Arc<AgentRuntime>,
    config: Arc<StockConfig>,
}

impl StockAgent {
    /// Build the workflow over a runtime that already carries the stock tools
    ///
    /// # Errors
    ///
    /// Returns an error if the config is invalid or a prompt template fails to compile
    pub fn new(runtime: Arc<AgentRuntime>, config: StockConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|e| Error::InitializationFailed(e.to_string()))?;
        let config = Arc::new(config);
        let prompts = Arc::new(Prompts::new().map_err(|e| Error::InitializationFailed(e.to_string()))?);

        let nodes: Vec<Arc<dyn Node>> = vec![
            Arc::new(ClassifierNode::new(runtime.clone(), config.clone(), prompts.clone())),
            Arc::new(PlannerNode::new(config.clone())),
            Arc::new(DataFetcherNode::new(runtime.clone())),
            Arc::new(AnalyzerNode::new(runtime.clone(), config.clone(), prompts.clone())),
            Arc::new(ReporterNode::new(runtime.clone())),
            Arc::new(ResponderNode::new(runtime.clone(), prompts)),
        ];
        let workflow = nodes
            .into_iter()
            .fold(Workflow::builder(), |builder, node| builder.add_node(node))
            .transitions(TransitionTable::standard())
            .fallback_message(FALLBACK_REPLY)
            .build()?;

        Ok(Self {
            workflow,
            runtime,
            config,
        })
    }

    pub fn builder() -> StockAgentBuilder {
        StockAgentBuilder::default()
    }

    pub fn runtime(&self) -> &Arc<AgentRuntime> {
        &self.runtime
    }

    pub fn config(&self) -> &StockConfig {
        &self.config
    }

    /// Answer `message` given the earlier turns of its conversation
    pub async fn run(&self, message: &str, history: &[Message]) -> RunOutput {
        self.run_with_cancel(message, history, &CancellationToken::new()).await
    }

    #[instrument(skip(self, history, cancel), fields(history = history.len()))]
    pub async fn run_with_cancel(
        &self,
        message: &str,
        history: &[Message],
        cancel: &CancellationToken,
    ) -> RunOutput {
        let state = State::new(history.to_vec(), message);
        let state = self.workflow.run_with_cancel(state, cancel).await;
        let output = RunOutput::from_state(&state);

        info!(
            run_id = %output.run_id,
            stages = output.trace.len(),
            issues = output.issues.len(),
            degraded = output.degraded,
            cancelled = output.cancelled,
            "run finished"
        );
        output
    }
}

/// Builds a [`StockAgent`] together with its runtime and tool catalogue
#[derive(Default)]
pub struct StockAgentBuilder {
    provider: Option<Arc<dyn LLMProvider>>,
    market: Option<Arc<dyn MarketData>>,
    ledger: Option<Arc<dyn TradeLedger>>,
    memory: Option<Arc<dyn MemoryStore>>,
    runtime_config: Option<RuntimeConfig>,
    stock_config: Option<StockConfig>,
}

impl StockAgentBuilder {
    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn market(mut self, market: Arc<dyn MarketData>) -> Self {
        self.market = Some(market);
        self
    }

    /// Trade ledger; an in-process one is used otherwise
    pub fn ledger(mut self, ledger: Arc<dyn TradeLedger>) -> Self {
        self.ledger = Some(ledger);
        self
    }

    pub fn memory(mut self, memory: Arc<dyn MemoryStore>) -> Self {
        self.memory = Some(memory);
        self
    }

    pub fn runtime_config(mut self, config: RuntimeConfig) -> Self {
        self.runtime_config = Some(config);
        self
    }

    pub fn stock_config(mut self, config: StockConfig) -> Self {
        self.stock_config = Some(config);
        self
    }

    /// # Errors
    ///
    /// Returns an error if the provider or market data source is missing,
    /// or if either configuration is invalid
    pub fn build(self) -> Result<StockAgent> {
        let provider = self
            .provider
            .ok_or_else(|| Error::InitializationFailed("Provider not set".to_string()))?;
        let market = self
            .market
            .ok_or_else(|| Error::InitializationFailed("Market data source not set".to_string()))?;
        let config = self.stock_config.unwrap_or_default();
        let ledger = self
            .ledger
            .unwrap_or_else(|| Arc::new(InMemoryTradeLedger::new(config.duplicate_trade_window)));

        let mut runtime = AgentRuntime::builder()
            .provider(provider)
            .tool_registry(Arc::new(catalogue(market, ledger, &config)))
            .config(self.runtime_config.unwrap_or_default());
        if let Some(memory) = self.memory {
            runtime = runtime.memory(memory);
        }

        StockAgent::new(Arc::new(runtime.build()?), config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::{fetched, keys};
    use crate::report::SectionKind;
    use crate::testing::{
        CHAT_REPLY, COMMENTARY_REPLY, FakeProvider, FixtureMarket, StalledMemory, fast_config,
    };
    use crate::tools::names;
    use agent_memory::InMemoryMemoryStore;
    use std::time::Duration;

    fn agent_with(provider: Arc<FakeProvider>, market: FixtureMarket) -> StockAgent {
        StockAgent::builder()
            .provider(provider)
            .market(Arc::new(market))
            .runtime_config(fast_config())
            .build()
            .unwrap()
    }

    fn agent() -> StockAgent {
        agent_with(FakeProvider::new(), FixtureMarket::new())
    }

    #[tokio::test]
    async fn test_analysis_runs_all_stages() {
        let out = agent().run("分析一下600519", &[]).await;

        assert_eq!(
            out.trace,
            [
                NodeId::Classifier,
                NodeId::Planner,
                NodeId::DataFetcher,
                NodeId::Analyzer,
                NodeId::Reporter,
                NodeId::Responder
            ]
        );
        assert!(out.final_message.contains("600519"));
        assert!(out.final_message.contains(COMMENTARY_REPLY));
        assert!(!out.degraded, "issues: {:?}", out.issues);

        let report = out.result.unwrap();
        let order = report.section_order();
        assert_eq!(order.first(), Some(&SectionKind::Overview));
        assert_eq!(order.last(), Some(&SectionKind::Recommendation));
        assert!(order.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(out.messages.len(), 2);

        for tool in [names::GET_STOCK_INFO, names::GET_KLINE, names::GET_SECTOR_FLOW] {
            assert!(out.context.payload(&fetched(tool)).is_some(), "{tool} not fetched");
        }
        assert!(out.context.finding(keys::SUMMARY).is_some_and(|f| f.is_complete()));
        assert_eq!(out.context.text(keys::RESPONSE), Some(out.final_message.as_str()));
    }

    #[tokio::test]
    async fn test_greeting_skips_data_stages() {
        let out = agent().run("你好", &[]).await;
        assert_eq!(out.trace, [NodeId::Classifier, NodeId::Planner, NodeId::Responder]);
        assert_eq!(out.final_message, CHAT_REPLY);
        assert!(out.result.is_none());
    }

    #[tokio::test]
    async fn test_kline_timeout_degrades_report() {
        let agent = agent_with(
            FakeProvider::new(),
            FixtureMarket::new().slow_kline(Duration::from_millis(400)),
        );
        let out = agent.run("分析一下600519", &[]).await;

        let report = out.result.unwrap();
        assert!(report.degraded);
        assert!(out.degraded);
        assert!(report.caveats.iter().any(|c| c.contains("K线数据") && c.contains("timeout")));
        assert_eq!(report.recommendation.as_deref(), Some("数据不足，暂不给出操作建议"));
        assert!(out.final_message.contains("⚠️"));
    }

    #[tokio::test]
    async fn test_market_scan_without_sector_flow() {
        let agent = agent_with(FakeProvider::new(), FixtureMarket::new().fail_sectors());
        let out = agent.run("看看市场热点", &[]).await;

        let report = out.result.unwrap();
        assert!(report.degraded);
        assert!(report.caveats.iter().any(|c| c.starts_with("无法获取板块资金流数据（transient）")));
        assert!(report.caveats.iter().any(|c| c.contains("无法生成市场概览")));
        assert_eq!(out.trace.last(), Some(&NodeId::Responder));
    }

    #[tokio::test]
    async fn test_missing_code_asks_for_one() {
        let out = agent().run("帮我分析一下", &[]).await;
        assert_eq!(out.trace, [NodeId::Classifier, NodeId::Responder]);
        assert!(out.final_message.contains("股票代码"));
        assert!(out.result.is_none());
    }

    #[tokio::test]
    async fn test_duplicate_trade_rejected() {
        let agent = agent();
        let first = agent.run("买入 600519 100股 价格1700", &[]).await;
        assert!(first.final_message.contains("已保存交易记录"));

        let second = agent.run("买入 600519 100股 价格1700", &[]).await;
        let report = second.result.unwrap();
        assert!(report.caveats.iter().any(|c| c.starts_with("交易未保存")));
        assert_eq!(report.section(SectionKind::Overview)[0], "本次交易未保存");
    }

    #[tokio::test]
    async fn test_concurrent_runs_are_isolated() {
        let agent = agent();
        let messages = ["分析一下600519", "分析一下000001", "看看市场热点"];
        let outs = futures::future::join_all(messages.iter().map(|m| agent.run(m, &[]))).await;

        assert_eq!(outs[0].result.as_ref().unwrap().stock_code.as_deref(), Some("600519"));
        assert_eq!(outs[1].result.as_ref().unwrap().stock_code.as_deref(), Some("000001"));
        assert_eq!(outs[2].result.as_ref().unwrap().title, "市场热点");
        assert_ne!(outs[0].run_id, outs[1].run_id);
    }

    #[tokio::test]
    async fn test_cancelled_before_start_still_classifies() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let out = agent().run_with_cancel("分析一下600519", &[], &cancel).await;

        assert!(out.cancelled);
        assert_eq!(out.trace, [NodeId::Classifier, NodeId::Responder]);
        assert_eq!(out.context.text(keys::ENTITY), Some("600519"));
        assert!(out.final_message.contains("已取消"));
        assert!(out.result.is_none());
    }

    #[tokio::test]
    async fn test_code_carried_into_follow_up() {
        let agent = agent();
        let first = agent.run("分析一下000001", &[]).await;
        let second = agent.run("再分析一下", &first.messages).await;

        assert_eq!(second.result.unwrap().stock_code.as_deref(), Some("000001"));
        assert_eq!(second.messages.len(), 4);
    }

    #[tokio::test]
    async fn test_analysis_is_remembered() {
        let memory = Arc::new(InMemoryMemoryStore::new());
        let agent = StockAgent::builder()
            .provider(FakeProvider::new())
            .market(Arc::new(FixtureMarket::new()))
            .memory(memory.clone())
            .runtime_config(fast_config())
            .build()
            .unwrap();

        agent.run("分析一下600519", &[]).await;
        let notes = memory.stock_history("600519", 10).await.unwrap();
        let kinds: Vec<_> = notes.iter().map(|n| n.kind.as_str()).collect();
        assert!(kinds.contains(&"price_snapshot"));
        assert!(kinds.contains(&"analysis"));
    }

    #[tokio::test]
    async fn test_stalled_memory_still_reaches_responder() {
        let agent = StockAgent::builder()
            .provider(FakeProvider::new())
            .market(Arc::new(FixtureMarket::new()))
            .memory(Arc::new(StalledMemory))
            .runtime_config(fast_config())
            .build()
            .unwrap();

        let out = tokio::time::timeout(Duration::from_secs(5), agent.run("分析一下600519", &[]))
            .await
            .expect("run finished");

        assert_eq!(out.trace.last(), Some(&NodeId::Responder));
        assert!(out.final_message.contains("600519"));
        assert!(out.degraded);
        assert!(out.result.unwrap().degraded);
        assert!(out.issues.iter().any(|i| i.contains("timed out")));
        assert!(out.context.payload(&fetched(names::GET_KLINE)).is_some());
    }

    #[test]
    fn test_builder_requires_market() {
        let err = StockAgent::builder().provider(FakeProvider::new()).build();
        assert!(matches!(err, Err(Error::InitializationFailed(_))));
    }
}
