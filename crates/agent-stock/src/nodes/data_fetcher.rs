//! Data fetcher: runs the plan's tool calls in order

use agent_core::{ContextValue, Error, Result};
use agent_memory::StockNote;
use agent_runtime::AgentRuntime;
use agent_workflow::{Node, NodeId, State, Transition};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::fetched;
use crate::error::StockError;
use crate::market::KlineBar;
use crate::tools::names;

pub struct DataFetcherNode {
    runtime: Arc<AgentRuntime>,
}

impl DataFetcherNode {
    pub fn new(runtime: Arc<AgentRuntime>) -> Self {
        Self { runtime }
    }

    /// Remember the latest close in the stock's context
    async fn record_snapshot(&self, payload: &Value) -> Result<()> {
        let Some(code) = payload["stock_code"].as_str() else {
            return Ok(());
        };
        let bars: Vec<KlineBar> = serde_json::from_value(payload["bars"].clone()).map_err(StockError::from)?;
        let Some(last) = bars.last() else {
            return Ok(());
        };

        let note = StockNote::new(code, "price_snapshot", format!("{} 收盘 {:.2}", last.date, last.close));
        self.runtime.record_stock_context(note).await?;
        Ok(())
    }
}

#[async_trait]
impl Node for DataFetcherNode {
    fn id(&self) -> NodeId {
        NodeId::DataFetcher
    }

    async fn run(&self, state: &mut State) -> Result<Transition> {
        let plan = state
            .plan()
            .cloned()
            .ok_or_else(|| Error::ProcessingFailed("no plan to fetch for".to_string()))?;

        let mut failed = 0;
        for (tool, params) in plan.tool_steps() {
            match self.runtime.call_tool(tool, params.clone()).await {
                Ok(payload) => {
                    debug!(tool, bytes = payload.to_string().len(), "fetched");
                    if tool == names::GET_KLINE {
                        if let Err(e) = self.record_snapshot(&payload).await {
                            warn!(error = %e, "price snapshot not recorded");
                            state.record_issue(NodeId::DataFetcher, e);
                        }
                    }
                    state.context_mut().insert(fetched(tool), ContextValue::Payload(payload))?;
                }
                Err(e) => {
                    warn!(tool, kind = %e.kind, attempts = e.attempts, "tool failed, continuing");
                    failed += 1;
                    state.context_mut().insert(fetched(tool), ContextValue::ToolFailure(e))?;
                }
            }
        }

        info!(steps = plan.tool_steps().count(), failed, "data fetched");
        Ok(Transition::Continue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeProvider, FixtureMarket, stock_runtime};
    use agent_core::ToolErrorKind;
    use agent_workflow::{Plan, PlanStep};
    use serde_json::json;

    fn state_with(steps: Vec<PlanStep>) -> State {
        let mut state = State::new(vec![], "分析一下600519");
        state.set_task("analyze_stock").unwrap();
        state.set_plan(Plan::new(steps).unwrap());
        state
    }

    #[tokio::test]
    async fn test_payloads_stored_per_tool() {
        let runtime = stock_runtime(FakeProvider::new(), FixtureMarket::new());
        let node = DataFetcherNode::new(runtime.clone());
        let mut state = state_with(vec![
            PlanStep::tool("get_stock_info", json!({"stock_code": "600519"})),
            PlanStep::tool("get_kline", json!({"stock_code": "600519", "days": 30})),
        ]);

        node.run(&mut state).await.unwrap();
        assert_eq!(
            state.context().payload("data_fetcher.get_stock_info").unwrap()["name"],
            "贵州茅台"
        );
        assert_eq!(state.context().payload("data_fetcher.get_kline").unwrap()["count"], 30);

        let notes = runtime.memory().stock_history("600519", 5).await.unwrap();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].kind, "price_snapshot");
    }

    #[tokio::test]
    async fn test_failure_does_not_stop_later_steps() {
        let runtime = stock_runtime(FakeProvider::new(), FixtureMarket::new().fail_info());
        let node = DataFetcherNode::new(runtime);
        let mut state = state_with(vec![
            PlanStep::tool("get_stock_info", json!({"stock_code": "600519"})),
            PlanStep::tool("get_sector_flow", json!({})),
        ]);

        assert_eq!(node.run(&mut state).await.unwrap(), Transition::Continue);
        let failure = state.context().tool_failure("data_fetcher.get_stock_info").unwrap();
        assert_eq!(failure.kind, ToolErrorKind::Transient);
        assert_eq!(failure.attempts, 3);
        assert!(state.context().payload("data_fetcher.get_sector_flow").is_some());
    }

    #[tokio::test]
    async fn test_missing_plan_is_error() {
        let runtime = stock_runtime(FakeProvider::new(), FixtureMarket::new());
        let mut state = State::new(vec![], "x");
        assert!(DataFetcherNode::new(runtime).run(&mut state).await.is_err());
    }
}
