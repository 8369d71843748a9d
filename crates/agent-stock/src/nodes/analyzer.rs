//! Analyzer: derives findings from fetched data
//!
//! A directive whose inputs are missing still produces a finding, flagged
//! incomplete, so the reporter can say what the result is based on.

use agent_core::{Context, ContextValue, Finding, Result};
use agent_llm::Message;
use agent_runtime::AgentRuntime;
use agent_workflow::{Node, NodeId, State, Transition};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::planner::directives;
use super::{entity_of, fetched, intent_of, keys};
use crate::config::StockConfig;
use crate::error::StockError;
use crate::indicators::TechnicalSummary;
use crate::market::{KlineBar, MarketOverview, SectorFlow};
use crate::prompts::{AnalysisPrompt, Prompts};
use crate::router::Intent;
use crate::tools::names;
use crate::trade::{Trade, TradeStats};

/// Sectors listed on each side of a market overview
const TOP_SECTORS: usize = 3;
/// Trades echoed back in a review
const RECENT_TRADES: usize = 5;

pub struct AnalyzerNode {
    runtime: Arc<AgentRuntime>,
    config: Arc<StockConfig>,
    prompts: Arc<Prompts>,
}

/// Decode one field of a fetched payload
fn fetched_field<T: DeserializeOwned>(context: &Context, tool: &str, field: &str) -> Option<T> {
    let payload = context.payload(&fetched(tool))?;
    serde_json::from_value(payload.get(field)?.clone()).ok()
}

fn finding(data: Value, notes: Vec<String>) -> Finding {
    let mut notes = notes.into_iter();
    match notes.next() {
        None => Finding::complete(data),
        Some(first) => notes.fold(Finding::incomplete(data, first), Finding::with_note),
    }
}

fn technical_summary(context: &Context) -> Finding {
    let mut notes = Vec::new();

    let technical = match fetched_field::<Vec<KlineBar>>(context, names::GET_KLINE, "bars") {
        Some(bars) => match TechnicalSummary::compute(&bars) {
            Ok(summary) => Some(summary),
            Err(e) => {
                notes.push(format!("技术指标计算失败：{e}"));
                None
            }
        },
        None => {
            notes.push("缺少K线数据，未计算技术指标".to_string());
            None
        }
    };

    let sectors = fetched_field::<Vec<SectorFlow>>(context, names::GET_SECTOR_FLOW, "sectors");
    if sectors.is_none() {
        notes.push("缺少板块资金流数据，未结合资金面".to_string());
    }
    let name = fetched_field::<String>(context, names::GET_STOCK_INFO, "name");

    let data = json!({
        "stock_code": entity_of(context),
        "name": name,
        "technical": technical,
        "sector_overview": sectors.map(|flows| MarketOverview::from_flows(&flows, TOP_SECTORS)),
    });
    finding(data, notes)
}

fn trade_review(context: &Context) -> Finding {
    let Some(trades) = fetched_field::<Vec<Trade>>(context, names::GET_TRADES, "trades") else {
        return Finding::incomplete(Value::Null, "缺少交易记录，无法复盘");
    };

    let stats = TradeStats::from_trades(&trades);
    let recent: Vec<&Trade> = trades.iter().rev().take(RECENT_TRADES).collect();
    finding(
        json!({
            "stock_code": fetched_field::<String>(context, names::GET_TRADES, "stock_code"),
            "count": trades.len(),
            "stats": stats,
            "recent": recent,
        }),
        Vec::new(),
    )
}

fn market_overview(context: &Context) -> Finding {
    match fetched_field::<Vec<SectorFlow>>(context, names::GET_SECTOR_FLOW, "sectors") {
        Some(flows) => Finding::complete(json!(MarketOverview::from_flows(&flows, TOP_SECTORS))),
        None => Finding::incomplete(Value::Null, "缺少板块资金流数据，无法生成市场概览"),
    }
}

impl AnalyzerNode {
    pub fn new(runtime: Arc<AgentRuntime>, config: Arc<StockConfig>, prompts: Arc<Prompts>) -> Self {
        Self {
            runtime,
            config,
            prompts,
        }
    }

    /// LLM commentary on a computed summary, informed by the memory brief
    async fn commentary(&self, data: &Value) -> Result<Option<String>> {
        let Some(code) = data["stock_code"].as_str() else {
            return Ok(None);
        };
        if data["technical"].is_null() {
            return Ok(None);
        }

        let brief = self
            .runtime
            .memory_brief(Some(code), self.config.memory_history_limit)
            .await?;

        let pretty = |v: &Value| serde_json::to_string_pretty(v).map_err(StockError::from);
        let prompt = AnalysisPrompt {
            stock_code: code,
            name: data["name"].as_str(),
            technical: pretty(&data["technical"])?,
            sectors: match &data["sector_overview"] {
                Value::Null => String::new(),
                overview => pretty(overview)?,
            },
            brief,
        };

        let system = self.prompts.analysis_system()?;
        let user = self.prompts.analysis_user(&prompt)?;
        let reply = self.runtime.complete(&system, &[Message::user(user)]).await?;
        let reply = reply.trim();
        Ok((!reply.is_empty()).then(|| reply.to_string()))
    }
}

#[async_trait]
impl Node for AnalyzerNode {
    fn id(&self) -> NodeId {
        NodeId::Analyzer
    }

    async fn run(&self, state: &mut State) -> Result<Transition> {
        let Some(plan) = state.plan().cloned() else {
            return Ok(Transition::Continue);
        };

        for (directive, inputs) in plan.analysis_steps() {
            let (key, finding) = match directive {
                directives::TECHNICAL_SUMMARY => (keys::SUMMARY.to_string(), technical_summary(state.context())),
                directives::TRADE_REVIEW => (keys::TRADE_REVIEW.to_string(), trade_review(state.context())),
                directives::MARKET_OVERVIEW => {
                    (keys::MARKET_OVERVIEW.to_string(), market_overview(state.context()))
                }
                other => (
                    NodeId::Analyzer.key(other),
                    Finding::incomplete(Value::Null, format!("不支持的分析步骤：{other}")),
                ),
            };
            debug!(directive, ?inputs, complete = finding.is_complete(), "analysis step done");
            if !finding.is_complete() {
                warn!(directive, notes = ?finding.notes, "incomplete finding");
            }
            state.context_mut().insert(key, ContextValue::Finding(finding))?;
        }

        if intent_of(state) == Some(Intent::AnalyzeStock) {
            let data = state.context().finding(keys::SUMMARY).map(|f| f.data.clone());
            if let Some(data) = data {
                match self.commentary(&data).await {
                    Ok(Some(text)) => {
                        state.context_mut().insert(keys::COMMENTARY, ContextValue::Text(text))?;
                    }
                    Ok(None) => {}
                    Err(e) => {
                        warn!(error = %e, "commentary unavailable");
                        state.record_issue(NodeId::Analyzer, e);
                    }
                }
            }
        }

        info!(findings = plan.analysis_steps().count(), "analysis done");
        Ok(Transition::Continue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeProvider, fixture_snapshot, runtime_with};
    use agent_core::ToolError;
    use agent_workflow::{Plan, PlanStep};
    use std::time::Duration;

    fn node(provider: Arc<FakeProvider>) -> AnalyzerNode {
        AnalyzerNode::new(
            runtime_with(provider),
            Arc::new(StockConfig::default()),
            Arc::new(Prompts::new().unwrap()),
        )
    }

    fn analysis_state() -> State {
        let mut state = State::new(vec![], "分析一下600519");
        state.set_task("analyze_stock").unwrap();
        let context = state.context_mut();
        context.insert(keys::INTENT, ContextValue::Text("analyze_stock".into())).unwrap();
        context.insert(keys::ENTITY, ContextValue::Text("600519".into())).unwrap();
        state.set_plan(
            Plan::new(vec![
                PlanStep::tool("get_kline", json!({})),
                PlanStep::tool("get_sector_flow", json!({})),
                PlanStep::analysis(directives::TECHNICAL_SUMMARY, &["get_kline", "get_sector_flow"]),
            ])
            .unwrap(),
        );
        state
    }

    fn put(state: &mut State, tool: &str, value: ContextValue) {
        state.context_mut().insert(fetched(tool), value).unwrap();
    }

    #[tokio::test]
    async fn test_complete_summary_with_commentary() {
        let snapshot = fixture_snapshot();
        let mut state = analysis_state();
        put(&mut state, "get_kline", ContextValue::Payload(json!({"bars": snapshot.klines["600519"]})));
        put(&mut state, "get_sector_flow", ContextValue::Payload(json!({"sectors": snapshot.sectors})));

        node(FakeProvider::new()).run(&mut state).await.unwrap();

        let summary = state.context().finding(keys::SUMMARY).unwrap();
        assert!(summary.is_complete());
        assert_eq!(summary.data["stock_code"], "600519");
        assert!(summary.data["technical"]["ma"]["ma20"].is_number());
        assert!(state.context().text(keys::COMMENTARY).is_some());
    }

    #[tokio::test]
    async fn test_missing_kline_is_incomplete() {
        let snapshot = fixture_snapshot();
        let mut state = analysis_state();
        put(
            &mut state,
            "get_kline",
            ContextValue::ToolFailure(ToolError::timeout("get_kline", Duration::from_secs(10))),
        );
        put(&mut state, "get_sector_flow", ContextValue::Payload(json!({"sectors": snapshot.sectors})));

        let provider = FakeProvider::new();
        node(provider.clone()).run(&mut state).await.unwrap();

        let summary = state.context().finding(keys::SUMMARY).unwrap();
        assert!(!summary.is_complete());
        assert!(summary.data["technical"].is_null());
        assert!(summary.notes[0].contains("K线"));
        // nothing to comment on
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn test_commentary_failure_is_an_issue() {
        let snapshot = fixture_snapshot();
        let mut state = analysis_state();
        put(&mut state, "get_kline", ContextValue::Payload(json!({"bars": snapshot.klines["600519"]})));
        put(&mut state, "get_sector_flow", ContextValue::Payload(json!({"sectors": snapshot.sectors})));

        node(FakeProvider::new().failing()).run(&mut state).await.unwrap();
        assert!(state.context().finding(keys::SUMMARY).unwrap().is_complete());
        assert!(!state.context().contains_key(keys::COMMENTARY));
        assert_eq!(state.issues().len(), 1);
    }

    #[test]
    fn test_trade_review_from_payload() {
        let day = chrono::NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
        let trades = vec![
            Trade::new("600519", crate::trade::Direction::Buy, 100.0, 10, day),
            Trade::new("600519", crate::trade::Direction::Sell, 110.0, 10, day.succ_opt().unwrap()),
        ];
        let mut context = Context::with_schema(agent_workflow::standard_schema());
        context
            .insert(fetched("get_trades"), ContextValue::Payload(json!({"stock_code": null, "trades": trades})))
            .unwrap();

        let review = trade_review(&context);
        assert!(review.is_complete());
        assert_eq!(review.data["stats"]["wins"], 1);
        assert_eq!(review.data["recent"][0]["direction"], "sell");
    }

    #[test]
    fn test_market_overview_without_data() {
        let context = Context::with_schema(agent_workflow::standard_schema());
        assert!(!market_overview(&context).is_complete());
    }
}
