//! Planner: turns the classified task into tool calls and analysis steps

use agent_core::{ContextValue, Error, Result};
use agent_workflow::{Node, NodeId, Plan, PlanStep, State, Transition};
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use tracing::info;

use super::{entity_of, keys};
use crate::config::StockConfig;
use crate::router::{Intent, clarification_intent};
use crate::tools::names;

/// Analysis directives understood by the analyzer
pub mod directives {
    pub const TECHNICAL_SUMMARY: &str = "compute_technical_summary";
    pub const TRADE_REVIEW: &str = "compute_trade_review";
    pub const MARKET_OVERVIEW: &str = "compute_market_overview";
}

pub struct PlannerNode {
    config: Arc<StockConfig>,
}

impl PlannerNode {
    pub fn new(config: Arc<StockConfig>) -> Self {
        Self { config }
    }

    fn steps_for(&self, intent: Intent, state: &State) -> Result<Vec<PlanStep>> {
        let context = state.context();
        let steps = match intent {
            Intent::AnalyzeStock => {
                let code = entity_of(context)
                    .ok_or_else(|| Error::Planning("no stock code to analyze".to_string()))?;
                vec![
                    PlanStep::tool(names::GET_STOCK_INFO, json!({ "stock_code": code })),
                    PlanStep::tool(
                        names::GET_KLINE,
                        json!({ "stock_code": code, "days": self.config.kline_days }),
                    ),
                    PlanStep::tool(names::GET_SECTOR_FLOW, json!({})),
                    PlanStep::analysis(
                        directives::TECHNICAL_SUMMARY,
                        &[names::GET_KLINE, names::GET_SECTOR_FLOW],
                    ),
                ]
            }
            Intent::ReviewHistory => {
                let params = match entity_of(context) {
                    Some(code) => json!({ "stock_code": code }),
                    None => json!({}),
                };
                vec![
                    PlanStep::tool(names::GET_TRADES, params),
                    PlanStep::analysis(directives::TRADE_REVIEW, &[names::GET_TRADES]),
                ]
            }
            Intent::MarketScan => vec![
                PlanStep::tool(names::GET_SECTOR_FLOW, json!({})),
                PlanStep::analysis(directives::MARKET_OVERVIEW, &[names::GET_SECTOR_FLOW]),
            ],
            Intent::RecordTrade => {
                let params = context
                    .payload(keys::TRADE)
                    .ok_or_else(|| Error::Planning("no parsed trade to record".to_string()))?;
                let code = params["stock_code"].clone();
                vec![
                    PlanStep::tool(names::SAVE_TRADE, params.clone()),
                    PlanStep::tool(names::GET_TRADES, json!({ "stock_code": code })),
                    PlanStep::analysis(directives::TRADE_REVIEW, &[names::GET_TRADES]),
                ]
            }
            Intent::Chat => Vec::new(),
        };
        Ok(steps)
    }
}

#[async_trait]
impl Node for PlannerNode {
    fn id(&self) -> NodeId {
        NodeId::Planner
    }

    async fn run(&self, state: &mut State) -> Result<Transition> {
        if clarification_intent(state.task()).is_some() {
            state.set_plan(Plan::empty());
            return Ok(Transition::ShortCircuit);
        }

        let intent: Intent = state.task().parse().map_err(Error::Planning)?;
        let plan = Plan::new(self.steps_for(intent, state)?)?;

        if plan.is_empty() && intent != Intent::Chat {
            return Err(Error::Planning(format!("empty plan for {intent}")));
        }

        let steps = serde_json::to_value(plan.steps()).map_err(|e| Error::ProcessingFailed(e.to_string()))?;
        state.context_mut().insert(keys::STEPS, ContextValue::Payload(steps))?;
        info!(%intent, steps = plan.len(), "plan ready");

        let transition = if plan.is_empty() {
            Transition::ShortCircuit
        } else {
            Transition::Continue
        };
        state.set_plan(plan);
        Ok(transition)
    }
}
