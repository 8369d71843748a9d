//! Responder: the single place a reply is produced

use agent_core::{Error, Result};
use agent_llm::Message;
use agent_runtime::AgentRuntime;
use agent_workflow::{Node, NodeId, State, Transition};
use async_trait::async_trait;
use std::fmt::Write as _;
use std::sync::Arc;
use tracing::{info, warn};

use super::{entity_of, intent_of, keys};
use crate::prompts::Prompts;
use crate::report::Report;
use crate::router::{Intent, clarification_intent};
use crate::trade::field_label;

const HELP: &str = "我可以帮你：分析个股（如“分析一下600519”）、查看市场热点、记录交易（如“买入 600519 100股 价格1700”）、复盘交易记录。";
const CHAT_UNAVAILABLE: &str = "抱歉，我暂时无法回答这个问题。你可以让我分析股票、查看市场热点或复盘交易。";
const PLANNING_FAILED: &str = "抱歉，我没能理解要做的分析，请换个说法试试。";
const CANCELLED: &str = "请求已取消，未完成分析。";
const GENERIC_FAILURE: &str = "抱歉，处理请求时出现问题，请稍后再试。";

pub struct ResponderNode {
    runtime: Arc<AgentRuntime>,
    prompts: Arc<Prompts>,
}

fn clarification(intent: Intent, state: &State) -> String {
    match intent {
        Intent::RecordTrade => {
            let missing: Vec<String> = state
                .context()
                .payload(keys::MISSING)
                .and_then(|v| serde_json::from_value(v.clone()).ok())
                .unwrap_or_default();
            let labels: Vec<&str> = missing.iter().map(|f| field_label(f)).collect();
            format!(
                "请补充交易信息：{}。例如：买入 600519 100股 价格1700",
                labels.join("、")
            )
        }
        _ => "请提供要分析的股票代码（6位数字），例如：分析一下600519".to_string(),
    }
}

fn has_issue(state: &State, matches: fn(&Error) -> bool) -> bool {
    state.issues().iter().any(|issue| matches(&issue.error))
}

/// The planner's reason, if planning is what stopped the run
fn planning_failure(state: &State) -> Option<String> {
    state.issues().iter().find_map(|issue| match &issue.error {
        Error::Planning(reason) => Some(reason.clone()),
        _ => None,
    })
}

/// A report with nothing but the reason it is empty
fn apology_report(state: &State, reason: &str) -> Report {
    let intent = intent_of(state)
        .or_else(|| state.task().parse().ok())
        .unwrap_or(Intent::Chat);
    let mut report = Report::new(intent, "未能完成分析");
    if let Some(code) = entity_of(state.context()) {
        report = report.with_stock(code);
    }
    report.caveat(format!("无法制定分析计划：{reason}"));
    report
}

/// Issues worth telling the user about
fn issues_block(state: &State) -> Option<String> {
    let lines: Vec<String> = state
        .issues()
        .iter()
        .filter(|issue| !matches!(issue.error, Error::Cancelled | Error::Classification(_)))
        .map(|issue| format!("- {}: {}", issue.node, issue.error))
        .collect();
    if lines.is_empty() {
        return None;
    }
    Some(format!("处理过程中遇到的问题：\n{}", lines.join("\n")))
}

impl ResponderNode {
    pub fn new(runtime: Arc<AgentRuntime>, prompts: Arc<Prompts>) -> Self {
        Self { runtime, prompts }
    }

    async fn chat(&self, state: &State) -> Result<String> {
        let system = self.prompts.chat_system()?;
        let reply = self.runtime.complete(&system, state.messages()).await?;
        Ok(reply.trim().to_string())
    }

    async fn body(&self, state: &mut State) -> Result<String> {
        if let Some(result) = state.result() {
            let report: Report =
                serde_json::from_value(result.clone()).map_err(|e| Error::ProcessingFailed(e.to_string()))?;
            return Ok(report.render_markdown());
        }
        if let Some(intent) = clarification_intent(state.task()) {
            return Ok(clarification(intent, state));
        }
        if has_issue(state, |e| matches!(e, Error::Classification(_))) {
            return Ok(HELP.to_string());
        }
        if state.is_cancelled() {
            return Ok(CANCELLED.to_string());
        }
        if state.task() == Intent::Chat.as_str() {
            return Ok(match self.chat(state).await {
                Ok(reply) if !reply.is_empty() => reply,
                Ok(_) => CHAT_UNAVAILABLE.to_string(),
                Err(e) => {
                    warn!(error = %e, "chat reply failed");
                    state.record_issue(NodeId::Responder, e);
                    CHAT_UNAVAILABLE.to_string()
                }
            });
        }
        if let Some(reason) = planning_failure(state) {
            let report = apology_report(state, &reason);
            let value = serde_json::to_value(&report).map_err(|e| Error::ProcessingFailed(e.to_string()))?;
            state.set_result(value)?;
            return Ok(PLANNING_FAILED.to_string());
        }
        Ok(GENERIC_FAILURE.to_string())
    }
}

#[async_trait]
impl Node for ResponderNode {
    fn id(&self) -> NodeId {
        NodeId::Responder
    }

    async fn run(&self, state: &mut State) -> Result<Transition> {
        let mut reply = String::new();
        if state.is_cancelled() && state.result().is_some() {
            reply.push_str("（请求已取消，以下为已完成部分）\n\n");
        }
        reply.push_str(&self.body(state).await?);

        if let Some(block) = issues_block(state) {
            let _ = write!(reply, "\n\n{block}");
        }

        state
            .context_mut()
            .insert(keys::RESPONSE, agent_core::ContextValue::Text(reply.clone()))?;
        info!(chars = reply.chars().count(), issues = state.issues().len(), "reply ready");
        state.push_message(Message::assistant(reply));
        Ok(Transition::Continue)
    }
}
