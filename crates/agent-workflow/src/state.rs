//! Per-run state threaded through the nodes

use crate::{NodeId, Plan};
use agent_core::{Context, ContextSchema, Error, Result, ValueKind};
use agent_llm::{Message, Role};
use serde_json::Value;
use std::sync::{Arc, LazyLock};
use uuid::Uuid;

static STANDARD_SCHEMA: LazyLock<Arc<ContextSchema>> = LazyLock::new(|| {
    Arc::new(
        ContextSchema::new()
            .allow("classifier.", &[ValueKind::Text, ValueKind::Payload])
            .allow("planner.", &[ValueKind::Text, ValueKind::Payload])
            .allow("data_fetcher.", &[ValueKind::Payload, ValueKind::ToolFailure])
            .allow("analyzer.", &[ValueKind::Finding, ValueKind::Text])
            .allow("reporter.", &[ValueKind::Text, ValueKind::Payload])
            .allow("responder.", &[ValueKind::Text]),
    )
});

/// Which value kinds each node namespace may write
pub fn standard_schema() -> Arc<ContextSchema> {
    STANDARD_SCHEMA.clone()
}

/// A non-fatal error recorded during a run
#[derive(Debug, Clone)]
pub struct Issue {
    pub node: NodeId,
    pub error: Error,
}

/// State of one workflow run
///
/// Owned by exactly one run. Messages are append-only, context entries are
/// write-once and the result can be set a single time.
#[derive(Debug, Clone)]
pub struct State {
    run_id: Uuid,
    messages: Vec<Message>,
    turn_start: usize,
    task: String,
    context: Context,
    plan: Option<Plan>,
    result: Option<Value>,
    issues: Vec<Issue>,
    trace: Vec<NodeId>,
    cancelled: bool,
}

impl State {
    /// Start a run from earlier turns plus the new user message
    pub fn new(prior: Vec<Message>, user_message: impl Into<String>) -> Self {
        let mut messages = prior;
        messages.push(Message::user(user_message));
        let turn_start = messages.len() - 1;
        Self {
            run_id: Uuid::new_v4(),
            messages,
            turn_start,
            task: String::new(),
            context: Context::with_schema(standard_schema()),
            plan: None,
            result: None,
            issues: Vec::new(),
            trace: Vec::new(),
            cancelled: false,
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Messages before the current user turn
    pub fn prior_messages(&self) -> &[Message] {
        &self.messages[..self.turn_start]
    }

    /// The user message that started this run
    pub fn user_message(&self) -> &str {
        self.messages[self.turn_start].text()
    }

    pub fn push_message(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Latest assistant message added during this run
    pub fn final_message(&self) -> Option<&str> {
        self.messages[self.turn_start..]
            .iter()
            .rev()
            .find(|m| m.role == Role::Assistant)
            .map(Message::text)
    }

    pub fn task(&self) -> &str {
        &self.task
    }

    /// Set the current objective; blank tasks are rejected
    pub fn set_task(&mut self, task: impl Into<String>) -> Result<()> {
        let task = task.into();
        if task.trim().is_empty() {
            return Err(Error::ProcessingFailed("task must not be empty".to_string()));
        }
        self.task = task;
        Ok(())
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut Context {
        &mut self.context
    }

    pub fn plan(&self) -> Option<&Plan> {
        self.plan.as_ref()
    }

    pub fn set_plan(&mut self, plan: Plan) {
        self.plan = Some(plan);
    }

    pub fn result(&self) -> Option<&Value> {
        self.result.as_ref()
    }

    /// Set the run result; a second call fails
    pub fn set_result(&mut self, result: Value) -> Result<()> {
        if self.result.is_some() {
            return Err(Error::ResultAlreadySet);
        }
        self.result = Some(result);
        Ok(())
    }

    pub fn issues(&self) -> &[Issue] {
        &self.issues
    }

    pub fn record_issue(&mut self, node: NodeId, error: Error) {
        self.issues.push(Issue { node, error });
    }

    /// Nodes visited so far, in order
    pub fn trace(&self) -> &[NodeId] {
        &self.trace
    }

    pub(crate) fn enter(&mut self, node: NodeId) {
        self.trace.push(node);
    }

    pub fn visited(&self, node: NodeId) -> bool {
        self.trace.contains(&node)
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    pub(crate) fn mark_cancelled(&mut self) {
        self.cancelled = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agent_core::ContextValue;
    use serde_json::json;

    #[test]
    fn test_new_state_appends_user_turn() {
        let prior = vec![Message::user("分析一下600519"), Message::assistant("好的")];
        let state = State::new(prior, "那000001呢");
        assert_eq!(state.messages().len(), 3);
        assert_eq!(state.prior_messages().len(), 2);
        assert_eq!(state.user_message(), "那000001呢");
        assert!(state.final_message().is_none());
    }

    #[test]
    fn test_final_message_only_from_this_run() {
        let mut state = State::new(vec![Message::assistant("old reply")], "你好");
        assert!(state.final_message().is_none());
        state.push_message(Message::assistant("你好！"));
        assert_eq!(state.final_message(), Some("你好！"));
    }

    #[test]
    fn test_result_set_once() {
        let mut state = State::new(Vec::new(), "x");
        state.set_result(json!({"summary": "a"})).unwrap();
        assert!(matches!(state.set_result(json!({})), Err(Error::ResultAlreadySet)));
        assert_eq!(state.result().unwrap()["summary"], "a");
    }

    #[test]
    fn test_blank_task_rejected() {
        let mut state = State::new(Vec::new(), "x");
        assert!(state.set_task("  ").is_err());
        state.set_task("analyze_stock").unwrap();
        assert_eq!(state.task(), "analyze_stock");
    }

    #[test]
    fn test_standard_schema_applies() {
        let mut state = State::new(Vec::new(), "x");
        let ctx = state.context_mut();
        ctx.insert("classifier.entity", ContextValue::Text("600519".into())).unwrap();
        assert!(ctx.insert("responder.raw", ContextValue::Payload(json!({}))).is_err());
        assert!(ctx.insert("unknown.key", ContextValue::Text("x".into())).is_err());
    }

    #[test]
    fn test_runs_get_distinct_ids() {
        assert_ne!(State::new(Vec::new(), "a").run_id(), State::new(Vec::new(), "a").run_id());
    }
}
