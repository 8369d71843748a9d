//! Graph executor

use crate::{CancellationToken, Node, NodeId, Outcome, State, Transition, TransitionTable};
use agent_core::{Error, Result};
use agent_llm::Message;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{Instrument, debug, info, info_span, warn};

const DEFAULT_FALLBACK: &str = "抱歉，处理您的请求时出现了问题，请稍后再试。";

/// A validated set of nodes plus the table that sequences them
///
/// # Example
///
/// ```no_run
/// use agent_workflow::{State, TransitionTable, Workflow};
/// # use std::sync::Arc;
///
/// # async fn example(nodes: Vec<Arc<dyn agent_workflow::Node>>) -> agent_core::Result<()> {
/// let workflow = nodes
///     .into_iter()
///     .fold(Workflow::builder(), |b, node| b.add_node(node))
///     .transitions(TransitionTable::standard())
///     .build()?;
///
/// let state = workflow.run(State::new(Vec::new(), "分析一下600519")).await;
/// println!("{}", state.final_message().unwrap_or_default());
/// # Ok(())
/// # }
/// ```
pub struct Workflow {
    nodes: BTreeMap<NodeId, Arc<dyn Node>>,
    table: TransitionTable,
    fallback_message: String,
}

impl Workflow {
    /// Create a new workflow builder
    pub fn builder() -> WorkflowBuilder {
        WorkflowBuilder::new()
    }

    pub fn transitions(&self) -> &TransitionTable {
        &self.table
    }

    /// Execute a run to completion
    pub async fn run(&self, state: State) -> State {
        self.run_with_cancel(state, &CancellationToken::new()).await
    }

    /// Execute a run, checking `cancel` at each boundary after the start node
    ///
    /// Never fails: errors end up in `State::issues` and the returned state
    /// always carries a final assistant message.
    pub async fn run_with_cancel(&self, state: State, cancel: &CancellationToken) -> State {
        let span = info_span!("workflow_run", run_id = %state.run_id());
        self.drive(state, cancel).instrument(span).await
    }

    async fn drive(&self, mut state: State, cancel: &CancellationToken) -> State {
        let terminal = self.table.terminal();
        let mut current = self.table.start();
        info!(start = %current, "run started");

        loop {
            // the start node always runs; cancellation only acts at a boundary
            if current != terminal && !state.trace().is_empty() && cancel.is_cancelled() {
                warn!(skipped = %current, "run cancelled, jumping to {terminal}");
                state.mark_cancelled();
                state.record_issue(current, Error::Cancelled);
                current = terminal;
            }

            state.enter(current);
            let outcome = self.step(current, &mut state).await;

            if current == terminal {
                if outcome == Outcome::Failed || state.final_message().is_none() {
                    warn!("terminal node produced no message, using fallback");
                    state.push_message(Message::assistant(self.fallback_message.clone()));
                }
                break;
            }

            let mut next = self.table.next(current, outcome).unwrap_or(terminal);
            if state.visited(next) {
                warn!(node = %next, "node already visited, routing to {terminal}");
                next = terminal;
            }
            debug!(from = %current, ?outcome, to = %next, "transition");
            current = next;
        }

        info!(
            visited = state.trace().len(),
            issues = state.issues().len(),
            "run finished"
        );
        state
    }

    async fn step(&self, id: NodeId, state: &mut State) -> Outcome {
        if id == NodeId::Planner && state.task().trim().is_empty() {
            state.record_issue(id, Error::Planning("no task set before planning".to_string()));
            return Outcome::Failed;
        }

        let Some(node) = self.nodes.get(&id) else {
            state.record_issue(id, Error::ProcessingFailed(format!("node {id} is not registered")));
            return Outcome::Failed;
        };

        match node.run(state).await {
            Ok(Transition::Continue) => Outcome::Continue,
            Ok(Transition::ShortCircuit) => Outcome::ShortCircuit,
            Err(e) => {
                warn!(node = %id, error = %e, "node failed");
                state.record_issue(id, e);
                Outcome::Failed
            }
        }
    }
}

/// Builder for constructing workflows
#[derive(Default)]
pub struct WorkflowBuilder {
    nodes: BTreeMap<NodeId, Arc<dyn Node>>,
    table: Option<TransitionTable>,
    fallback_message: Option<String>,
}

impl WorkflowBuilder {
    /// Create a new workflow builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a node under its own id, replacing any earlier one
    pub fn add_node(mut self, node: Arc<dyn Node>) -> Self {
        self.nodes.insert(node.id(), node);
        self
    }

    /// Use `table` instead of `TransitionTable::standard()`
    pub fn transitions(mut self, table: TransitionTable) -> Self {
        self.table = Some(table);
        self
    }

    /// Message appended when the terminal node fails to produce one
    pub fn fallback_message(mut self, message: impl Into<String>) -> Self {
        self.fallback_message = Some(message.into());
        self
    }

    /// Build the workflow
    ///
    /// # Errors
    ///
    /// Fails if the table is invalid or names a node that was not added
    pub fn build(self) -> Result<Workflow> {
        let table = self.table.unwrap_or_default();
        table.validate()?;

        if let Some(missing) = table.nodes().into_iter().find(|n| !self.nodes.contains_key(n)) {
            return Err(Error::InitializationFailed(format!(
                "transition table references unregistered node {missing}"
            )));
        }

        Ok(Workflow {
            nodes: self.nodes,
            table,
            fallback_message: self
                .fallback_message
                .unwrap_or_else(|| DEFAULT_FALLBACK.to_string()),
        })
    }
}
