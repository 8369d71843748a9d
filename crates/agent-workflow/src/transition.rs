//! Explicit transition table over node outcomes

use crate::NodeId;
use agent_core::{Error, Result};
use serde::{Deserialize, Serialize};

/// Result of running a node, as seen by the executor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Continue,
    ShortCircuit,
    Failed,
}

impl Outcome {
    pub const ALL: [Self; 3] = [Self::Continue, Self::ShortCircuit, Self::Failed];
}

/// Condition under which an edge applies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Guard {
    Always,
    On(Outcome),
}

impl Guard {
    fn admits(self, outcome: Outcome) -> bool {
        match self {
            Self::Always => true,
            Self::On(expected) => expected == outcome,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub from: NodeId,
    pub guard: Guard,
    pub to: NodeId,
}

/// State machine over node ids
///
/// Edges are checked in insertion order; the first whose guard admits the
/// outcome wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionTable {
    start: NodeId,
    terminal: NodeId,
    edges: Vec<Edge>,
}

impl TransitionTable {
    pub fn new(start: NodeId, terminal: NodeId) -> Self {
        Self {
            start,
            terminal,
            edges: Vec::new(),
        }
    }

    pub fn edge(mut self, from: NodeId, guard: Guard, to: NodeId) -> Self {
        self.edges.push(Edge { from, guard, to });
        self
    }

    /// The analysis pipeline with its two escape branches
    ///
    /// ```text
    /// classifier --continue--> planner --continue--> data_fetcher -> analyzer -> reporter -> responder
    ///      \--short_circuit|failed--> responder       \--short_circuit|failed--> responder
    /// ```
    pub fn standard() -> Self {
        use NodeId::{Analyzer, Classifier, DataFetcher, Planner, Reporter, Responder};
        Self::new(Classifier, Responder)
            .edge(Classifier, Guard::On(Outcome::Continue), Planner)
            .edge(Classifier, Guard::Always, Responder)
            .edge(Planner, Guard::On(Outcome::Continue), DataFetcher)
            .edge(Planner, Guard::Always, Responder)
            .edge(DataFetcher, Guard::Always, Analyzer)
            .edge(Analyzer, Guard::Always, Reporter)
            .edge(Reporter, Guard::Always, Responder)
    }

    pub fn start(&self) -> NodeId {
        self.start
    }

    pub fn terminal(&self) -> NodeId {
        self.terminal
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Next node after `from` finished with `outcome`
    pub fn next(&self, from: NodeId, outcome: Outcome) -> Option<NodeId> {
        self.edges
            .iter()
            .find(|e| e.from == from && e.guard.admits(outcome))
            .map(|e| e.to)
    }

    /// Every node the table can reach, start and terminal included
    pub fn nodes(&self) -> Vec<NodeId> {
        let mut nodes = vec![self.start, self.terminal];
        for edge in &self.edges {
            nodes.push(edge.from);
            nodes.push(edge.to);
        }
        nodes.sort_unstable();
        nodes.dedup();
        nodes
    }

    /// Check that every non-terminal node has an edge for every outcome and
    /// that the terminal node has none
    pub fn validate(&self) -> Result<()> {
        if self.start == self.terminal {
            return Err(Error::InitializationFailed(
                "start and terminal node must differ".to_string(),
            ));
        }
        if self.edges.iter().any(|e| e.from == self.terminal) {
            return Err(Error::InitializationFailed(format!(
                "terminal node {} must not have outgoing edges",
                self.terminal
            )));
        }
        for node in self.nodes().into_iter().filter(|n| *n != self.terminal) {
            for outcome in Outcome::ALL {
                if self.next(node, outcome).is_none() {
                    return Err(Error::InitializationFailed(format!(
                        "node {node} has no transition for outcome {outcome:?}"
                    )));
                }
            }
        }
        Ok(())
    }
}

impl Default for TransitionTable {
    fn default() -> Self {
        Self::standard()
    }
}
