//! Node trait and the closed set of node identifiers

use crate::State;
use agent_core::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The six processing stages of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeId {
    Classifier,
    Planner,
    DataFetcher,
    Analyzer,
    Reporter,
    Responder,
}

impl NodeId {
    pub const ALL: [Self; 6] = [
        Self::Classifier,
        Self::Planner,
        Self::DataFetcher,
        Self::Analyzer,
        Self::Reporter,
        Self::Responder,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Classifier => "classifier",
            Self::Planner => "planner",
            Self::DataFetcher => "data_fetcher",
            Self::Analyzer => "analyzer",
            Self::Reporter => "reporter",
            Self::Responder => "responder",
        }
    }

    /// Context key owned by this node, e.g. `data_fetcher.get_kline`
    pub fn key(&self, name: &str) -> String {
        format!("{}.{name}", self.as_str())
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a node asks the executor to do next
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Follow the normal path
    Continue,
    /// Skip ahead (clarification, empty plan)
    ShortCircuit,
}

/// One stage of a run: reads and updates the state
///
/// Errors are not fatal: the executor records them on the state and follows
/// the table's failure edge.
#[async_trait]
pub trait Node: Send + Sync {
    fn id(&self) -> NodeId;

    async fn run(&self, state: &mut State) -> Result<Transition>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_are_namespaced() {
        assert_eq!(NodeId::DataFetcher.key("get_kline"), "data_fetcher.get_kline");
        assert_eq!(NodeId::Analyzer.to_string(), "analyzer");
    }
}
