//! The six workflow stages of a stock request
//!
//! Each node reads what earlier stages left in the state and writes under its
//! own context namespace. Cross-node keys are listed in [`keys`].

pub mod analyzer;
pub mod classifier;
pub mod data_fetcher;
pub mod planner;
pub mod reporter;
pub mod responder;

pub use analyzer::AnalyzerNode;
pub use classifier::ClassifierNode;
pub use data_fetcher::DataFetcherNode;
pub use planner::PlannerNode;
pub use reporter::ReporterNode;
pub use responder::ResponderNode;

use agent_core::Context;
use agent_workflow::{NodeId, State};

use crate::router::Intent;

/// Context keys read by a stage other than the one writing them
pub mod keys {
    /// Intent label (text)
    pub const INTENT: &str = "classifier.intent";
    /// How the intent was decided (text)
    pub const ROUTE_SOURCE: &str = "classifier.source";
    /// Stock code the request is about (text)
    pub const ENTITY: &str = "classifier.entity";
    /// `save_trade` parameters parsed from the message (payload)
    pub const TRADE: &str = "classifier.trade";
    /// Trade fields the message did not provide (payload)
    pub const MISSING: &str = "classifier.missing";
    /// The plan as data (payload)
    pub const STEPS: &str = "planner.steps";
    pub const SUMMARY: &str = "analyzer.summary";
    pub const TRADE_REVIEW: &str = "analyzer.trade_review";
    pub const MARKET_OVERVIEW: &str = "analyzer.market_overview";
    /// LLM commentary on the technical summary (text)
    pub const COMMENTARY: &str = "analyzer.commentary";
    /// Report title (text)
    pub const REPORT: &str = "reporter.summary";
    /// Rendered reply (text)
    pub const RESPONSE: &str = "responder.message";
}

/// Key under which the data fetcher stores a tool's payload or failure
pub fn fetched(tool: &str) -> String {
    NodeId::DataFetcher.key(tool)
}

/// Intent decided by the classifier, if it got that far
pub(crate) fn intent_of(state: &State) -> Option<Intent> {
    state.context().text(keys::INTENT).and_then(|label| label.parse().ok())
}

pub(crate) fn entity_of(context: &Context) -> Option<&str> {
    context.text(keys::ENTITY)
}
