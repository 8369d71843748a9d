//! Workflow engine for money-agent
//!
//! A run threads one `State` through a fixed set of nodes. Which node runs
//! next is decided by an explicit `TransitionTable` keyed on the node's
//! outcome, so branching lives in one place instead of inside the nodes.
//!
//! Guarantees the executor upholds for every run:
//!
//! - the start node runs exactly once and the terminal node runs exactly once;
//! - no node is entered twice;
//! - node errors are recorded on the state and never abort the run;
//! - the run always ends with an assistant message.

pub mod node;
pub mod plan;
pub mod state;
pub mod transition;
pub mod workflow;

pub use tokio_util::sync::CancellationToken;
pub use node::{Node, NodeId, Transition};
pub use plan::{Plan, PlanStep};
pub use state::{Issue, State, standard_schema};
pub use transition::{Edge, Guard, Outcome, TransitionTable};
pub use workflow::{Workflow, WorkflowBuilder};
