//! Plans produced by the planner

use agent_core::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;

/// One step of a plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PlanStep {
    /// Invoke a registry tool with the given parameters
    Tool { tool: String, params: Value },
    /// Derive findings from the outputs of earlier tool steps
    Analysis {
        directive: String,
        #[serde(default)]
        inputs: Vec<String>,
    },
}

impl PlanStep {
    pub fn tool(tool: impl Into<String>, params: Value) -> Self {
        Self::Tool {
            tool: tool.into(),
            params,
        }
    }

    pub fn analysis(directive: impl Into<String>, inputs: &[&str]) -> Self {
        Self::Analysis {
            directive: directive.into(),
            inputs: inputs.iter().map(|s| (*s).to_string()).collect(),
        }
    }

    /// Tool or directive name
    pub fn name(&self) -> &str {
        match self {
            Self::Tool { tool, .. } => tool,
            Self::Analysis { directive, .. } => directive,
        }
    }
}

/// Ordered steps for one run; discarded when the run ends
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    steps: Vec<PlanStep>,
}

impl Plan {
    /// Build a plan, checking step order
    ///
    /// Every tool an analysis step reads must be invoked by an earlier step,
    /// and no tool or directive may appear twice.
    pub fn new(steps: Vec<PlanStep>) -> Result<Self> {
        let mut seen_tools = HashSet::new();
        let mut seen_names = HashSet::new();

        for step in &steps {
            if !seen_names.insert(step.name().to_string()) {
                return Err(Error::Planning(format!("step '{}' appears twice", step.name())));
            }
            match step {
                PlanStep::Tool { tool, .. } => {
                    seen_tools.insert(tool.as_str());
                }
                PlanStep::Analysis { directive, inputs } => {
                    if let Some(missing) = inputs.iter().find(|i| !seen_tools.contains(i.as_str())) {
                        return Err(Error::Planning(format!(
                            "'{directive}' needs '{missing}' which is not fetched before it"
                        )));
                    }
                }
            }
        }

        Ok(Self { steps })
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn steps(&self) -> &[PlanStep] {
        &self.steps
    }

    /// `(tool, params)` of tool steps, in order
    pub fn tool_steps(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.steps.iter().filter_map(|s| match s {
            PlanStep::Tool { tool, params } => Some((tool.as_str(), params)),
            PlanStep::Analysis { .. } => None,
        })
    }

    /// `(directive, inputs)` of analysis steps, in order
    pub fn analysis_steps(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.steps.iter().filter_map(|s| match s {
            PlanStep::Analysis { directive, inputs } => Some((directive.as_str(), inputs.as_slice())),
            PlanStep::Tool { .. } => None,
        })
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}
