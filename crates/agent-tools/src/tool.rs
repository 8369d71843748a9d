//! The contract every catalogue entry implements

use agent_core::ToolError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A named capability with a fixed input/output contract
#[async_trait]
pub trait Tool: Send + Sync {
    /// `params` has already been validated against `input_schema` when the
    /// call comes through `ToolRegistry::call`.
    async fn execute(&self, params: Value) -> Result<Value, ToolError>;

    /// Key the planner refers to; unique within a `ToolRegistry`
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// Accepted parameters as a JSON Schema subset built with `schema`
    ///
    /// # Example
    ///
    /// ```
    /// use agent_tools::schema;
    /// use serde_json::json;
    ///
    /// let schema = schema::object(
    ///     json!({ "stock_code": schema::stock_code() }),
    ///     &["stock_code"],
    /// );
    /// assert_eq!(schema["required"][0], "stock_code");
    /// ```
    fn input_schema(&self) -> Value;

    /// Whether repeating a call has no further effect
    ///
    /// Only idempotent tools are retried after a transient failure.
    fn idempotent(&self) -> bool {
        true
    }
}

/// Serializable description of a registered tool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
    pub idempotent: bool,
}

impl ToolDefinition {
    pub fn of(tool: &dyn Tool) -> Self {
        Self {
            name: tool.name().to_string(),
            description: tool.description().to_string(),
            input_schema: tool.input_schema(),
            idempotent: tool.idempotent(),
        }
    }
}
