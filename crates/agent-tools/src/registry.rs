//! Tool registry for the fixed tool catalogue

use crate::{Tool, ToolDefinition, schema};
use agent_core::ToolError;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// Registry of named tools
///
/// The catalogue is assembled once at startup and then shared read-only
/// between runs behind an `Arc`, so lookups need no locking.
#[derive(Default, Clone)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    /// Create a new tool registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool, replacing any tool with the same name
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    /// Builder-style registration
    pub fn with_tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.register(tool);
        self
    }

    /// Get a tool by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Validate `params` and run the named tool once
    pub async fn call(&self, name: &str, params: Value) -> Result<Value, ToolError> {
        let tool = self.get(name).ok_or_else(|| ToolError::not_found(name))?;

        schema::validate(&tool.input_schema(), &params)
            .map_err(|reason| ToolError::invalid_params(name, reason))?;

        let output = tool.execute(params).await?;
        debug!(tool = name, bytes = output.to_string().len(), "tool returned");
        Ok(output)
    }

    /// Definitions of all registered tools, in name order
    pub fn list_tools(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|t| ToolDefinition::of(t.as_ref())).collect()
    }

    /// Get the number of registered tools
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.tools.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agent_core::ToolErrorKind;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct EchoTool {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Tool for EchoTool {
        async fn execute(&self, params: Value) -> Result<Value, ToolError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(json!({ "echo": params["stock_code"] }))
        }

        fn name(&self) -> &str {
            "echo"
        }

        fn description(&self) -> &str {
            "Echo the stock code"
        }

        fn input_schema(&self) -> Value {
            schema::object(json!({ "stock_code": schema::stock_code() }), &["stock_code"])
        }
    }

    fn registry() -> (ToolRegistry, Arc<EchoTool>) {
        let tool = Arc::new(EchoTool {
            calls: AtomicUsize::new(0),
        });
        (ToolRegistry::new().with_tool(tool.clone()), tool)
    }

    #[tokio::test]
    async fn test_call_validates_then_executes() {
        let (registry, tool) = registry();
        let output = registry
            .call("echo", json!({"stock_code": "600519"}))
            .await
            .unwrap();
        assert_eq!(output["echo"], "600519");
        assert_eq!(tool.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_invalid_params_never_reach_tool() {
        let (registry, tool) = registry();
        let err = registry
            .call("echo", json!({"stock_code": "abc"}))
            .await
            .unwrap_err();
        assert_eq!(err.kind, ToolErrorKind::InvalidParams);
        assert_eq!(tool.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_unknown_tool() {
        let (registry, _) = registry();
        let err = tokio_test::block_on(registry.call("nope", json!({}))).unwrap_err();
        assert_eq!(err.kind, ToolErrorKind::NotFound);
        assert_eq!(err.tool, "nope");
    }

    #[test]
    fn test_list_tools() {
        let (registry, _) = registry();
        assert_eq!(registry.len(), 1);
        let defs = registry.list_tools();
        assert_eq!(defs[0].name, "echo");
        assert!(defs[0].idempotent);
    }
}
