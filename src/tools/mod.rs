//! Tools the chat model may call, and the registry that dispatches them.
//!
//! - `weather`: open-meteo geocoding + forecast
//! - `recipe`: vector search over the recipe corpus
//! - `mcp`: tools discovered on external MCP servers
//! - `cache`: TTL cache used by the weather tool

pub mod cache;
pub mod error;
pub mod mcp;
pub mod recipe;
pub mod weather;

pub use cache::TtlCache;
pub use error::{ToolError, ToolResult};
pub use mcp::{McpTool, McpToolset};
pub use recipe::RecipeSearchTool;
pub use weather::WeatherTool;

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::Value;
use tracing::{info, warn};

use crate::llm::{ToolCall, ToolDefinition};

/// Boxed future type for tool invocations.
pub type ToolFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A callable tool.
pub trait Tool: Send + Sync {
    /// Schema advertised to the model.
    fn definition(&self) -> ToolDefinition;

    /// Run the tool and return the text handed back to the model.
    ///
    /// # Errors
    /// Returns an error if the tool cannot produce a result.
    fn invoke(&self, arguments: Value) -> ToolFuture<'_, ToolResult<String>>;
}

/// Name-indexed set of tools, in registration order.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    order: Vec<String>,
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. A later tool with the same name replaces the earlier one.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.definition().function.name;
        if self.tools.insert(name.clone(), tool).is_some() {
            warn!(tool = %name, "Replacing previously registered tool");
        } else {
            self.order.push(name);
        }
    }

    /// Number of registered tools.
    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether no tools are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Whether a tool with `name` is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Definitions of all tools, in registration order.
    #[must_use]
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.order
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(|tool| tool.definition())
            .collect()
    }

    /// Execute a tool call requested by the model.
    ///
    /// # Errors
    /// Returns an error for unknown tools, malformed arguments, or tool failures.
    pub async fn invoke(&self, call: &ToolCall) -> ToolResult<String> {
        let name = call.function.name.as_str();
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;

        let raw = call.function.arguments.trim();
        let arguments = if raw.is_empty() {
            Value::Object(serde_json::Map::new())
        } else {
            serde_json::from_str(raw).map_err(|err| ToolError::InvalidArguments {
                tool: name.to_string(),
                reason: err.to_string(),
            })?
        };

        info!(tool = %name, call_id = %call.id, "Calling tool");
        tool.invoke(arguments).await
    }
}

/// Read a required string argument.
pub(crate) fn required_str(tool: &str, arguments: &Value, key: &str) -> ToolResult<String> {
    arguments
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .ok_or_else(|| ToolError::InvalidArguments {
            tool: tool.to_string(),
            reason: format!("missing string argument '{key}'"),
        })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    struct Echo;

    impl Tool for Echo {
        fn definition(&self) -> ToolDefinition {
            ToolDefinition::function("echo", "Echo the text argument", json!({
                "type": "object",
                "properties": {"text": {"type": "string"}},
                "required": ["text"]
            }))
        }

        fn invoke(&self, arguments: Value) -> ToolFuture<'_, ToolResult<String>> {
            Box::pin(async move { required_str("echo", &arguments, "text") })
        }
    }

    #[tokio::test]
    async fn test_registry_dispatch() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(Echo));
        assert_eq!(registry.len(), 1);
        assert!(registry.contains("echo"));
        assert_eq!(registry.definitions()[0].name(), "echo");

        let call = ToolCall::function("call_1", "echo", r#"{"text":"hello"}"#);
        let output = registry.invoke(&call).await.unwrap_or_default();
        assert_eq!(output, "hello");
    }

    #[tokio::test]
    async fn test_registry_errors() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(Echo));

        let unknown = ToolCall::function("call_1", "missing", "{}");
        assert!(matches!(
            registry.invoke(&unknown).await,
            Err(ToolError::UnknownTool(name)) if name == "missing"
        ));

        let malformed = ToolCall::function("call_2", "echo", "{not json");
        assert!(matches!(
            registry.invoke(&malformed).await,
            Err(ToolError::InvalidArguments { .. })
        ));

        let empty = ToolCall::function("call_3", "echo", "");
        assert!(matches!(
            registry.invoke(&empty).await,
            Err(ToolError::InvalidArguments { .. })
        ));
    }

    #[test]
    fn test_register_replaces_by_name() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(Echo));
        registry.register(Arc::new(Echo));
        assert_eq!(registry.len(), 1);
    }
}
