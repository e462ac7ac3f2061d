//! Exposes tools from a remote MCP server to the chat model.

use std::sync::Arc;

use serde_json::Value;
use tracing::info;

use crate::llm::ToolDefinition;
use crate::mcp::McpClient;
use crate::mcp::protocol::ToolInfo;
use crate::tools::error::ToolResult;
use crate::tools::{Tool, ToolFuture};

/// One remote tool.
pub struct McpTool {
    client: Arc<McpClient>,
    info: ToolInfo,
}

impl McpTool {
    /// Wrap `info` as served by `client`.
    #[must_use]
    pub const fn new(client: Arc<McpClient>, info: ToolInfo) -> Self {
        Self { client, info }
    }
}

impl Tool for McpTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::function(
            self.info.name.clone(),
            self.info.description.clone().unwrap_or_default(),
            self.info.input_schema.clone(),
        )
    }

    fn invoke(&self, arguments: Value) -> ToolFuture<'_, ToolResult<String>> {
        Box::pin(async move {
            let result = self.client.call_tool(&self.info.name, arguments).await?;
            let text = result.joined_text();
            Ok(if result.is_error {
                format!("Error: {text}")
            } else {
                text
            })
        })
    }
}

/// All tools of one connected MCP server.
pub struct McpToolset {
    client: Arc<McpClient>,
    tools: Vec<ToolInfo>,
}

impl McpToolset {
    /// Discover the tools offered by `client`.
    ///
    /// # Errors
    /// Returns an error if `tools/list` fails.
    pub async fn discover(client: McpClient) -> ToolResult<Self> {
        let tools = client.list_tools().await?;
        info!(
            server = %client.name(),
            tools = ?tools.iter().map(|t| t.name.as_str()).collect::<Vec<_>>(),
            "Discovered MCP tools"
        );
        Ok(Self {
            client: Arc::new(client),
            tools,
        })
    }

    /// Wrap every remote tool.
    #[must_use]
    pub fn tools(&self) -> Vec<Arc<dyn Tool>> {
        self.tools
            .iter()
            .map(|info| Arc::new(McpTool::new(Arc::clone(&self.client), info.clone())) as Arc<dyn Tool>)
            .collect()
    }
}
