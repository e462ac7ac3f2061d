//! MCP client: handshake, tool discovery and tool calls over any transport.

use std::sync::atomic::{AtomicI64, Ordering};

use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::{debug, info};

use crate::mcp::error::{McpError, McpResult};
use crate::mcp::protocol::{
    CallToolParams, CallToolResult, Implementation, InitializeResult, JsonRpcNotification,
    JsonRpcRequest, ListToolsResult, MCP_PROTOCOL_VERSION, RequestId, ToolInfo, methods,
};
use crate::mcp::transport::McpTransport;

/// Client name sent during `initialize`.
pub const CLIENT_NAME: &str = "apex-ai";

/// A connected MCP session.
pub struct McpClient {
    name: String,
    transport: Box<dyn McpTransport>,
    next_id: AtomicI64,
    server_info: Implementation,
}

impl McpClient {
    /// Perform the `initialize` handshake over `transport`.
    ///
    /// # Errors
    /// Returns an error if the handshake fails.
    pub async fn connect(name: impl Into<String>, transport: Box<dyn McpTransport>) -> McpResult<Self> {
        let name = name.into();
        let mut client = Self {
            name,
            transport,
            next_id: AtomicI64::new(1),
            server_info: Implementation {
                name: String::new(),
                version: String::new(),
            },
        };

        let init: InitializeResult = client
            .call(
                methods::INITIALIZE,
                Some(json!({
                    "protocolVersion": MCP_PROTOCOL_VERSION,
                    "capabilities": {},
                    "clientInfo": {
                        "name": CLIENT_NAME,
                        "version": env!("CARGO_PKG_VERSION"),
                    },
                })),
            )
            .await?;
        client
            .transport
            .notify(JsonRpcNotification::new(methods::INITIALIZED, None))
            .await?;

        info!(
            server = %client.name,
            remote = %init.server_info.name,
            version = %init.server_info.version,
            protocol = %init.protocol_version,
            "Connected to MCP server"
        );
        client.server_info = init.server_info;
        Ok(client)
    }

    /// Configured display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Identity reported by the server.
    #[must_use]
    pub const fn server_info(&self) -> &Implementation {
        &self.server_info
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: Option<Value>) -> McpResult<T> {
        let id = RequestId::Number(self.next_id.fetch_add(1, Ordering::SeqCst));
        debug!(server = %self.name, method = %method, id = ?id, "MCP request");
        let response = self
            .transport
            .request(JsonRpcRequest::new(id, method, params))
            .await?;

        if let Some(error) = response.error {
            return Err(McpError::Rpc {
                code: error.code,
                message: error.message,
            });
        }
        let result = response
            .result
            .ok_or_else(|| McpError::Protocol(format!("empty result for {method}")))?;
        Ok(serde_json::from_value(result)?)
    }

    /// Liveness check.
    ///
    /// # Errors
    /// Returns an error if the server does not answer.
    pub async fn ping(&self) -> McpResult<()> {
        let _: Value = self.call(methods::PING, None).await?;
        Ok(())
    }

    /// Tools offered by the server.
    ///
    /// # Errors
    /// Returns an error if the request fails.
    pub async fn list_tools(&self) -> McpResult<Vec<ToolInfo>> {
        let result: ListToolsResult = self.call(methods::TOOLS_LIST, None).await?;
        Ok(result.tools)
    }

    /// Invoke a tool.
    ///
    /// # Errors
    /// Returns an error if the request fails; tool-level failures come back
    /// as a result with `is_error` set.
    pub async fn call_tool(&self, name: &str, arguments: Value) -> McpResult<CallToolResult> {
        let params = CallToolParams {
            name: name.to_string(),
            arguments: Some(arguments),
        };
        self.call(methods::TOOLS_CALL, Some(serde_json::to_value(params)?))
            .await
    }

    /// Close the underlying transport.
    ///
    /// # Errors
    /// Returns an error if shutdown fails.
    pub async fn close(&self) -> McpResult<()> {
        self.transport.close().await
    }
}
