//! Transport-independent MCP server: tool registry and JSON-RPC dispatch.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::mcp::protocol::{
    CallToolParams, CallToolResult, Implementation, InitializeResult, JsonRpcError,
    JsonRpcMessage, JsonRpcRequest, JsonRpcResponse, ListToolsResult, MCP_PROTOCOL_VERSION,
    RequestId, ServerCapabilities, ToolInfo, ToolsCapability, methods,
};

/// Boxed future returned by tool handlers.
pub type HandlerFuture = Pin<Box<dyn Future<Output = Result<CallToolResult, String>> + Send>>;

type Handler = Arc<dyn Fn(Value) -> HandlerFuture + Send + Sync>;

/// A tool exposed by [`McpServer`].
#[derive(Clone)]
pub struct ServerTool {
    info: ToolInfo,
    handler: Handler,
}

impl ServerTool {
    /// Tool over raw JSON arguments. An `Err` becomes an `isError` result.
    pub fn new<F, Fut>(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: Value,
        handler: F,
    ) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<CallToolResult, String>> + Send + 'static,
    {
        Self {
            info: ToolInfo {
                name: name.into(),
                description: Some(description.into()),
                input_schema,
            },
            handler: Arc::new(move |args| -> HandlerFuture { Box::pin(handler(args)) }),
        }
    }

    /// Tool whose arguments are deserialized into `A` before the handler runs.
    pub fn typed<A, F, Fut>(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: Value,
        handler: F,
    ) -> Self
    where
        A: DeserializeOwned + Send + 'static,
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<CallToolResult, String>> + Send + 'static,
    {
        let name = name.into();
        let tool_name = name.clone();
        let handler = Arc::new(handler);
        Self::new(name, description, input_schema, move |args: Value| {
            let handler = Arc::clone(&handler);
            let tool_name = tool_name.clone();
            async move {
                match serde_json::from_value::<A>(args) {
                    Ok(parsed) => (*handler)(parsed).await,
                    Err(err) => Err(format!("Invalid arguments for tool {tool_name}: {err}")),
                }
            }
        })
    }

    /// Advertised tool description.
    #[must_use]
    pub const fn info(&self) -> &ToolInfo {
        &self.info
    }
}

/// MCP server state shared by the stdio and HTTP front ends.
pub struct McpServer {
    info: Implementation,
    tools: Vec<ServerTool>,
}

impl McpServer {
    /// Server with no tools.
    #[must_use]
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            info: Implementation {
                name: name.into(),
                version: version.into(),
            },
            tools: Vec::new(),
        }
    }

    /// Add a tool, builder style.
    #[must_use]
    pub fn with_tool(mut self, tool: ServerTool) -> Self {
        self.register(tool);
        self
    }

    /// Add a tool, replacing any tool with the same name.
    pub fn register(&mut self, tool: ServerTool) {
        if let Some(existing) = self.tools.iter_mut().find(|t| t.info.name == tool.info.name) {
            *existing = tool;
        } else {
            self.tools.push(tool);
        }
    }

    /// Server identity.
    #[must_use]
    pub const fn info(&self) -> &Implementation {
        &self.info
    }

    /// Registered tools, in registration order.
    #[must_use]
    pub fn tools(&self) -> Vec<ToolInfo> {
        self.tools.iter().map(|tool| tool.info.clone()).collect()
    }

    /// Handle a raw JSON payload. Returns `None` for notifications.
    pub async fn handle_value(&self, value: Value) -> Option<JsonRpcResponse> {
        match JsonRpcMessage::from_value(value) {
            Ok(message) => self.handle_message(message).await,
            Err((id, error)) => Some(JsonRpcResponse::error(id, error)),
        }
    }

    /// Handle a classified message. Returns `None` for notifications.
    pub async fn handle_message(&self, message: JsonRpcMessage) -> Option<JsonRpcResponse> {
        match message {
            JsonRpcMessage::Request(request) => Some(self.handle_request(request).await),
            JsonRpcMessage::Notification(notification) => {
                debug!(method = %notification.method, "MCP notification");
                None
            }
        }
    }

    /// Dispatch one request.
    pub async fn handle_request(&self, request: JsonRpcRequest) -> JsonRpcResponse {
        let id = request.id.clone();
        match self.dispatch(request).await {
            Ok(result) => JsonRpcResponse::success(id, result),
            Err(error) => JsonRpcResponse::error(id, error),
        }
    }

    async fn dispatch(&self, request: JsonRpcRequest) -> Result<Value, JsonRpcError> {
        match request.method.as_str() {
            methods::INITIALIZE => {
                let result = InitializeResult {
                    protocol_version: MCP_PROTOCOL_VERSION.to_string(),
                    capabilities: ServerCapabilities {
                        tools: Some(ToolsCapability {
                            list_changed: false,
                        }),
                    },
                    server_info: self.info.clone(),
                };
                to_value(&result)
            }
            methods::PING => Ok(json!({})),
            methods::TOOLS_LIST => to_value(&ListToolsResult {
                tools: self.tools(),
                next_cursor: None,
            }),
            methods::TOOLS_CALL => {
                let params: CallToolParams = request
                    .params
                    .ok_or_else(|| JsonRpcError::invalid_params("Missing params"))
                    .and_then(|params| {
                        serde_json::from_value(params)
                            .map_err(|err| JsonRpcError::invalid_params(err.to_string()))
                    })?;
                let result = self.call_tool(&params.name, params.arguments).await?;
                to_value(&result)
            }
            other => Err(JsonRpcError::method_not_found(other)),
        }
    }

    async fn call_tool(
        &self,
        name: &str,
        arguments: Option<Value>,
    ) -> Result<CallToolResult, JsonRpcError> {
        let tool = self
            .tools
            .iter()
            .find(|tool| tool.info.name == name)
            .ok_or_else(|| JsonRpcError::invalid_params(format!("Tool {name} not found")))?;

        let arguments = arguments.unwrap_or_else(|| json!({}));
        match (tool.handler.as_ref())(arguments).await {
            Ok(result) => Ok(result),
            Err(message) => {
                warn!(tool = %name, error = %message, "Tool call failed");
                Ok(CallToolResult::error(message))
            }
        }
    }
}

fn to_value<T: serde::Serialize>(value: &T) -> Result<Value, JsonRpcError> {
    serde_json::to_value(value).map_err(|err| JsonRpcError::internal_error(err.to_string()))
}

/// Response for a line or body that is not valid JSON.
#[must_use]
pub fn parse_error_response(error: &serde_json::Error) -> JsonRpcResponse {
    JsonRpcResponse::error(
        RequestId::Null,
        JsonRpcError::parse_error(format!("Parse error: {error}")),
    )
}
