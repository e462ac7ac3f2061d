//! Error types for tool execution.

use thiserror::Error;

use crate::mcp::McpError;
use crate::rag::RagError;

/// Errors that can occur while executing a tool call.
#[derive(Debug, Error)]
pub enum ToolError {
    /// The model asked for a tool that is not registered.
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    /// Arguments were not valid JSON or did not match the schema.
    #[error("Invalid arguments for {tool}: {reason}")]
    InvalidArguments {
        /// Tool name.
        tool: String,
        /// What was wrong.
        reason: String,
    },

    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    HttpRequest(#[from] reqwest::Error),

    /// Remote MCP server failure.
    #[error("MCP error: {0}")]
    Mcp(#[from] McpError),

    /// Retrieval failure.
    #[error("Retrieval error: {0}")]
    Rag(#[from] RagError),

    /// JSON error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience result alias for tools.
pub type ToolResult<T> = Result<T, ToolError>;
