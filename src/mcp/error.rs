//! MCP client and transport errors.

use std::time::Duration;

use thiserror::Error;

/// Errors raised while talking to an MCP server.
#[derive(Debug, Error)]
pub enum McpError {
    /// I/O failure on a stdio transport.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// JSON encoding or decoding failure.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    /// HTTP transport failure.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    /// Server answered with a non-success HTTP status.
    #[error("MCP server returned status {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body.
        body: String,
    },
    /// Server answered with a JSON-RPC error.
    #[error("JSON-RPC error {code}: {message}")]
    Rpc {
        /// JSON-RPC error code.
        code: i32,
        /// Error message.
        message: String,
    },
    /// Child process could not be started.
    #[error("failed to spawn '{command}': {source}")]
    Spawn {
        /// Program that failed to start.
        command: String,
        /// Underlying error.
        source: std::io::Error,
    },
    /// Server did not answer within the request limit.
    #[error("no response within {0:?}")]
    Timeout(Duration),
    /// Transport was closed before a response arrived.
    #[error("transport closed")]
    Closed,
    /// Response did not follow the protocol.
    #[error("protocol error: {0}")]
    Protocol(String),
}

/// Convenience result alias for MCP operations.
pub type McpResult<T> = Result<T, McpError>;
