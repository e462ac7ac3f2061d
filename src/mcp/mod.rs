//! Model Context Protocol: wire types, a client for external tool servers,
//! and a small server used by the bundled toolkits.

pub mod client;
pub mod error;
pub mod http;
pub mod protocol;
pub mod server;
pub mod stdio;
pub mod toolkits;
pub mod transport;

pub use client::McpClient;
pub use error::{McpError, McpResult};
pub use http::{http_router, serve_http};
pub use server::{McpServer, ServerTool};
pub use stdio::serve_stdio;
pub use transport::{HttpTransport, McpFuture, McpTransport, StdioTransport};

use crate::config::{McpServerEntry, McpTarget};

/// Open a transport for a configured server and complete the handshake.
///
/// # Errors
/// Returns an error if the server cannot be started or reached.
pub async fn connect(entry: &McpServerEntry) -> McpResult<McpClient> {
    let transport: Box<dyn McpTransport> = match &entry.target {
        McpTarget::Stdio { command, args } => Box::new(StdioTransport::spawn(command, args)?),
        McpTarget::Http { url } => Box::new(HttpTransport::new(url.clone())?),
    };
    McpClient::connect(entry.name.clone(), transport).await
}
