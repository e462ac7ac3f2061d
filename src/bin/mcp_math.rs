//! Arithmetic MCP server over stdio. Logs go to stderr.
//! Run with: cargo run --bin apex-mcp-math

use anyhow::{Context, Result};
use apex_ai::mcp::serve_stdio;
use apex_ai::mcp::toolkits::math_server;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    serve_stdio(&math_server()).await.context("stdio transport failed")
}
