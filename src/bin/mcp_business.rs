//! Business-data MCP server over streamable HTTP at `/mcp`.
//! Run with: cargo run --bin apex-mcp-business

use std::sync::Arc;

use anyhow::{Context, Result};
use apex_ai::config::load_dotenv;
use apex_ai::mcp::serve_http;
use apex_ai::mcp::toolkits::business_server;
use apex_ai::start_apex_ai::{init_tracing, shutdown_signal};

const DEFAULT_PORT: u16 = 3001;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    load_dotenv();
    let port = match std::env::var("PORT") {
        Ok(raw) => raw.trim().parse().with_context(|| format!("invalid PORT '{raw}'"))?,
        Err(_) => DEFAULT_PORT,
    };
    serve_http(Arc::new(business_server()), port, shutdown_signal())
        .await
        .context("MCP HTTP server failed")
}
