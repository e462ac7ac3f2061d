//! Line-delimited JSON-RPC over stdin/stdout.

use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, info};

use crate::mcp::server::{McpServer, parse_error_response};

/// Serve `server` on the process's stdin and stdout until stdin closes.
///
/// Logs must go to stderr while this runs.
///
/// # Errors
/// Returns an error if stdin or stdout fails.
pub async fn serve_stdio(server: &McpServer) -> std::io::Result<()> {
    info!(name = %server.info().name, "MCP server running on stdio");
    serve_lines(
        server,
        BufReader::new(tokio::io::stdin()),
        tokio::io::stdout(),
    )
    .await
}

/// Serve one JSON message per line from `reader`, answering on `writer`.
///
/// # Errors
/// Returns an error on I/O failure.
pub async fn serve_lines<R, W>(server: &McpServer, reader: R, mut writer: W) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = reader.lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<Value>(line) {
            Ok(value) => server.handle_value(value).await,
            Err(err) => {
                debug!(error = %err, "Unparseable MCP line");
                Some(parse_error_response(&err))
            }
        };

        if let Some(response) = response {
            let mut payload = serde_json::to_vec(&response)?;
            payload.push(b'\n');
            writer.write_all(&payload).await?;
            writer.flush().await?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::mcp::toolkits::math_server;

    #[tokio::test]
    async fn test_serve_lines() {
        let input = concat!(
            "{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"initialize\",\"params\":{}}\n",
            "{\"jsonrpc\":\"2.0\",\"method\":\"notifications/initialized\"}\n",
            "\n",
            "not json\n",
            "{\"jsonrpc\":\"2.0\",\"id\":2,\"method\":\"tools/call\",\"params\":{\"name\":\"add\",\"arguments\":{\"a\":2,\"b\":3}}}\n",
        );
        let mut output = Vec::new();
        let result = serve_lines(&math_server(), input.as_bytes(), &mut output).await;
        assert!(result.is_ok());

        let responses: Vec<Value> = String::from_utf8_lossy(&output)
            .lines()
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect();
        assert_eq!(responses.len(), 3);
        assert_eq!(responses[0]["result"]["serverInfo"]["name"], "mcp-math");
        assert_eq!(responses[1]["error"]["code"], -32700);
        assert_eq!(responses[1]["id"], Value::Null);
        assert_eq!(responses[2]["result"]["content"][0], json!({"type": "text", "text": "5"}));
    }
}
