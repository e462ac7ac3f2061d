//! Drives the `apex-mcp-math` binary over stdio with the library client.

use apex_ai::mcp::{McpClient, StdioTransport};
use serde_json::json;

async fn math_client() -> McpClient {
    let Ok(transport) = StdioTransport::spawn(env!("CARGO_BIN_EXE_apex-mcp-math"), &[]) else {
        panic!("failed to spawn apex-mcp-math")
    };
    match McpClient::connect("math", Box::new(transport)).await {
        Ok(client) => client,
        Err(e) => panic!("handshake failed: {e}"),
    }
}

#[tokio::test]
async fn test_math_server_lists_tools() {
    let client = math_client().await;
    assert_eq!(client.server_info().name, "mcp-math");

    let tools = client.list_tools().await.unwrap_or_default();
    let names: Vec<&str> = tools.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["add", "subtract", "multiply", "divide"]);
}

#[tokio::test]
async fn test_math_server_calls() {
    let client = math_client().await;

    let sum = client.call_tool("add", json!({"a": 2, "b": 3})).await.unwrap_or_default();
    assert_eq!(sum.joined_text(), "5");
    assert!(!sum.is_error);

    let quotient = client.call_tool("divide", json!({"a": 1, "b": 4})).await.unwrap_or_default();
    assert_eq!(quotient.joined_text(), "0.25");

    let by_zero = client.call_tool("divide", json!({"a": 1, "b": 0})).await.unwrap_or_default();
    assert!(by_zero.is_error);
    assert_eq!(by_zero.joined_text(), "Division by zero is not allowed");

    assert!(client.ping().await.is_ok());
    assert!(client.close().await.is_ok());
}
