//! `mcp-math`: four arithmetic tools.

use serde::Deserialize;
use serde_json::{Value, json};

use crate::mcp::protocol::CallToolResult;
use crate::mcp::server::{McpServer, ServerTool};

/// Server name reported during `initialize`.
pub const MATH_SERVER_NAME: &str = "mcp-math";

#[derive(Debug, Deserialize)]
struct Operands {
    a: f64,
    b: f64,
}

fn operands_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "a": {"type": "number", "description": "First number"},
            "b": {"type": "number", "description": "Second number"}
        },
        "required": ["a", "b"]
    })
}

fn binary_tool(name: &str, description: &str, op: fn(f64, f64) -> f64) -> ServerTool {
    ServerTool::typed(name, description, operands_schema(), move |args: Operands| async move {
        Ok(CallToolResult::text(format_number(op(args.a, args.b))))
    })
}

/// Build the math server.
#[must_use]
pub fn math_server() -> McpServer {
    McpServer::new(MATH_SERVER_NAME, "1.0.0")
        .with_tool(binary_tool("add", "Add two numbers", |a, b| a + b))
        .with_tool(binary_tool("subtract", "Subtract two numbers (a - b)", |a, b| a - b))
        .with_tool(binary_tool("multiply", "Multiply two numbers", |a, b| a * b))
        .with_tool(ServerTool::typed(
            "divide",
            "Divide two numbers (a / b)",
            operands_schema(),
            |args: Operands| async move {
                if args.b == 0.0 {
                    return Ok(CallToolResult::error("Division by zero is not allowed"));
                }
                Ok(CallToolResult::text(format_number(args.a / args.b)))
            },
        ))
}

/// Render a number the way JavaScript's `String(n)` does.
#[must_use]
pub fn format_number(value: f64) -> String {
    if value.is_nan() {
        return "NaN".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if value == 0.0 {
        return "0".to_string();
    }

    let magnitude = value.abs();
    if !(1e-6..1e21).contains(&magnitude) {
        let formatted = format!("{value:e}");
        return match formatted.split_once('e') {
            Some((mantissa, exponent)) if !exponent.starts_with('-') => {
                format!("{mantissa}e+{exponent}")
            }
            _ => formatted,
        };
    }
    if value.fract() == 0.0 {
        return format!("{value:.0}");
    }
    value.to_string()
}
