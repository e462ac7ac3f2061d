//! Fallback parser for DeepSeek's textual tool-call markup (DSML).
//!
//! Some responses carry the tool call inside `content` instead of the
//! structured `tool_calls` field:
//!
//! ```text
//! <｜DSML｜function_calls>
//! <｜DSML｜invoke name="get_weather">
//! <｜DSML｜parameter name="city" string="true">Beijing</｜DSML｜parameter>
//! </｜DSML｜invoke>
//! </｜DSML｜function_calls>
//! ```

use std::sync::LazyLock;

use rand::Rng;
use rand::distributions::Alphanumeric;
use regex::Regex;
use serde_json::{Map, Value};

use crate::llm::types::ToolCall;

/// Marker that opens a DSML tool-call block.
pub const DSML_MARKER: &str = "<｜DSML｜function_calls>";

#[allow(clippy::expect_used)]
static INVOKE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)<｜DSML｜invoke\s+name="([^"]+)"\s*>(.*?)(?:</｜DSML｜invoke>|$)"#)
        .expect("DSML invoke pattern is valid")
});

#[allow(clippy::expect_used)]
static PARAMETER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?s)<｜DSML｜parameter\s+name="([^"]+)"(?:\s+string="(true|false)")?\s*>(.*?)</｜DSML｜parameter>"#,
    )
    .expect("DSML parameter pattern is valid")
});

/// Whether `content` contains a DSML tool-call block.
#[must_use]
pub fn contains_dsml(content: &str) -> bool {
    content.contains(DSML_MARKER)
}

/// Extract tool calls from DSML markup.
///
/// Returns an empty list when the marker is absent or no named invoke is found.
#[must_use]
pub fn parse_tool_calls(content: &str) -> Vec<ToolCall> {
    if !contains_dsml(content) {
        return Vec::new();
    }

    INVOKE_RE
        .captures_iter(content)
        .filter_map(|invoke| {
            let name = invoke.get(1)?.as_str().trim();
            if name.is_empty() {
                return None;
            }
            let body = invoke.get(2).map_or("", |m| m.as_str());

            let mut arguments = Map::new();
            for param in PARAMETER_RE.captures_iter(body) {
                let Some(key) = param.get(1) else { continue };
                let raw = param.get(3).map_or("", |m| m.as_str()).trim();
                let is_string = param.get(2).is_none_or(|m| m.as_str() == "true");
                let value = if is_string {
                    Value::String(raw.to_string())
                } else {
                    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
                };
                arguments.insert(key.as_str().to_string(), value);
            }

            Some(ToolCall::function(
                generate_call_id(),
                name,
                Value::Object(arguments).to_string(),
            ))
        })
        .collect()
}

/// Random id in the `call_xxxxxxx` shape used for synthesized calls.
#[must_use]
pub fn generate_call_id() -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(7)
        .map(|b| char::from(b).to_ascii_lowercase())
        .collect();
    format!("call_{suffix}")
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    const SAMPLE: &str = "Let me check.\n<｜DSML｜function_calls>\n<｜DSML｜invoke name=\"get_weather\">\n<｜DSML｜parameter name=\"city\" string=\"true\">\n  Beijing \n</｜DSML｜parameter>\n</｜DSML｜invoke>\n</｜DSML｜function_calls>";

    fn args(call: &ToolCall) -> Value {
        serde_json::from_str(&call.function.arguments).unwrap_or_default()
    }

    #[test]
    fn test_parses_weather_call() {
        let calls = parse_tool_calls(SAMPLE);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].function.name, "get_weather");
        assert_eq!(calls[0].kind, "function");
        assert_eq!(args(&calls[0]), json!({"city": "Beijing"}));
        assert!(calls[0].id.starts_with("call_"));
        assert_eq!(calls[0].id.len(), "call_".len() + 7);
    }

    #[test]
    fn test_non_string_parameters_are_json() {
        let content = "<｜DSML｜function_calls><｜DSML｜invoke name=\"add\"><｜DSML｜parameter name=\"a\" string=\"false\">2</｜DSML｜parameter><｜DSML｜parameter name=\"b\" string=\"false\">3.5</｜DSML｜parameter></｜DSML｜invoke></｜DSML｜function_calls>";
        let calls = parse_tool_calls(content);
        assert_eq!(calls.len(), 1);
        assert_eq!(args(&calls[0]), json!({"a": 2, "b": 3.5}));
    }

    #[test]
    fn test_multiple_invokes() {
        let content = "<｜DSML｜function_calls><｜DSML｜invoke name=\"a\"></｜DSML｜invoke><｜DSML｜invoke name=\"b\"></｜DSML｜invoke></｜DSML｜function_calls>";
        let names: Vec<String> = parse_tool_calls(content)
            .into_iter()
            .map(|c| c.function.name)
            .collect();
        assert_eq!(names, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_plain_content_has_no_calls() {
        assert!(parse_tool_calls("It is sunny in Paris.").is_empty());
        assert!(parse_tool_calls("<｜DSML｜function_calls> but nothing else").is_empty());
    }
}
