//! Chat messages and requests shared by the pipeline and model backends.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Message author role.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System instructions.
    System,
    /// End user.
    User,
    /// Model output.
    Assistant,
    /// Tool result.
    Tool,
}

impl Role {
    /// Map a loosely-typed role string; anything unknown is treated as the user.
    #[must_use]
    pub fn from_lenient(role: &str) -> Self {
        match role {
            "system" => Self::System,
            "assistant" => Self::Assistant,
            "tool" => Self::Tool,
            _ => Self::User,
        }
    }
}

/// A single chat message.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Author role.
    pub role: Role,
    /// Text content (may be null on assistant tool-call messages).
    #[serde(default)]
    pub content: Option<String>,
    /// Tool calls requested by the assistant.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    /// Id of the call a tool message answers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    fn text(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    /// System message.
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self::text(Role::System, content)
    }

    /// User message.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self::text(Role::User, content)
    }

    /// Assistant message with plain text.
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::text(Role::Assistant, content)
    }

    /// Tool result answering `tool_call_id`.
    #[must_use]
    pub fn tool(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: Some(tool_call_id.into()),
        }
    }
}

/// Function invocation inside a tool call.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionCall {
    /// Function name.
    pub name: String,
    /// JSON-encoded arguments.
    #[serde(default)]
    pub arguments: String,
}

/// A tool call requested by the model.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Call id echoed back in the tool message.
    pub id: String,
    /// Always `function`.
    #[serde(rename = "type", default = "function_type")]
    pub kind: String,
    /// Function to call.
    pub function: FunctionCall,
}

fn function_type() -> String {
    "function".to_string()
}

impl ToolCall {
    /// Build a function tool call.
    #[must_use]
    pub fn function(id: impl Into<String>, name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: function_type(),
            function: FunctionCall {
                name: name.into(),
                arguments: arguments.into(),
            },
        }
    }
}

/// Function schema offered to the model.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FunctionDefinition {
    /// Function name.
    pub name: String,
    /// What the function does.
    pub description: String,
    /// JSON schema of the arguments.
    pub parameters: Value,
}

/// Tool offered to the model.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Always `function`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Function schema.
    pub function: FunctionDefinition,
}

impl ToolDefinition {
    /// Build a function tool definition.
    #[must_use]
    pub fn function(name: impl Into<String>, description: impl Into<String>, parameters: Value) -> Self {
        Self {
            kind: function_type(),
            function: FunctionDefinition {
                name: name.into(),
                description: description.into(),
                parameters,
            },
        }
    }

    /// Function name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.function.name
    }
}

/// Provider-neutral chat completion request.
#[derive(Clone, Debug, Serialize)]
pub struct ChatRequest {
    /// Model name.
    pub model: String,
    /// Conversation so far.
    pub messages: Vec<ChatMessage>,
    /// Tools offered to the model.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ToolDefinition>>,
    /// Tool choice policy.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<String>,
    /// Sampling temperature.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

impl ChatRequest {
    /// Request for `model` over `messages`.
    #[must_use]
    pub fn new(model: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            model: model.into(),
            messages,
            tools: None,
            tool_choice: None,
            temperature: None,
        }
    }

    /// Offer tools with `tool_choice: auto`; an empty list offers none.
    #[must_use]
    pub fn with_tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        if tools.is_empty() {
            self.tools = None;
            self.tool_choice = None;
        } else {
            self.tools = Some(tools);
            self.tool_choice = Some("auto".to_string());
        }
        self
    }

    /// Set the sampling temperature.
    #[must_use]
    pub const fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

/// Assistant message returned by a non-streaming completion.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct AssistantMessage {
    /// Text content.
    #[serde(default)]
    pub content: Option<String>,
    /// Structured tool calls.
    #[serde(default)]
    pub tool_calls: Option<Vec<ToolCall>>,
    /// Reasoning trace (reasoner models only).
    #[serde(default)]
    pub reasoning_content: Option<String>,
}

impl AssistantMessage {
    /// Structured tool calls, if any were returned.
    #[must_use]
    pub fn structured_tool_calls(&self) -> Option<&[ToolCall]> {
        self.tool_calls.as_deref().filter(|calls| !calls.is_empty())
    }

    /// Convert into a conversation message, keeping tool calls.
    #[must_use]
    pub fn into_message(self) -> ChatMessage {
        ChatMessage {
            role: Role::Assistant,
            content: self.content,
            tool_calls: self.tool_calls.filter(|calls| !calls.is_empty()),
            tool_call_id: None,
        }
    }
}

/// One increment of a streamed completion.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StreamDelta {
    /// Answer text.
    pub content: Option<String>,
    /// Reasoning text.
    pub reasoning: Option<String>,
}

impl StreamDelta {
    /// Delta carrying answer text only.
    #[must_use]
    pub fn content(text: impl Into<String>) -> Self {
        Self {
            content: Some(text.into()),
            reasoning: None,
        }
    }

    /// Delta carrying reasoning text only.
    #[must_use]
    pub fn reasoning(text: impl Into<String>) -> Self {
        Self {
            content: None,
            reasoning: Some(text.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_request_serialization_omits_empty_tools() {
        let request = ChatRequest::new("deepseek-chat", vec![ChatMessage::user("hi")])
            .with_tools(Vec::new());
        let value = serde_json::to_value(&request).unwrap_or_default();
        assert!(value.get("tools").is_none());
        assert!(value.get("tool_choice").is_none());
        assert_eq!(value["messages"][0], json!({"role": "user", "content": "hi"}));
    }

    #[test]
    fn test_tool_message_shape() {
        let value = serde_json::to_value(ChatMessage::tool("call_1", "{}")).unwrap_or_default();
        assert_eq!(
            value,
            json!({"role": "tool", "content": "{}", "tool_call_id": "call_1"})
        );
    }

    #[test]
    fn test_lenient_roles() {
        assert_eq!(Role::from_lenient("assistant"), Role::Assistant);
        assert_eq!(Role::from_lenient("system"), Role::System);
        assert_eq!(Role::from_lenient("ai"), Role::User);
    }

    #[test]
    fn test_assistant_message_keeps_tool_calls() {
        let message: AssistantMessage = serde_json::from_value(json!({
            "role": "assistant",
            "content": null,
            "tool_calls": [{
                "id": "call_abc",
                "type": "function",
                "function": {"name": "get_weather", "arguments": "{\"city\":\"Paris\"}"}
            }]
        }))
        .unwrap_or_default();
        assert_eq!(message.structured_tool_calls().map(<[ToolCall]>::len), Some(1));
        let converted = message.into_message();
        assert_eq!(converted.role, Role::Assistant);
        assert!(converted.content.is_none());
        assert_eq!(converted.tool_calls.map(|c| c.len()), Some(1));
    }
}
