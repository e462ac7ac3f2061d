//! OpenAI-compatible LLM access: wire types, streaming client, DSML fallback.

pub mod client;
pub mod dsml;
pub mod error;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use client::{ChatClient, ChatModel, DeltaStream, ModelFuture, with_idle_timeout};
pub use error::{LlmError, LlmResult};
pub use types::{
    AssistantMessage, ChatMessage, ChatRequest, FunctionCall, FunctionDefinition, Role,
    StreamDelta, ToolCall, ToolDefinition,
};
