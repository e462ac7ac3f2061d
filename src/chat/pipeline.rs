//! Tool-calling chat pipeline.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use serde_json::json;
use tracing::{error, info, warn};

use crate::chat::TextStream;
use crate::chat::typewriter::{TYPEWRITER_CHUNK_CHARS, TYPEWRITER_DELAY, typewriter};
use crate::llm::{ChatMessage, ChatModel, ChatRequest, LlmResult, ToolCall, dsml};
use crate::tools::ToolRegistry;

/// One chat turn: optional tool round, then a streamed answer.
pub struct ChatPipeline {
    model: Arc<dyn ChatModel>,
    tools: Arc<ToolRegistry>,
    model_name: String,
    system_prompt: String,
    typewriter_delay: Duration,
}

impl ChatPipeline {
    /// Pipeline over `model` named `model_name`, offering `tools`.
    #[must_use]
    pub fn new(
        model: Arc<dyn ChatModel>,
        tools: Arc<ToolRegistry>,
        model_name: impl Into<String>,
        system_prompt: impl Into<String>,
    ) -> Self {
        Self {
            model,
            tools,
            model_name: model_name.into(),
            system_prompt: system_prompt.into(),
            typewriter_delay: TYPEWRITER_DELAY,
        }
    }

    /// Override the pause between replayed chunks.
    #[must_use]
    pub const fn with_typewriter_delay(mut self, delay: Duration) -> Self {
        self.typewriter_delay = delay;
        self
    }

    /// Tools offered to the model.
    #[must_use]
    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Answer `messages`, running at most one round of tool calls.
    ///
    /// # Errors
    /// Returns an error if a model call fails before the answer starts streaming.
    pub async fn respond(&self, messages: Vec<ChatMessage>) -> LlmResult<TextStream> {
        let mut conversation = Vec::with_capacity(messages.len() + 1);
        conversation.push(ChatMessage::system(self.system_prompt.clone()));
        conversation.extend(messages);

        let request = ChatRequest::new(self.model_name.clone(), conversation.clone())
            .with_tools(self.tools.definitions());
        let reply = self.model.complete(request).await?;

        let (calls, from_dsml) = match reply.structured_tool_calls() {
            Some(calls) => (calls.to_vec(), false),
            None => {
                let parsed = reply
                    .content
                    .as_deref()
                    .map(dsml::parse_tool_calls)
                    .unwrap_or_default();
                (parsed, true)
            }
        };

        if calls.is_empty() {
            let content = reply.content.unwrap_or_default();
            return Ok(typewriter(content, TYPEWRITER_CHUNK_CHARS, self.typewriter_delay));
        }

        if from_dsml {
            info!(calls = calls.len(), "Recovered tool calls from DSML content");
            conversation.push(ChatMessage::assistant(reply.content.unwrap_or_default()));
        } else {
            conversation.push(reply.into_message());
        }

        for call in &calls {
            let output = self.run_tool(call).await;
            conversation.push(ChatMessage::tool(call.id.clone(), output));
        }

        let follow_up = ChatRequest::new(self.model_name.clone(), conversation);
        let mut deltas = self.model.stream(follow_up).await?;

        Ok(Box::pin(async_stream::stream! {
            while let Some(delta) = deltas.next().await {
                match delta {
                    Ok(delta) => {
                        if let Some(content) = delta.content {
                            yield Ok(content);
                        }
                    }
                    Err(err) => {
                        error!(error = %err, "Stream error");
                        yield Err(err);
                        break;
                    }
                }
            }
        }))
    }

    async fn run_tool(&self, call: &ToolCall) -> String {
        match self.tools.invoke(call).await {
            Ok(output) => output,
            Err(err) => {
                warn!(tool = %call.function.name, error = %err, "Tool call failed");
                json!({ "error": err.to_string() }).to_string()
            }
        }
    }
}
