//! Chat completion client on top of the rig DeepSeek provider.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use futures::{Stream, StreamExt};
use reqwest::Client as ReqwestClient;
use rig::OneOrMany;
use rig::client::CompletionClient;
use rig::completion::{self, CompletionModel, Message};
use rig::message::{AssistantContent, Reasoning, Text, ToolCall as RigToolCall, ToolChoice};
use rig::providers::deepseek;
use rig::streaming::StreamedAssistantContent;
use serde_json::Value;
use tracing::debug;

use crate::config::LlmConfig;
use crate::llm::error::{LlmError, LlmResult};
use crate::llm::types::{AssistantMessage, ChatMessage, ChatRequest, Role, StreamDelta, ToolCall, ToolDefinition};

/// Boxed future type for model calls.
pub type ModelFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Boxed stream of completion deltas.
pub type DeltaStream = Pin<Box<dyn Stream<Item = LlmResult<StreamDelta>> + Send>>;

/// Abstraction over a chat completion backend.
pub trait ChatModel: Send + Sync {
    /// Run a non-streaming completion and return the first choice.
    ///
    /// # Errors
    /// Returns an error if the request fails or no choice is returned.
    fn complete(&self, request: ChatRequest) -> ModelFuture<'_, LlmResult<AssistantMessage>>;

    /// Run a streaming completion.
    ///
    /// # Errors
    /// Returns an error if the request cannot be started; later failures are
    /// yielded by the stream.
    fn stream(&self, request: ChatRequest) -> ModelFuture<'_, LlmResult<DeltaStream>>;
}

type DeepSeekClient = deepseek::Client<ReqwestClient>;

/// Chat completion client for DeepSeek and compatible endpoints.
#[derive(Clone)]
pub struct ChatClient {
    client: DeepSeekClient,
    timeout: Duration,
}

impl ChatClient {
    /// Build a client from config.
    ///
    /// # Errors
    /// Returns an error if the API key is missing or the client cannot be built.
    pub fn new(config: &LlmConfig) -> LlmResult<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .ok_or(LlmError::MissingApiKey)?;
        let client = deepseek::Client::<ReqwestClient>::builder()
            .api_key(&api_key)
            .base_url(config.base_url.trim_end_matches('/'))
            .build()?;
        Ok(Self {
            client,
            timeout: config.timeout,
        })
    }
}

/// Build a rig request for `model`; system messages become the preamble.
fn build_request<M: CompletionModel>(
    model: &M,
    request: ChatRequest,
) -> LlmResult<completion::CompletionRequest> {
    debug!(
        model = %request.model,
        messages = request.messages.len(),
        tools = request.tools.as_ref().map_or(0, Vec::len),
        "Sending chat completion request"
    );

    let (preamble, mut history) = to_rig_messages(request.messages);
    let prompt = history.pop().ok_or(LlmError::EmptyConversation)?;

    let mut builder = model.completion_request(prompt).messages(history);
    if let Some(preamble) = preamble {
        builder = builder.preamble(preamble);
    }
    if let Some(tools) = request.tools {
        builder = builder.tools(tools.into_iter().map(to_rig_tool).collect());
    }
    if request.tool_choice.is_some() {
        builder = builder.tool_choice(ToolChoice::Auto);
    }
    if let Some(temperature) = request.temperature {
        builder = builder.temperature(f64::from(temperature));
    }
    Ok(builder.build())
}

impl ChatModel for ChatClient {
    fn complete(&self, request: ChatRequest) -> ModelFuture<'_, LlmResult<AssistantMessage>> {
        Box::pin(async move {
            let model = self.client.completion_model(request.model.clone());
            let request = build_request(&model, request)?;
            let response = tokio::time::timeout(self.timeout, model.completion(request))
                .await
                .map_err(|_| LlmError::Timeout(self.timeout))??;
            let message = to_assistant_message(&response.choice);
            if message.content.is_none() && message.structured_tool_calls().is_none() {
                return Err(LlmError::EmptyResponse);
            }
            Ok(message)
        })
    }

    fn stream(&self, request: ChatRequest) -> ModelFuture<'_, LlmResult<DeltaStream>> {
        Box::pin(async move {
            let model = self.client.completion_model(request.model.clone());
            let request = build_request(&model, request)?;
            let response = tokio::time::timeout(self.timeout, model.stream(request))
                .await
                .map_err(|_| LlmError::Timeout(self.timeout))??;

            let deltas = response.filter_map(|item| async move {
                match item {
                    Ok(content) => stream_delta(content).map(Ok),
                    Err(err) => Some(Err(LlmError::from(err))),
                }
            });
            Ok(with_idle_timeout(deltas, self.timeout))
        })
    }
}

/// End `deltas` with [`LlmError::Timeout`] when no item arrives within `idle`.
///
/// The stream also stops after the first error.
pub fn with_idle_timeout<S>(deltas: S, idle: Duration) -> DeltaStream
where
    S: Stream<Item = LlmResult<StreamDelta>> + Send + 'static,
{
    Box::pin(async_stream::stream! {
        let mut deltas = Box::pin(deltas);
        loop {
            match tokio::time::timeout(idle, deltas.next()).await {
                Ok(Some(Ok(delta))) => yield Ok(delta),
                Ok(Some(Err(err))) => {
                    yield Err(err);
                    return;
                }
                Ok(None) => return,
                Err(_) => {
                    yield Err(LlmError::Timeout(idle));
                    return;
                }
            }
        }
    })
}

fn stream_delta<R: Clone + Unpin>(content: StreamedAssistantContent<R>) -> Option<StreamDelta> {
    let delta = match content {
        StreamedAssistantContent::Text(Text { text }) => StreamDelta::content(text),
        StreamedAssistantContent::ReasoningDelta { reasoning, .. } => StreamDelta::reasoning(reasoning),
        StreamedAssistantContent::Reasoning(Reasoning { reasoning, .. }) => {
            StreamDelta::reasoning(reasoning.concat())
        }
        _ => return None,
    };
    let empty = delta.content.as_deref().is_none_or(str::is_empty)
        && delta.reasoning.as_deref().is_none_or(str::is_empty);
    (!empty).then_some(delta)
}

/// Split system messages into a preamble and map the rest to rig messages.
fn to_rig_messages(messages: Vec<ChatMessage>) -> (Option<String>, Vec<Message>) {
    let mut preamble: Vec<String> = Vec::new();
    let mut history = Vec::with_capacity(messages.len());

    for message in messages {
        match message.role {
            Role::System => preamble.extend(message.content),
            Role::User => history.push(Message::user(message.content.unwrap_or_default())),
            Role::Tool => history.push(Message::tool_result(
                message.tool_call_id.unwrap_or_default(),
                message.content.unwrap_or_default(),
            )),
            Role::Assistant => {
                let mut parts: Vec<AssistantContent> = message
                    .content
                    .filter(|text| !text.is_empty())
                    .map(AssistantContent::text)
                    .into_iter()
                    .collect();
                for call in message.tool_calls.unwrap_or_default() {
                    parts.push(AssistantContent::tool_call(
                        call.id,
                        call.function.name,
                        parse_arguments(call.function.arguments),
                    ));
                }
                let content = OneOrMany::many(parts)
                    .unwrap_or_else(|_| OneOrMany::one(AssistantContent::text("")));
                history.push(Message::Assistant { id: None, content });
            }
        }
    }

    let preamble = (!preamble.is_empty()).then(|| preamble.join("\n\n"));
    (preamble, history)
}

fn parse_arguments(raw: String) -> Value {
    serde_json::from_str(&raw).unwrap_or(Value::String(raw))
}

fn to_rig_tool(tool: ToolDefinition) -> completion::ToolDefinition {
    completion::ToolDefinition {
        name: tool.function.name,
        description: tool.function.description,
        parameters: tool.function.parameters,
    }
}

fn to_assistant_message(choice: &OneOrMany<AssistantContent>) -> AssistantMessage {
    let mut text = String::new();
    let mut reasoning = String::new();
    let mut calls = Vec::new();

    for content in choice.iter() {
        match content {
            AssistantContent::Text(part) => text.push_str(&part.text),
            AssistantContent::ToolCall(RigToolCall { id, function, .. }) => calls.push(ToolCall::function(
                id.clone(),
                function.name.clone(),
                function.arguments.to_string(),
            )),
            AssistantContent::Reasoning(Reasoning { reasoning: parts, .. }) => {
                reasoning.push_str(&parts.concat());
            }
            _ => {}
        }
    }

    AssistantMessage {
        content: (!text.is_empty()).then_some(text),
        tool_calls: (!calls.is_empty()).then_some(calls),
        reasoning_content: (!reasoning.is_empty()).then_some(reasoning),
    }
}
