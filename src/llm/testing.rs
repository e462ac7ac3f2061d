//! Scripted `ChatModel` used by unit tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use crate::llm::client::{ChatModel, DeltaStream, ModelFuture};
use crate::llm::error::{LlmError, LlmResult};
use crate::llm::types::{AssistantMessage, ChatRequest, StreamDelta};

/// Replays queued answers and records every request it receives.
#[derive(Default)]
pub(crate) struct ScriptedModel {
    completions: Mutex<VecDeque<LlmResult<AssistantMessage>>>,
    streams: Mutex<VecDeque<Vec<LlmResult<StreamDelta>>>>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedModel {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_completion(self, message: AssistantMessage) -> Self {
        if let Ok(mut queue) = self.completions.lock() {
            queue.push_back(Ok(message));
        }
        self
    }

    pub(crate) fn with_completion_error(self, error: LlmError) -> Self {
        if let Ok(mut queue) = self.completions.lock() {
            queue.push_back(Err(error));
        }
        self
    }

    pub(crate) fn with_stream(self, deltas: Vec<LlmResult<StreamDelta>>) -> Self {
        if let Ok(mut queue) = self.streams.lock() {
            queue.push_back(deltas);
        }
        self
    }

    pub(crate) fn requests(&self) -> Vec<ChatRequest> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }

    fn record(&self, request: ChatRequest) {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request);
        }
    }
}

impl ChatModel for ScriptedModel {
    fn complete(&self, request: ChatRequest) -> ModelFuture<'_, LlmResult<AssistantMessage>> {
        self.record(request);
        let next = self
            .completions
            .lock()
            .ok()
            .and_then(|mut queue| queue.pop_front());
        Box::pin(async move { next.unwrap_or(Err(LlmError::EmptyResponse)) })
    }

    fn stream(&self, request: ChatRequest) -> ModelFuture<'_, LlmResult<DeltaStream>> {
        self.record(request);
        let next = self
            .streams
            .lock()
            .ok()
            .and_then(|mut queue| queue.pop_front());
        Box::pin(async move {
            let deltas = next.ok_or(LlmError::EmptyResponse)?;
            let stream: DeltaStream = Box::pin(futures::stream::iter(deltas));
            Ok(stream)
        })
    }
}
