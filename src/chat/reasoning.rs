//! Reasoning-model streaming with `<think>` framing.

use futures::StreamExt;
use tracing::error;

use crate::chat::TextStream;
use crate::llm::{ChatMessage, ChatModel, ChatRequest, LlmResult, Role, StreamDelta};

const THINK_OPEN: &str = "<think>\n";
const THINK_CLOSE: &str = "\n</think>\n";

/// Wraps reasoning deltas in `<think>` tags ahead of the answer text.
#[derive(Debug, Default)]
pub struct ThinkTagger {
    started: bool,
    finished: bool,
}

impl ThinkTagger {
    /// New tagger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Text to emit for one delta.
    pub fn push(&mut self, delta: &StreamDelta) -> String {
        let mut out = String::new();
        if let Some(reasoning) = delta.reasoning.as_deref().filter(|r| !r.is_empty()) {
            if !self.started {
                out.push_str(THINK_OPEN);
                self.started = true;
            }
            out.push_str(reasoning);
        }
        if let Some(content) = delta.content.as_deref().filter(|c| !c.is_empty()) {
            if self.started && !self.finished {
                out.push_str(THINK_CLOSE);
                self.finished = true;
            }
            out.push_str(content);
        }
        out
    }

    /// Closing tag if reasoning never gave way to content.
    pub fn finish(&mut self) -> Option<&'static str> {
        if self.started && !self.finished {
            self.finished = true;
            return Some(THINK_CLOSE);
        }
        None
    }
}

/// Map client-supplied messages onto the roles a reasoner accepts.
#[must_use]
pub fn reasoning_messages(messages: Vec<ChatMessage>) -> Vec<ChatMessage> {
    messages
        .into_iter()
        .map(|message| {
            let content = message.content.unwrap_or_default();
            match message.role {
                Role::System => ChatMessage::system(content),
                Role::Assistant => ChatMessage::assistant(content),
                Role::User | Role::Tool => ChatMessage::user(content),
            }
        })
        .collect()
}

/// Stream a reasoning completion at temperature 0, framing the reasoning
/// trace with `<think>` tags.
///
/// # Errors
/// Returns an error if the stream cannot be started.
pub async fn reasoning_stream(
    model: &dyn ChatModel,
    model_name: &str,
    messages: Vec<ChatMessage>,
) -> LlmResult<TextStream> {
    let request = ChatRequest::new(model_name, reasoning_messages(messages)).with_temperature(0.0);
    let mut deltas = model.stream(request).await?;

    Ok(Box::pin(async_stream::stream! {
        let mut tagger = ThinkTagger::new();
        while let Some(delta) = deltas.next().await {
            match delta {
                Ok(delta) => {
                    let text = tagger.push(&delta);
                    if !text.is_empty() {
                        yield Ok(text);
                    }
                }
                Err(err) => {
                    error!(error = %err, "Streaming error");
                    yield Err(err);
                    return;
                }
            }
        }
        if let Some(close) = tagger.finish() {
            yield Ok(close.to_string());
        }
    }))
}

#[cfg(test)]
mod tests {
    use futures::TryStreamExt;

    use super::*;
    use crate::llm::LlmError;
    use crate::llm::testing::ScriptedModel;

    #[test]
    fn test_tagger_frames_reasoning() {
        let mut tagger = ThinkTagger::new();
        let mut out = String::new();
        out.push_str(&tagger.push(&StreamDelta::reasoning("hmm")));
        out.push_str(&tagger.push(&StreamDelta::reasoning(" ok")));
        out.push_str(&tagger.push(&StreamDelta::content("Answer")));
        out.push_str(&tagger.push(&StreamDelta::content("!")));
        assert!(tagger.finish().is_none());
        assert_eq!(out, "<think>\nhmm ok\n</think>\nAnswer!");
    }

    #[test]
    fn test_tagger_without_reasoning_and_unclosed() {
        let mut plain = ThinkTagger::new();
        assert_eq!(plain.push(&StreamDelta::content("hi")), "hi");
        assert!(plain.finish().is_none());

        let mut unclosed = ThinkTagger::new();
        assert_eq!(unclosed.push(&StreamDelta::reasoning("x")), "<think>\nx");
        assert_eq!(unclosed.finish(), Some("\n</think>\n"));
        assert!(unclosed.finish().is_none());
    }

    #[test]
    fn test_role_mapping() {
        let mapped = reasoning_messages(vec![
            ChatMessage::system("s"),
            ChatMessage::tool("call_1", "t"),
            ChatMessage::assistant("a"),
        ]);
        let roles: Vec<Role> = mapped.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::System, Role::User, Role::Assistant]);
        assert!(mapped[1].tool_call_id.is_none());
    }

    #[tokio::test]
    async fn test_reasoning_stream() {
        let model = ScriptedModel::new().with_stream(vec![
            Ok(StreamDelta::reasoning("think")),
            Ok(StreamDelta::content("done")),
        ]);
        let stream = reasoning_stream(&model, "deepseek-reasoner", vec![ChatMessage::user("q")]).await;
        let Ok(stream) = stream else { panic!("stream should start") };
        let text: Vec<String> = stream.try_collect().await.unwrap_or_default();
        assert_eq!(text.concat(), "<think>\nthink\n</think>\ndone");

        let requests = model.requests();
        assert_eq!(requests[0].temperature, Some(0.0));
        assert_eq!(requests[0].model, "deepseek-reasoner");
    }

    #[tokio::test]
    async fn test_reasoning_stream_error_midway() {
        let model = ScriptedModel::new().with_stream(vec![
            Ok(StreamDelta::content("partial")),
            Err(LlmError::EmptyResponse),
        ]);
        let Ok(stream) = reasoning_stream(&model, "m", vec![ChatMessage::user("q")]).await else {
            panic!("stream should start");
        };
        let items: Vec<LlmResult<String>> = stream.collect().await;
        assert_eq!(items.len(), 2);
        assert!(items[1].is_err());
    }
}
