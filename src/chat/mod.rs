//! Chat flows that produce a streamed text body.

pub mod pipeline;
pub mod reasoning;
pub mod typewriter;

pub use pipeline::ChatPipeline;
pub use reasoning::{ThinkTagger, reasoning_messages, reasoning_stream};
pub use typewriter::typewriter;

use std::pin::Pin;

use futures::Stream;

use crate::llm::LlmResult;

/// Boxed stream of response text fragments.
pub type TextStream = Pin<Box<dyn Stream<Item = LlmResult<String>> + Send>>;
