//! Error types for the LLM client.

use std::time::Duration;

use rig::completion::CompletionError;
use thiserror::Error;

/// Errors produced while talking to the chat completion endpoint.
#[derive(Debug, Error)]
pub enum LlmError {
    /// No API key configured.
    #[error("missing API key for the chat completion endpoint")]
    MissingApiKey,
    /// Provider client could not be built.
    #[error("http client error: {0}")]
    Client(#[from] rig::http_client::Error),
    /// Completion call failed (transport, status or decoding).
    #[error("completion failed: {0}")]
    Completion(#[from] CompletionError),
    /// No answer, or no stream chunk, within the configured limit.
    #[error("no response within {0:?}")]
    Timeout(Duration),
    /// Request had no message to send.
    #[error("conversation is empty")]
    EmptyConversation,
    /// Response had no usable content.
    #[error("response contained no choices")]
    EmptyResponse,
}

impl LlmError {
    /// Whether the error is worth retrying.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Client(_) | Self::Timeout(_) | Self::Completion(CompletionError::HttpError(_))
        )
    }
}

/// Convenience result alias for LLM calls.
pub type LlmResult<T> = Result<T, LlmError>;
