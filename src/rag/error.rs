//! Error types for the retrieval subsystem.

use std::time::Duration;

use rig::embeddings::EmbeddingError;
use thiserror::Error;

use crate::llm::LlmError;

/// Retrieval subsystem error type.
#[derive(Debug, Error)]
pub enum RagError {
    /// Embedding API key is not configured.
    #[error("embedding API key is missing")]
    MissingApiKey,
    /// HTTP transport error.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    /// Chroma answered with a non-success status.
    #[error("chroma error (status {status}): {body}")]
    Chroma {
        /// HTTP status code.
        status: u16,
        /// Response body.
        body: String,
    },
    /// Named collection does not exist.
    #[error("collection not found: {0}")]
    CollectionNotFound(String),
    /// Embedding client could not be built.
    #[error("embedding client error: {0}")]
    Client(#[from] rig::http_client::Error),
    /// Embedding call failed.
    #[error("embedding error: {0}")]
    Embedding(#[from] EmbeddingError),
    /// Embedding endpoint did not answer in time.
    #[error("embedding request timed out after {0:?}")]
    Timeout(Duration),
    /// Embedding endpoint returned the wrong number of vectors.
    #[error("expected {expected} embeddings, got {actual}")]
    EmbeddingCount {
        /// Number of inputs sent.
        expected: usize,
        /// Number of vectors returned.
        actual: usize,
    },
    /// Chat model failure while extracting a dish name.
    #[error("llm error: {0}")]
    Llm(#[from] LlmError),
    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl RagError {
    /// Whether a retry may succeed: transport failures, timeouts, throttling
    /// and server-side errors.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Http(_) | Self::Timeout(_) | Self::Embedding(EmbeddingError::HttpError(_)) => true,
            Self::Chroma { status, .. } => *status == 429 || *status >= 500,
            Self::Llm(err) => err.is_retryable(),
            _ => false,
        }
    }
}

/// Convenience result alias for retrieval operations.
pub type RagResult<T> = Result<T, RagError>;
