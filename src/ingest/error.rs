//! Ingestion errors.

use std::path::PathBuf;

use thiserror::Error;

use crate::rag::RagError;

/// Errors raised while loading and indexing the recipe corpus.
#[derive(Debug, Error)]
pub enum IngestError {
    /// Vector store or embedding failure.
    #[error(transparent)]
    Rag(#[from] RagError),

    /// A corpus file could not be read.
    #[error("failed to read {path}: {source}")]
    Read {
        /// File being read.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Directory walk failed.
    #[error("directory walk failed: {0}")]
    Walk(#[from] walkdir::Error),

    /// Splitter settings are unusable.
    #[error("chunk overlap {chunk_overlap} must be smaller than chunk size {chunk_size}")]
    InvalidSplitter {
        /// Requested chunk size.
        chunk_size: usize,
        /// Requested overlap.
        chunk_overlap: usize,
    },

    /// A blocking task was cancelled or panicked.
    #[error("background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl IngestError {
    /// Whether retrying the failed step may help.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Rag(err) => err.is_retryable(),
            _ => false,
        }
    }
}

/// Convenience result alias.
pub type IngestResult<T> = Result<T, IngestError>;
