//! Recipe corpus ingestion: splitting, hashing and indexing markdown into Chroma.

pub mod error;
pub mod hash;
pub mod retry;
pub mod routes;
pub mod service;
pub mod splitter;

pub use error::{IngestError, IngestResult};
pub use hash::content_hash;
pub use retry::{with_retry, with_retry_if};
pub use routes::{ingest_router, serve_ingest};
pub use service::{IngestReport, IngestService, IngestStats};
pub use splitter::RecursiveCharacterTextSplitter;
