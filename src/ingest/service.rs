//! Full re-index of the markdown recipe corpus into the vector store.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{SecondsFormat, Utc};
use futures::StreamExt;
use serde::Serialize;
use serde_json::{Value, json};
use tracing::{error, info, warn};
use uuid::Uuid;
use walkdir::WalkDir;

use crate::config::IngestConfig;
use crate::ingest::error::{IngestError, IngestResult};
use crate::ingest::hash::content_hash;
use crate::ingest::retry::{DEFAULT_RETRIES, DEFAULT_RETRY_DELAY, with_retry_if};
use crate::ingest::splitter::RecursiveCharacterTextSplitter;
use crate::rag::{
    AddRequest, ChromaClient, Collection, Embedder, Metadata, RECIPE_COLLECTION, RagError, ZhipuEmbedder,
};

/// Chunks buffered before each embed-and-add round.
pub const FLUSH_BATCH: usize = 100;
/// Files read at the same time.
pub const READ_CONCURRENCY: usize = 10;

const MSG_API_KEY_MISSING: &str = "API Key missing";
const MSG_CONNECTION_FAILED: &str = "ChromaDB connection or Embedding failed";
const MSG_CLEAR_FAILED: &str = "Failed to clear collection";
const MSG_SOURCE_MISSING: &str = "Source directory not found";

/// Counters collected during one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestStats {
    /// Files split and queued.
    pub processed: usize,
    /// Files left untouched.
    pub skipped: usize,
    /// Files removed from the index.
    pub deleted: usize,
    /// Chunks written.
    pub chunks: usize,
    /// Read and write failures.
    pub errors: usize,
}

/// Outcome of [`IngestService::run`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    /// Whether the run reached the indexing phase.
    pub success: bool,
    /// Failure reason.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Counters for a completed run.
    #[serde(flatten)]
    pub stats: Option<IngestStats>,
}

impl IngestReport {
    fn failed(message: &str) -> Self {
        Self {
            success: false,
            message: Some(message.to_string()),
            stats: None,
        }
    }

    const fn completed(stats: IngestStats) -> Self {
        Self {
            success: true,
            message: None,
            stats: Some(stats),
        }
    }
}

struct SourceFile {
    path: PathBuf,
    relative_path: String,
    hash: String,
    content: String,
}

struct Chunk {
    text: String,
    metadata: Metadata,
}

/// Rebuilds the recipe collection from a directory of markdown files.
pub struct IngestService {
    embedder: Option<Arc<dyn Embedder>>,
    chroma: ChromaClient,
    source_dir: PathBuf,
    collection: String,
    splitter: RecursiveCharacterTextSplitter,
    flush_batch: usize,
    read_concurrency: usize,
    retry_delay: Duration,
}

impl IngestService {
    /// Service over explicit components. A missing embedder makes every run
    /// fail with "API Key missing".
    #[must_use]
    pub fn new(
        embedder: Option<Arc<dyn Embedder>>,
        chroma: ChromaClient,
        source_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            embedder,
            chroma,
            source_dir: source_dir.into(),
            collection: RECIPE_COLLECTION.to_string(),
            splitter: RecursiveCharacterTextSplitter::default(),
            flush_batch: FLUSH_BATCH,
            read_concurrency: READ_CONCURRENCY,
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }

    /// Build the service from configuration.
    ///
    /// # Errors
    /// Returns an error if an HTTP client cannot be created.
    pub fn from_config(config: &IngestConfig) -> IngestResult<Self> {
        let embedder: Option<Arc<dyn Embedder>> = match ZhipuEmbedder::new(&config.embedding) {
            Ok(embedder) => Some(Arc::new(embedder)),
            Err(RagError::MissingApiKey) => None,
            Err(err) => return Err(err.into()),
        };
        let chroma = ChromaClient::new(&config.chroma)?;
        Ok(Self::new(embedder, chroma, config.source_dir.clone()))
    }

    /// Override the corpus directory.
    #[must_use]
    pub fn with_source_dir(mut self, source_dir: impl Into<PathBuf>) -> Self {
        self.source_dir = source_dir.into();
        self
    }

    /// Override the chunk count per write.
    #[must_use]
    pub fn with_flush_batch(mut self, flush_batch: usize) -> Self {
        self.flush_batch = flush_batch.max(1);
        self
    }

    /// Override the initial retry delay.
    #[must_use]
    pub const fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Corpus directory.
    #[must_use]
    pub fn source_dir(&self) -> &Path {
        &self.source_dir
    }

    /// Drop and recreate the collection, then index every markdown file.
    ///
    /// Expected failures (missing key, unreachable store, missing directory)
    /// are reported through [`IngestReport`].
    ///
    /// # Errors
    /// Returns an error only if the directory scan task fails.
    pub async fn run(&self) -> IngestResult<IngestReport> {
        let started = Instant::now();
        info!(collection = %self.collection, "Starting ingestion");

        let Some(embedder) = self.embedder.as_deref() else {
            error!("BIGMODEL_API_KEY or OPENAI_API_KEY is not set");
            return Ok(IngestReport::failed(MSG_API_KEY_MISSING));
        };

        info!(url = %self.chroma.base_url(), "Connecting to ChromaDB");
        if let Err(err) = self.check_connection(embedder).await {
            error!(error = %err, "Failed to connect to ChromaDB or generate embeddings");
            return Ok(IngestReport::failed(MSG_CONNECTION_FAILED));
        }

        let collection = match self.recreate_collection().await {
            Ok(collection) => collection,
            Err(err) => {
                error!(error = %err, "Failed to clear or recreate collection");
                return Ok(IngestReport::failed(MSG_CLEAR_FAILED));
            }
        };

        let root = match tokio::fs::metadata(&self.source_dir).await {
            Ok(meta) if meta.is_dir() => tokio::fs::canonicalize(&self.source_dir)
                .await
                .unwrap_or_else(|_| self.source_dir.clone()),
            _ => {
                error!(dir = %self.source_dir.display(), "Source directory does not exist");
                return Ok(IngestReport::failed(MSG_SOURCE_MISSING));
            }
        };

        let mut stats = IngestStats::default();
        let files = self.load_files(&root, &mut stats).await?;
        info!(files = files.len(), "Files to process");

        let mut buffer = Vec::new();
        for file in &files {
            buffer.extend(self.chunks_for(file));
            stats.processed += 1;
            if buffer.len() >= self.flush_batch {
                self.flush(embedder, &collection.id, &mut buffer, &mut stats).await;
            }
        }
        self.flush(embedder, &collection.id, &mut buffer, &mut stats).await;

        info!(
            duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            processed = stats.processed,
            skipped = stats.skipped,
            deleted = stats.deleted,
            chunks = stats.chunks,
            errors = stats.errors,
            "Ingestion completed"
        );
        Ok(IngestReport::completed(stats))
    }

    async fn check_connection(&self, embedder: &dyn Embedder) -> IngestResult<Collection> {
        let sample = embedder.embed_texts(vec!["test".to_string()]).await?;
        match sample.first() {
            Some(vector) => info!(
                dimension = vector.len(),
                sample = ?&vector[..vector.len().min(5)],
                "Test embedding generated"
            ),
            None => warn!("Test embedding generation returned no result"),
        }
        Ok(self
            .chroma
            .create_collection(&self.collection, Some(collection_metadata()), true)
            .await?)
    }

    async fn recreate_collection(&self) -> IngestResult<Collection> {
        info!(collection = %self.collection, "Cleaning up existing collection");
        if let Err(err) = self.chroma.delete_collection(&self.collection).await {
            warn!(error = %err, "Delete collection failed");
        }
        let collection = self
            .chroma
            .create_collection(&self.collection, Some(collection_metadata()), true)
            .await?;
        info!(id = %collection.id, "Collection recreated");
        Ok(collection)
    }

    async fn load_files(&self, root: &Path, stats: &mut IngestStats) -> IngestResult<Vec<SourceFile>> {
        let walk_root = root.to_path_buf();
        let (paths, walk_errors) = tokio::task::spawn_blocking(move || find_markdown(&walk_root)).await?;
        stats.errors += walk_errors;
        info!(files = paths.len(), "Found local markdown files");

        let reads: Vec<(PathBuf, std::io::Result<String>)> = futures::stream::iter(paths)
            .map(|path| async move {
                let content = tokio::fs::read_to_string(&path).await;
                (path, content)
            })
            .buffer_unordered(self.read_concurrency)
            .collect()
            .await;

        let mut files = Vec::with_capacity(reads.len());
        for (path, content) in reads {
            let content = match content {
                Ok(content) => content,
                Err(err) => {
                    error!(path = %path.display(), error = %err, "Error reading file");
                    stats.errors += 1;
                    continue;
                }
            };
            if content.trim().is_empty() {
                continue;
            }
            let relative_path = path
                .strip_prefix(root)
                .unwrap_or(&path)
                .to_string_lossy()
                .into_owned();
            files.push(SourceFile {
                hash: content_hash(&content),
                path,
                relative_path,
                content,
            });
        }
        files.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
        Ok(files)
    }

    fn chunks_for(&self, file: &SourceFile) -> Vec<Chunk> {
        let indexed_at = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        self.splitter
            .split_text(&file.content)
            .into_iter()
            .map(|text| {
                let mut metadata = Metadata::new();
                metadata.insert("source".to_string(), json!(file.path.to_string_lossy()));
                metadata.insert("relativePath".to_string(), json!(file.relative_path));
                metadata.insert("file_hash".to_string(), json!(file.hash));
                metadata.insert("indexed_at".to_string(), Value::String(indexed_at.clone()));
                Chunk { text, metadata }
            })
            .collect()
    }

    async fn flush(
        &self,
        embedder: &dyn Embedder,
        collection_id: &str,
        buffer: &mut Vec<Chunk>,
        stats: &mut IngestStats,
    ) {
        if buffer.is_empty() {
            return;
        }
        let batch = std::mem::take(buffer);
        let count = batch.len();
        let result = with_retry_if(
            || self.store(embedder, collection_id, &batch),
            DEFAULT_RETRIES,
            self.retry_delay,
            IngestError::is_retryable,
        )
        .await;
        match result {
            Ok(()) => {
                stats.chunks += count;
                info!(chunks = count, "Saved batch");
            }
            Err(err) => {
                error!(chunks = count, error = %err, "Error adding documents batch");
                stats.errors += 1;
            }
        }
    }

    async fn store(&self, embedder: &dyn Embedder, collection_id: &str, batch: &[Chunk]) -> IngestResult<()> {
        let documents: Vec<String> = batch.iter().map(|chunk| chunk.text.clone()).collect();
        let embeddings = embedder.embed_texts(documents.clone()).await?;
        let request = AddRequest {
            ids: batch.iter().map(|_| Uuid::new_v4().to_string()).collect(),
            embeddings,
            documents: Some(documents),
            metadatas: Some(batch.iter().map(|chunk| chunk.metadata.clone()).collect()),
        };
        self.chroma.add(collection_id, &request).await?;
        Ok(())
    }
}

fn collection_metadata() -> Metadata {
    let mut metadata = Metadata::new();
    metadata.insert("hnsw:space".to_string(), json!("cosine"));
    metadata
}

/// Markdown files under `root`, plus the number of entries that could not be visited.
fn find_markdown(root: &Path) -> (Vec<PathBuf>, usize) {
    let mut paths = Vec::new();
    let mut errors = 0;
    for entry in WalkDir::new(root).follow_links(true) {
        match entry {
            Ok(entry) => {
                let is_markdown = entry.path().extension().is_some_and(|ext| ext == "md");
                if entry.file_type().is_file() && is_markdown {
                    paths.push(entry.into_path());
                }
            }
            Err(err) => {
                warn!(error = %err, "Skipping unreadable entry");
                errors += 1;
            }
        }
    }
    (paths, errors)
}
