//! Text embeddings over the Zhipu (BigModel) OpenAI-style `/embeddings` API.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use reqwest::Client as ReqwestClient;
use rig::client::EmbeddingsClient;
use rig::embeddings::EmbeddingModel;
use rig::providers::openai;
use tracing::debug;

use crate::config::EmbeddingConfig;
use crate::rag::error::{RagError, RagResult};

/// Limit for one embedding request.
pub const EMBED_TIMEOUT: Duration = Duration::from_secs(60);

/// Boxed future type for embedder operations.
pub type EmbedFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Trait abstraction over embedding models.
pub trait Embedder: Send + Sync {
    /// Embed multiple texts, one vector per input, in input order.
    ///
    /// # Errors
    /// Returns an error if the embedding request fails.
    fn embed_texts(&self, texts: Vec<String>) -> EmbedFuture<'_, RagResult<Vec<Vec<f32>>>>;

    /// Embed a single query string.
    ///
    /// # Errors
    /// Returns an error if the embedding request fails.
    fn embed_query(&self, text: &str) -> EmbedFuture<'_, RagResult<Vec<f32>>> {
        let text = text.to_string();
        Box::pin(async move {
            self.embed_texts(vec![text])
                .await?
                .into_iter()
                .next()
                .ok_or(RagError::EmbeddingCount {
                    expected: 1,
                    actual: 0,
                })
        })
    }
}

type OpenAiEmbeddingModel = openai::EmbeddingModel<ReqwestClient>;

/// Embedder for `embedding-3` and other models behind the same API shape.
#[derive(Clone)]
pub struct ZhipuEmbedder {
    model: OpenAiEmbeddingModel,
    model_name: String,
    batch_size: usize,
}

impl ZhipuEmbedder {
    /// Create an embedder from config.
    ///
    /// # Errors
    /// Returns an error if the API key is missing or the client cannot be built.
    pub fn new(config: &EmbeddingConfig) -> RagResult<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .ok_or(RagError::MissingApiKey)?;
        let client = openai::Client::<ReqwestClient>::builder()
            .api_key(&api_key)
            .base_url(config.base_url.trim_end_matches('/'))
            .build()?;
        let model = client.embedding_model_with_ndims(config.model.clone(), config.ndims);
        Ok(Self {
            model,
            model_name: config.model.clone(),
            batch_size: config.batch_size.max(1),
        })
    }

    async fn embed_batch(&self, batch: &[String]) -> RagResult<Vec<Vec<f32>>> {
        debug!(count = batch.len(), model = %self.model_name, "Requesting embeddings");
        let embeddings = tokio::time::timeout(EMBED_TIMEOUT, self.model.embed_texts(batch.to_vec()))
            .await
            .map_err(|_| RagError::Timeout(EMBED_TIMEOUT))??;
        if embeddings.len() != batch.len() {
            return Err(RagError::EmbeddingCount {
                expected: batch.len(),
                actual: embeddings.len(),
            });
        }
        Ok(embeddings
            .into_iter()
            .map(|embedding| to_f32(&embedding.vec))
            .collect())
    }
}

#[allow(clippy::cast_possible_truncation)]
fn to_f32(vector: &[f64]) -> Vec<f32> {
    vector.iter().map(|value| *value as f32).collect()
}

impl Embedder for ZhipuEmbedder {
    fn embed_texts(&self, texts: Vec<String>) -> EmbedFuture<'_, RagResult<Vec<Vec<f32>>>> {
        Box::pin(async move {
            let mut vectors = Vec::with_capacity(texts.len());
            for batch in texts.chunks(self.batch_size) {
                vectors.extend(self.embed_batch(batch).await?);
            }
            Ok(vectors)
        })
    }
}
