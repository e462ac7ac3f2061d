//! Recipe retrieval over the `how-to-cook` collection.

use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

use lru::LruCache;
use tracing::{debug, info};

use crate::llm::{ChatMessage, ChatModel, ChatRequest};
use crate::rag::chroma::{ChromaClient, Include, QueryRequest};
use crate::rag::embeddings::Embedder;
use crate::rag::error::RagResult;

/// Collection holding the ingested recipe corpus.
pub const RECIPE_COLLECTION: &str = "how-to-cook";

const SEARCH_RESULTS: usize = 5;
const QUERY_CACHE_SIZE: usize = 128;

/// Dish-name extraction and recipe lookup.
pub struct RecipeService {
    model: Arc<dyn ChatModel>,
    model_name: String,
    embedder: Arc<dyn Embedder>,
    chroma: ChromaClient,
    query_cache: Mutex<LruCache<String, Vec<f32>>>,
}

impl RecipeService {
    /// `model_name` is the model used for dish-name extraction.
    #[must_use]
    pub fn new(
        model: Arc<dyn ChatModel>,
        model_name: impl Into<String>,
        embedder: Arc<dyn Embedder>,
        chroma: ChromaClient,
    ) -> Self {
        let capacity = NonZeroUsize::new(QUERY_CACHE_SIZE).unwrap_or(NonZeroUsize::MIN);
        Self {
            model,
            model_name: model_name.into(),
            embedder,
            chroma,
            query_cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Ask the model which dish a sentence is about.
    ///
    /// # Errors
    /// Returns an error if the completion fails.
    pub async fn extract_dish_name(&self, sentence: &str) -> RagResult<String> {
        let prompt = format!("从这句话中提取菜名，只返回菜名，不要其他文字：{sentence}");
        let request = ChatRequest::new(self.model_name.clone(), vec![ChatMessage::user(prompt)])
            .with_temperature(0.0);
        let answer = self.model.complete(request).await?;
        Ok(clean_dish_name(answer.content.as_deref().unwrap_or_default()))
    }

    /// Find the best matching recipe document for `dish`.
    ///
    /// # Errors
    /// Returns an error if embedding or the vector query fails.
    pub async fn search_recipe(&self, dish: &str) -> RagResult<Option<String>> {
        info!(dish = %dish, "Searching for recipe");
        let collection = self.chroma.get_collection(RECIPE_COLLECTION).await?;
        let embedding = self.query_embedding(dish).await?;

        let result = self
            .chroma
            .query(
                &collection.id,
                &QueryRequest {
                    query_embeddings: vec![embedding],
                    n_results: SEARCH_RESULTS,
                    include: vec![Include::Documents, Include::Metadatas],
                },
            )
            .await?;

        let documents = result
            .documents
            .and_then(|docs| docs.into_iter().next())
            .unwrap_or_default();
        if documents.is_empty() {
            return Ok(None);
        }
        let metadatas = result
            .metadatas
            .and_then(|metas| metas.into_iter().next())
            .unwrap_or_default();

        let mut best = 0;
        let needle = dish.to_lowercase();
        if !needle.is_empty() {
            let matched = metadatas.iter().position(|meta| {
                meta.as_ref()
                    .and_then(|meta| meta.get("relativePath"))
                    .and_then(|path| path.as_str())
                    .is_some_and(|path| path.to_lowercase().contains(&needle))
            });
            if let Some(index) = matched {
                debug!(index, "Re-ranking: promoted keyword match");
                best = index;
            }
        }

        Ok(documents.into_iter().nth(best).flatten())
    }

    async fn query_embedding(&self, dish: &str) -> RagResult<Vec<f32>> {
        if let Some(hit) = self
            .query_cache
            .lock()
            .ok()
            .and_then(|mut cache| cache.get(dish).cloned())
        {
            return Ok(hit);
        }

        let embedding = self.embedder.embed_query(dish).await?;
        if let Ok(mut cache) = self.query_cache.lock() {
            cache.put(dish.to_string(), embedding.clone());
        }
        Ok(embedding)
    }
}

fn clean_dish_name(raw: &str) -> String {
    raw.trim()
        .chars()
        .filter(|c| !matches!(c, '\'' | '"' | '《' | '》'))
        .collect()
}
