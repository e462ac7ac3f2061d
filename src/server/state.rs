//! Application state shared across all request handlers.

use std::path::PathBuf;
use std::sync::Arc;

use crate::chat::ChatPipeline;
use crate::config::DEFAULT_REASONER_MODEL;
use crate::llm::ChatModel;
use crate::rag::{ChromaClient, Embedder, RecipeService};

/// Shared application state. Optional members are absent when their
/// credentials or endpoints are not configured.
pub struct AppState {
    /// Tool-calling chat.
    pub pipeline: Option<ChatPipeline>,
    /// Model client used for reasoning streams.
    pub reasoner: Option<Arc<dyn ChatModel>>,
    /// Reasoning model name.
    pub reasoner_model: String,
    /// Vector store client.
    pub chroma: Option<ChromaClient>,
    /// Embedding model used to seed demo data.
    pub embedder: Option<Arc<dyn Embedder>>,
    /// Recipe retrieval.
    pub recipes: Option<Arc<RecipeService>>,
    /// Directory holding the static pages.
    pub static_dir: PathBuf,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            pipeline: None,
            reasoner: None,
            reasoner_model: DEFAULT_REASONER_MODEL.to_string(),
            chroma: None,
            embedder: None,
            recipes: None,
            static_dir: PathBuf::from("static"),
        }
    }
}

impl AppState {
    /// State with nothing configured, serving pages from `static_dir`.
    #[must_use]
    pub fn new(static_dir: impl Into<PathBuf>) -> Self {
        Self {
            static_dir: static_dir.into(),
            ..Self::default()
        }
    }

    /// Attach the tool-calling chat pipeline.
    #[must_use]
    pub fn with_pipeline(mut self, pipeline: ChatPipeline) -> Self {
        self.pipeline = Some(pipeline);
        self
    }

    /// Attach the reasoning model.
    #[must_use]
    pub fn with_reasoner(mut self, model: Arc<dyn ChatModel>, model_name: impl Into<String>) -> Self {
        self.reasoner = Some(model);
        self.reasoner_model = model_name.into();
        self
    }

    /// Attach the vector store.
    #[must_use]
    pub fn with_chroma(mut self, chroma: ChromaClient) -> Self {
        self.chroma = Some(chroma);
        self
    }

    /// Attach the embedding model.
    #[must_use]
    pub fn with_embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    /// Attach recipe retrieval.
    #[must_use]
    pub fn with_recipes(mut self, recipes: Arc<RecipeService>) -> Self {
        self.recipes = Some(recipes);
        self
    }
}
