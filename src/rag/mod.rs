//! Retrieval-augmented generation: Chroma access, embeddings, recipe lookup.

pub mod chroma;
pub mod embeddings;
pub mod error;
pub mod recipe;

pub use chroma::{
    AddRequest, ChromaClient, Collection, GetRequest, GetResult, Include, Metadata, QueryRequest,
    QueryResult,
};
pub use embeddings::{EmbedFuture, Embedder, ZhipuEmbedder};
pub use error::{RagError, RagResult};
pub use recipe::{RECIPE_COLLECTION, RecipeService};
