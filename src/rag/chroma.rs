//! Minimal client for the Chroma v2 HTTP API.

use std::time::Duration;

use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use tracing::{debug, warn};

use crate::config::ChromaConfig;
use crate::rag::error::{RagError, RagResult};

/// Free-form metadata attached to collections and records.
pub type Metadata = Map<String, Value>;

/// A Chroma collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Collection {
    /// Collection id (UUID).
    pub id: String,
    /// Collection name.
    pub name: String,
    /// Collection metadata.
    #[serde(default)]
    pub metadata: Option<Metadata>,
}

/// Fields Chroma may return alongside ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Include {
    /// Raw documents.
    Documents,
    /// Embedding vectors.
    Embeddings,
    /// Record metadata.
    Metadatas,
    /// Query distances.
    Distances,
}

/// Body of `POST /collections/{id}/get`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct GetRequest {
    /// Restrict to these ids.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ids: Option<Vec<String>>,
    /// Document filter, e.g. `{"$contains": "egg"}`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub where_document: Option<Value>,
    /// Page size.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
    /// Page offset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<usize>,
    /// Fields to return.
    pub include: Vec<Include>,
}

/// Records returned by `get`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GetResult {
    /// Record ids.
    #[serde(default)]
    pub ids: Vec<String>,
    /// Embeddings, when included.
    #[serde(default)]
    pub embeddings: Option<Vec<Vec<f32>>>,
    /// Documents, when included.
    #[serde(default)]
    pub documents: Option<Vec<Option<String>>>,
    /// Metadata, when included.
    #[serde(default)]
    pub metadatas: Option<Vec<Option<Metadata>>>,
}

/// Body of `POST /collections/{id}/query`.
#[derive(Debug, Clone, Serialize)]
pub struct QueryRequest {
    /// One embedding per query.
    pub query_embeddings: Vec<Vec<f32>>,
    /// Neighbours per query.
    pub n_results: usize,
    /// Fields to return.
    pub include: Vec<Include>,
}

/// Nearest neighbours, one inner list per query embedding.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct QueryResult {
    /// Record ids.
    #[serde(default)]
    pub ids: Vec<Vec<String>>,
    /// Documents, when included.
    #[serde(default)]
    pub documents: Option<Vec<Vec<Option<String>>>>,
    /// Metadata, when included.
    #[serde(default)]
    pub metadatas: Option<Vec<Vec<Option<Metadata>>>>,
    /// Distances, when included.
    #[serde(default)]
    pub distances: Option<Vec<Vec<Option<f32>>>>,
}

/// Body of `POST /collections/{id}/add`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AddRequest {
    /// Record ids.
    pub ids: Vec<String>,
    /// One embedding per id.
    pub embeddings: Vec<Vec<f32>>,
    /// Documents.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub documents: Option<Vec<String>>,
    /// Metadata.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadatas: Option<Vec<Metadata>>,
}

/// Chroma HTTP client scoped to one tenant and database.
#[derive(Clone)]
pub struct ChromaClient {
    client: Client,
    base_url: String,
    collections_url: String,
}

impl ChromaClient {
    /// Create a client from config.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &ChromaConfig) -> RagResult<Self> {
        let client = Client::builder().timeout(Duration::from_secs(60)).build()?;
        let base_url = config.base_url();
        let collections_url = format!(
            "{base_url}/api/v2/tenants/{}/databases/{}/collections",
            config.tenant, config.database
        );
        Ok(Self {
            client,
            base_url,
            collections_url,
        })
    }

    /// Server base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = if path.is_empty() {
            self.collections_url.clone()
        } else {
            format!("{}/{path}", self.collections_url)
        };
        self.client.request(method, url)
    }

    async fn send<T: DeserializeOwned>(&self, builder: RequestBuilder) -> RagResult<T> {
        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            debug!(status = status.as_u16(), body = %body, "Chroma request failed");
            return Err(RagError::Chroma {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response.json().await?)
    }

    /// Check the server is reachable; returns the heartbeat payload.
    ///
    /// # Errors
    /// Returns an error if the server cannot be reached.
    pub async fn heartbeat(&self) -> RagResult<Value> {
        let url = format!("{}/api/v2/heartbeat", self.base_url);
        self.send(self.client.get(url)).await
    }

    /// List all collections.
    ///
    /// # Errors
    /// Returns an error if the request fails.
    pub async fn list_collections(&self) -> RagResult<Vec<Collection>> {
        self.send(self.request(Method::GET, "")).await
    }

    /// Fetch a collection by name.
    ///
    /// # Errors
    /// Returns [`RagError::CollectionNotFound`] when it does not exist.
    pub async fn get_collection(&self, name: &str) -> RagResult<Collection> {
        let path = urlencoding::encode(name).into_owned();
        match self.send(self.request(Method::GET, &path)).await {
            Err(RagError::Chroma { status, .. }) if status == StatusCode::NOT_FOUND.as_u16() => {
                Err(RagError::CollectionNotFound(name.to_string()))
            }
            other => other,
        }
    }

    /// Create a collection, or return the existing one when `get_or_create`.
    ///
    /// # Errors
    /// Returns an error if the request fails.
    pub async fn create_collection(
        &self,
        name: &str,
        metadata: Option<Metadata>,
        get_or_create: bool,
    ) -> RagResult<Collection> {
        let body = json!({
            "name": name,
            "metadata": metadata,
            "get_or_create": get_or_create,
        });
        self.send(self.request(Method::POST, "").json(&body)).await
    }

    /// Delete a collection by name.
    ///
    /// # Errors
    /// Returns an error if the request fails.
    pub async fn delete_collection(&self, name: &str) -> RagResult<()> {
        let path = urlencoding::encode(name).into_owned();
        let response = self.request(Method::DELETE, &path).send().await?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(RagError::CollectionNotFound(name.to_string()));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(collection = %name, status = status.as_u16(), "Failed to delete collection");
            return Err(RagError::Chroma {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }

    /// Number of records in a collection.
    ///
    /// # Errors
    /// Returns an error if the request fails.
    pub async fn count(&self, collection_id: &str) -> RagResult<usize> {
        self.send(self.request(Method::GET, &format!("{collection_id}/count")))
            .await
    }

    /// Fetch records.
    ///
    /// # Errors
    /// Returns an error if the request fails.
    pub async fn get(&self, collection_id: &str, request: &GetRequest) -> RagResult<GetResult> {
        self.send(
            self.request(Method::POST, &format!("{collection_id}/get"))
                .json(request),
        )
        .await
    }

    /// First `limit` records with documents, metadata and embeddings.
    ///
    /// # Errors
    /// Returns an error if the request fails.
    pub async fn peek(&self, collection_id: &str, limit: usize) -> RagResult<GetResult> {
        let request = GetRequest {
            limit: Some(limit),
            include: vec![Include::Embeddings, Include::Documents, Include::Metadatas],
            ..GetRequest::default()
        };
        self.get(collection_id, &request).await
    }

    /// Nearest-neighbour search.
    ///
    /// # Errors
    /// Returns an error if the request fails.
    pub async fn query(&self, collection_id: &str, request: &QueryRequest) -> RagResult<QueryResult> {
        self.send(
            self.request(Method::POST, &format!("{collection_id}/query"))
                .json(request),
        )
        .await
    }

    /// Insert records.
    ///
    /// # Errors
    /// Returns an error if the request fails.
    pub async fn add(&self, collection_id: &str, request: &AddRequest) -> RagResult<()> {
        let _: Value = self
            .send(
                self.request(Method::POST, &format!("{collection_id}/add"))
                    .json(request),
            )
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use mockito::Matcher;

    use super::*;

    const COLLECTIONS: &str = "/api/v2/tenants/default_tenant/databases/default_database/collections";

    async fn setup() -> (mockito::ServerGuard, ChromaClient) {
        let server = mockito::Server::new_async().await;
        let Ok(config) = ChromaConfig::from_url(&server.url()) else {
            panic!("mock url should parse");
        };
        let Ok(client) = ChromaClient::new(&config) else {
            panic!("client should build");
        };
        (server, client)
    }

    #[tokio::test]
    async fn test_heartbeat() {
        let (mut server, client) = setup().await;
        let beat = server
            .mock("GET", "/api/v2/heartbeat")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(json!({"nanosecond heartbeat": 1_717_000_000_000_000_000_u64}).to_string())
            .create_async()
            .await;
        let payload = client.heartbeat().await.ok();
        beat.assert_async().await;
        assert!(payload.is_some_and(|p| p.get("nanosecond heartbeat").is_some()));

        let (mut starting, client) = setup().await;
        let _down = starting
            .mock("GET", "/api/v2/heartbeat")
            .with_status(503)
            .with_body("starting")
            .create_async()
            .await;
        assert!(matches!(
            client.heartbeat().await,
            Err(RagError::Chroma { status: 503, .. })
        ));
    }

    #[tokio::test]
    async fn test_list_and_get_collection() {
        let (mut server, client) = setup().await;
        let _list = server
            .mock("GET", COLLECTIONS)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!([{"id": "c1", "name": "how-to-cook", "metadata": {"hnsw:space": "cosine"}}])
                    .to_string(),
            )
            .create_async()
            .await;
        let _missing = server
            .mock("GET", format!("{COLLECTIONS}/recipes").as_str())
            .with_status(404)
            .with_body(r#"{"error":"NotFoundError"}"#)
            .create_async()
            .await;

        let collections = client.list_collections().await.unwrap_or_default();
        assert_eq!(collections.len(), 1);
        assert_eq!(collections[0].name, "how-to-cook");

        let missing = client.get_collection("recipes").await;
        assert!(matches!(missing, Err(RagError::CollectionNotFound(name)) if name == "recipes"));
    }

    #[tokio::test]
    async fn test_create_collection_sends_get_or_create() {
        let (mut server, client) = setup().await;
        let mock = server
            .mock("POST", COLLECTIONS)
            .match_body(Matcher::PartialJson(json!({
                "name": "recipes",
                "get_or_create": true,
                "metadata": {"hnsw:space": "cosine"}
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(json!({"id": "c2", "name": "recipes", "metadata": null}).to_string())
            .create_async()
            .await;

        let mut metadata = Metadata::new();
        metadata.insert("hnsw:space".to_string(), json!("cosine"));
        let collection = client
            .create_collection("recipes", Some(metadata), true)
            .await
            .ok();

        mock.assert_async().await;
        assert_eq!(collection.map(|c| c.id), Some("c2".to_string()));
    }

    #[tokio::test]
    async fn test_query_and_get() {
        let (mut server, client) = setup().await;
        let _query = server
            .mock("POST", format!("{COLLECTIONS}/c1/query").as_str())
            .match_body(Matcher::PartialJson(json!({"n_results": 5})))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "ids": [["a", "b"]],
                    "documents": [["doc a", null]],
                    "metadatas": [[{"relativePath": "a.md"}, null]],
                    "distances": [[0.1, 0.2]]
                })
                .to_string(),
            )
            .create_async()
            .await;
        let _get = server
            .mock("POST", format!("{COLLECTIONS}/c1/get").as_str())
            .match_body(Matcher::PartialJson(json!({"limit": 10, "offset": 20})))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(json!({"ids": ["x"], "documents": ["doc x"], "embeddings": null}).to_string())
            .create_async()
            .await;

        let query = QueryRequest {
            query_embeddings: vec![vec![0.1, 0.2]],
            n_results: 5,
            include: vec![Include::Documents, Include::Metadatas],
        };
        let result = client.query("c1", &query).await.unwrap_or_default();
        assert_eq!(result.ids, vec![vec!["a".to_string(), "b".to_string()]]);
        assert_eq!(
            result.documents,
            Some(vec![vec![Some("doc a".to_string()), None]])
        );

        let page = client
            .get(
                "c1",
                &GetRequest {
                    limit: Some(10),
                    offset: Some(20),
                    include: vec![Include::Documents],
                    ..GetRequest::default()
                },
            )
            .await
            .unwrap_or_default();
        assert_eq!(page.ids, vec!["x".to_string()]);
        assert!(page.embeddings.is_none());
    }

    #[tokio::test]
    async fn test_error_status_is_reported() {
        let (mut server, client) = setup().await;
        let _count = server
            .mock("GET", format!("{COLLECTIONS}/c1/count").as_str())
            .with_status(500)
            .with_body("boom")
            .create_async()
            .await;

        let result = client.count("c1").await;
        assert!(matches!(result, Err(RagError::Chroma { status: 500, body }) if body == "boom"));
    }
}
