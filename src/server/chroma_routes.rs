//! Vector-store browser, debug and seed endpoints under `/api/chroma`.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{error, info, warn};

use crate::rag::{AddRequest, ChromaClient, GetRequest, Include, Metadata, RECIPE_COLLECTION, RagError};

use super::error::ApiError;
use super::state::AppState;

const SEED_COLLECTION: &str = "recipes";
const PEEK_LIMIT: usize = 10;
const DEBUG_LIMIT: usize = 3;
const PREVIEW_CHARS: usize = 200;

/// Routes for browsing and seeding collections.
pub fn chroma_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/chroma/collections", get(list_collections))
        .route(
            "/api/chroma/collection/{name}",
            get(collection_details).post(query_collection),
        )
        .route("/api/chroma/debug", get(debug_collection))
        .route("/api/chroma/seed", post(seed_recipes))
}

fn chroma(state: &AppState) -> Result<&ChromaClient, ApiError> {
    state.chroma.as_ref().ok_or_else(ApiError::vector_store_disabled)
}

fn lookup_error(name: &str, err: RagError, message: &str) -> ApiError {
    match err {
        RagError::CollectionNotFound(_) => ApiError::NotFound(format!("Collection {name} not found")),
        other => {
            error!(collection = %name, error = %other, "{}", message);
            ApiError::internal(message)
        }
    }
}

async fn list_collections(State(state): State<Arc<AppState>>) -> Result<Json<Value>, ApiError> {
    let collections = chroma(&state)?.list_collections().await.map_err(|err| {
        error!(error = %err, "Error fetching collections");
        ApiError::internal("Failed to fetch collections")
    })?;
    info!(count = collections.len(), "Collections fetched");
    let summaries: Vec<Value> = collections
        .into_iter()
        .map(|c| json!({ "name": c.name, "id": c.id, "metadata": c.metadata }))
        .collect();
    Ok(Json(Value::Array(summaries)))
}

async fn collection_details(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<Value>, ApiError> {
    const FAILED: &str = "Failed to fetch collection details";
    let chroma = chroma(&state)?;
    let collection = chroma
        .get_collection(&name)
        .await
        .map_err(|err| lookup_error(&name, err, FAILED))?;
    let count = chroma
        .count(&collection.id)
        .await
        .map_err(|err| lookup_error(&name, err, FAILED))?;
    let peek = chroma
        .peek(&collection.id, PEEK_LIMIT)
        .await
        .map_err(|err| lookup_error(&name, err, FAILED))?;

    Ok(Json(json!({
        "name": collection.name,
        "id": collection.id,
        "metadata": collection.metadata,
        "count": count,
        "peek": peek,
    })))
}

/// Paging window for collection browsing.
#[derive(Debug, Deserialize)]
pub struct PageBody {
    /// Records to skip.
    #[serde(default)]
    pub offset: usize,
    /// Records to return.
    #[serde(default = "default_page_limit")]
    pub limit: usize,
}

const fn default_page_limit() -> usize {
    PEEK_LIMIT
}

async fn query_collection(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    page: Result<Json<PageBody>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    const FAILED: &str = "Failed to query collection";
    let Json(page) = page.map_err(|rejection| {
        warn!(collection = %name, error = %rejection.body_text(), "Unreadable paging body");
        ApiError::internal(FAILED)
    })?;
    info!(collection = %name, offset = page.offset, limit = page.limit, "Querying collection");
    let chroma = chroma(&state)?;
    let collection = chroma
        .get_collection(&name)
        .await
        .map_err(|err| lookup_error(&name, err, FAILED))?;
    let request = GetRequest {
        limit: Some(page.limit),
        offset: Some(page.offset),
        include: vec![Include::Documents, Include::Metadatas],
        ..GetRequest::default()
    };
    let records = chroma
        .get(&collection.id, &request)
        .await
        .map_err(|err| lookup_error(&name, err, FAILED))?;
    Ok(Json(json!(records)))
}

/// Optional `$contains` filter for the debug view.
#[derive(Debug, Deserialize)]
pub struct DebugQuery {
    /// Substring to search for in documents.
    pub query: Option<String>,
}

async fn debug_collection(
    State(state): State<Arc<AppState>>,
    Query(params): Query<DebugQuery>,
) -> Result<Json<Value>, ApiError> {
    let chroma = chroma(&state)?;
    let to_api = |err: RagError| ApiError::internal(err.to_string());
    let collection = chroma.get_collection(RECIPE_COLLECTION).await.map_err(to_api)?;

    if let Some(query) = params.query.filter(|q| !q.is_empty()) {
        let request = GetRequest {
            where_document: Some(json!({ "$contains": query })),
            limit: Some(DEBUG_LIMIT),
            include: vec![Include::Documents, Include::Metadatas, Include::Embeddings],
            ..GetRequest::default()
        };
        let records = chroma.get(&collection.id, &request).await.map_err(to_api)?;
        let documents = records.documents.unwrap_or_default();
        let metadatas = records.metadatas.unwrap_or_default();
        let results: Vec<Value> = records
            .ids
            .iter()
            .enumerate()
            .map(|(i, id)| {
                let document = documents.get(i).cloned().flatten();
                let preview = document
                    .as_deref()
                    .map(|doc| doc.chars().take(PREVIEW_CHARS).collect::<String>());
                json!({
                    "id": id,
                    "metadata": metadatas.get(i).cloned().flatten(),
                    "document_preview": preview,
                    "full_document": document,
                })
            })
            .collect();
        return Ok(Json(json!({
            "query": query,
            "count": records.ids.len(),
            "results": results,
        })));
    }

    let peek = chroma.peek(&collection.id, 1).await.map_err(to_api)?;
    let count = chroma.count(&collection.id).await.map_err(to_api)?;
    let first_document = peek
        .documents
        .and_then(|docs| docs.into_iter().next())
        .flatten();
    Ok(Json(json!({
        "name": collection.name,
        "count": count,
        "firstItem": {
            "id": peek.ids.first(),
            "document": first_document,
        },
    })))
}

struct DemoRecipe {
    id: &'static str,
    title: &'static str,
    category: &'static str,
    document: &'static str,
}

const DEMO_RECIPES: [DemoRecipe; 2] = [
    DemoRecipe {
        id: "recipe_1",
        title: "番茄炒蛋",
        category: "家常菜",
        document: "番茄炒蛋做法：\n1. 鸡蛋打散，番茄切块。\n2. 热锅凉油，倒入蛋液炒熟盛出。\n3. 锅中留底油，放入番茄炒出汁。\n4. 倒入鸡蛋，加盐、糖调味，翻炒均匀即可。",
    },
    DemoRecipe {
        id: "recipe_2",
        title: "红烧肉",
        category: "硬菜",
        document: "红烧肉做法：\n1. 五花肉切块，焯水洗净。\n2. 锅中放糖炒糖色，放入肉块翻炒上色。\n3. 加入生抽、老抽、料酒、八角、桂皮、香叶。\n4. 加开水没过肉，小火炖煮一小时。\n5. 大火收汁即可。",
    },
];

async fn seed_recipes(State(state): State<Arc<AppState>>) -> Result<Json<Value>, ApiError> {
    const FAILED: &str = "Failed to seed recipes";
    let chroma = chroma(&state)?;
    let embedder = state
        .embedder
        .as_ref()
        .ok_or_else(|| ApiError::Unavailable("Embedding model is not configured".to_string()))?;

    info!(collection = SEED_COLLECTION, "Seeding recipes collection");
    let collection = chroma
        .create_collection(SEED_COLLECTION, None, true)
        .await
        .map_err(|err| lookup_error(SEED_COLLECTION, err, FAILED))?;

    let documents: Vec<String> = DEMO_RECIPES.iter().map(|r| r.document.to_string()).collect();
    let embeddings = embedder
        .embed_texts(documents.clone())
        .await
        .map_err(|err| lookup_error(SEED_COLLECTION, err, FAILED))?;
    let metadatas = DEMO_RECIPES
        .iter()
        .map(|r| {
            let mut metadata = Metadata::new();
            metadata.insert("title".to_string(), json!(r.title));
            metadata.insert("category".to_string(), json!(r.category));
            metadata
        })
        .collect();
    let request = AddRequest {
        ids: DEMO_RECIPES.iter().map(|r| r.id.to_string()).collect(),
        embeddings,
        documents: Some(documents),
        metadatas: Some(metadatas),
    };
    chroma
        .add(&collection.id, &request)
        .await
        .map_err(|err| lookup_error(SEED_COLLECTION, err, FAILED))?;

    Ok(Json(json!({
        "message": "Recipes seeded successfully",
        "count": DEMO_RECIPES.len(),
    })))
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::response::Response;
    use http_body_util::BodyExt;
    use mockito::Matcher;
    use tower::ServiceExt;

    use super::*;
    use crate::config::ChromaConfig;
    use crate::rag::{EmbedFuture, Embedder, RagResult};
    use crate::server::create_router;

    const COLLECTIONS: &str = "/api/v2/tenants/default_tenant/databases/default_database/collections";

    struct UnitEmbedder;

    impl Embedder for UnitEmbedder {
        fn embed_texts(&self, texts: Vec<String>) -> EmbedFuture<'_, RagResult<Vec<Vec<f32>>>> {
            Box::pin(async move { Ok(texts.iter().map(|_| vec![1.0, 0.0]).collect()) })
        }
    }

    fn state(server: &mockito::ServerGuard) -> AppState {
        let config = ChromaConfig::from_url(&server.url()).unwrap_or_default();
        let Ok(chroma) = ChromaClient::new(&config) else { panic!("client") };
        AppState::default()
            .with_chroma(chroma)
            .with_embedder(Arc::new(UnitEmbedder))
    }

    async fn call(state: AppState, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(body) => {
                builder = builder.header("content-type", "application/json");
                Body::from(body.to_string())
            }
            None => Body::empty(),
        };
        let request = builder.body(body).unwrap_or_default();
        let Ok(response) = create_router(Arc::new(state)).oneshot(request).await else {
            panic!("router failed")
        };
        let status = response.status();
        (status, json_body(response).await)
    }

    async fn json_body(response: Response) -> Value {
        let bytes = response
            .into_body()
            .collect()
            .await
            .map(|collected| collected.to_bytes())
            .unwrap_or_default();
        serde_json::from_slice(&bytes).unwrap_or_default()
    }

    #[tokio::test]
    async fn test_routes_need_vector_store() {
        for (method, uri) in [
            ("GET", "/api/chroma/collections"),
            ("GET", "/api/chroma/debug"),
            ("POST", "/api/chroma/seed"),
        ] {
            let (status, body) = call(AppState::default(), method, uri, None).await;
            assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE, "{uri}");
            assert_eq!(body, json!({"error": "Vector store is not configured"}));
        }
    }

    #[tokio::test]
    async fn test_list_collections() {
        let mut server = mockito::Server::new_async().await;
        let _list = server
            .mock("GET", COLLECTIONS)
            .with_status(200)
            .with_body(
                json!([{"id": "c1", "name": "how-to-cook", "metadata": {"hnsw:space": "cosine"}, "tenant": "t"}])
                    .to_string(),
            )
            .create_async()
            .await;
        let (status, body) = call(state(&server), "GET", "/api/chroma/collections", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!([{"name": "how-to-cook", "id": "c1", "metadata": {"hnsw:space": "cosine"}}])
        );
    }

    #[tokio::test]
    async fn test_collection_details_and_paging() {
        let mut server = mockito::Server::new_async().await;
        let _get = server
            .mock("GET", format!("{COLLECTIONS}/recipes").as_str())
            .with_status(200)
            .with_body(json!({"id": "c9", "name": "recipes", "metadata": null}).to_string())
            .create_async()
            .await;
        let _count = server
            .mock("GET", format!("{COLLECTIONS}/c9/count").as_str())
            .with_status(200)
            .with_body("2")
            .create_async()
            .await;
        let peek = server
            .mock("POST", format!("{COLLECTIONS}/c9/get").as_str())
            .match_body(Matcher::PartialJson(json!({
                "limit": 10,
                "include": ["embeddings", "documents", "metadatas"]
            })))
            .with_status(200)
            .with_body(json!({"ids": ["a"], "documents": ["doc"], "metadatas": [null], "embeddings": [[0.5]]}).to_string())
            .create_async()
            .await;
        let page_mock = server
            .mock("POST", format!("{COLLECTIONS}/c9/get").as_str())
            .match_body(Matcher::PartialJson(json!({
                "limit": 10,
                "offset": 0,
                "include": ["documents", "metadatas"]
            })))
            .with_status(200)
            .with_body(json!({"ids": ["a"], "documents": ["doc"], "metadatas": [null]}).to_string())
            .create_async()
            .await;

        let (status, body) = call(state(&server), "GET", "/api/chroma/collection/recipes", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 2);
        assert_eq!(body["id"], "c9");
        assert_eq!(body["peek"]["ids"], json!(["a"]));
        assert_eq!(body["peek"]["documents"], json!(["doc"]));
        assert_eq!(body["peek"]["embeddings"], json!([[0.5]]));

        let (status, page) = call(
            state(&server),
            "POST",
            "/api/chroma/collection/recipes",
            Some(json!({"offset": 0})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(page["ids"], json!(["a"]));
        assert_eq!(page["embeddings"], Value::Null);
        peek.assert_async().await;
        page_mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_paging_malformed_body_is_json_500() {
        let server = mockito::Server::new_async().await;
        let router = create_router(Arc::new(state(&server)));
        for (content_type, body) in [(Some("application/json"), "{not json"), (None, r#"{"offset": 0}"#)] {
            let mut builder = Request::builder()
                .method("POST")
                .uri("/api/chroma/collection/recipes");
            if let Some(content_type) = content_type {
                builder = builder.header("content-type", content_type);
            }
            let request = builder.body(Body::from(body)).unwrap_or_default();
            let Ok(response) = router.clone().oneshot(request).await else {
                panic!("router failed")
            };
            assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
            assert_eq!(json_body(response).await, json!({"error": "Failed to query collection"}));
        }
    }

    #[tokio::test]
    async fn test_unknown_collection_is_404() {
        let mut server = mockito::Server::new_async().await;
        let _missing = server
            .mock("GET", format!("{COLLECTIONS}/nope").as_str())
            .with_status(404)
            .with_body("{}")
            .create_async()
            .await;
        let (status, body) = call(state(&server), "GET", "/api/chroma/collection/nope", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, json!({"error": "Collection nope not found"}));
    }

    #[tokio::test]
    async fn test_debug_with_query() {
        let mut server = mockito::Server::new_async().await;
        let _get = server
            .mock("GET", format!("{COLLECTIONS}/how-to-cook").as_str())
            .with_status(200)
            .with_body(json!({"id": "h1", "name": "how-to-cook"}).to_string())
            .create_async()
            .await;
        let long = "蛋".repeat(250);
        let search = server
            .mock("POST", format!("{COLLECTIONS}/h1/get").as_str())
            .match_body(Matcher::PartialJson(json!({
                "where_document": {"$contains": "蛋"},
                "limit": 3
            })))
            .with_status(200)
            .with_body(
                json!({
                    "ids": ["x1"],
                    "documents": [long],
                    "metadatas": [{"relativePath": "dishes/egg.md"}]
                })
                .to_string(),
            )
            .create_async()
            .await;

        let (status, body) = call(state(&server), "GET", "/api/chroma/debug?query=%E8%9B%8B", None).await;
        search.assert_async().await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["query"], "蛋");
        assert_eq!(body["count"], 1);
        let result = &body["results"][0];
        assert_eq!(result["metadata"]["relativePath"], "dishes/egg.md");
        assert_eq!(result["document_preview"].as_str().map(|p| p.chars().count()), Some(200));
        assert_eq!(result["full_document"].as_str().map(|p| p.chars().count()), Some(250));
    }

    #[tokio::test]
    async fn test_debug_summary() {
        let mut server = mockito::Server::new_async().await;
        let _get = server
            .mock("GET", format!("{COLLECTIONS}/how-to-cook").as_str())
            .with_status(200)
            .with_body(json!({"id": "h1", "name": "how-to-cook"}).to_string())
            .create_async()
            .await;
        let _peek = server
            .mock("POST", format!("{COLLECTIONS}/h1/get").as_str())
            .with_status(200)
            .with_body(json!({"ids": ["x1"], "documents": ["first"]}).to_string())
            .create_async()
            .await;
        let _count = server
            .mock("GET", format!("{COLLECTIONS}/h1/count").as_str())
            .with_status(200)
            .with_body("42")
            .create_async()
            .await;

        let (status, body) = call(state(&server), "GET", "/api/chroma/debug", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({"name": "how-to-cook", "count": 42, "firstItem": {"id": "x1", "document": "first"}})
        );
    }

    #[tokio::test]
    async fn test_seed_adds_demo_recipes() {
        let mut server = mockito::Server::new_async().await;
        let _create = server
            .mock("POST", COLLECTIONS)
            .match_body(Matcher::PartialJson(json!({"name": "recipes", "get_or_create": true})))
            .with_status(200)
            .with_body(json!({"id": "r1", "name": "recipes"}).to_string())
            .create_async()
            .await;
        let add = server
            .mock("POST", format!("{COLLECTIONS}/r1/add").as_str())
            .match_body(Matcher::PartialJson(json!({
                "ids": ["recipe_1", "recipe_2"],
                "embeddings": [[1.0, 0.0], [1.0, 0.0]],
                "metadatas": [
                    {"title": "番茄炒蛋", "category": "家常菜"},
                    {"title": "红烧肉", "category": "硬菜"}
                ]
            })))
            .with_status(201)
            .with_body("{}")
            .expect(1)
            .create_async()
            .await;

        let (status, body) = call(state(&server), "POST", "/api/chroma/seed", None).await;
        add.assert_async().await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"message": "Recipes seeded successfully", "count": 2}));
    }
}
