//! HTTP route handlers for the Apex AI web app.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::{HeaderValue, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tower_http::services::{ServeDir, ServeFile};
use tracing::{error, info, warn};

use crate::chat::{TextStream, reasoning_stream};
use crate::llm::{ChatMessage, Role};

use super::chroma_routes::chroma_routes;
use super::error::{ApiError, VECTOR_STORE_DISABLED};
use super::state::AppState;

const CHAT_FAILED: &str = "Failed to fetch response from DeepSeek API";
const REASONING_FAILED: &str = "Internal server error";

/// Create the router with API routes and static pages.
pub fn create_router(state: Arc<AppState>) -> Router {
    let static_dir = state.static_dir.clone();
    Router::new()
        .route("/health", get(health_check))
        .route("/api/chat", post(chat))
        .route("/api/langchain", post(reasoning))
        .route("/api/recipe", post(recipe))
        .merge(chroma_routes())
        .route_service("/chroma", ServeFile::new(static_dir.join("chroma.html")))
        .route_service("/demo", ServeFile::new(static_dir.join("demo.html")))
        .fallback_service(ServeDir::new(static_dir))
        .with_state(state)
}

/// Health check endpoint.
async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "apex-ai",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Conversation sent by the pages.
#[derive(Debug, Default, Deserialize)]
pub struct MessagesBody {
    /// Prior turns, oldest first.
    #[serde(default)]
    pub messages: Vec<IncomingMessage>,
}

/// One client-side message. Unknown roles are treated as the user.
#[derive(Debug, Deserialize)]
pub struct IncomingMessage {
    /// Role name.
    #[serde(default)]
    pub role: String,
    /// Text; non-string content is forwarded as JSON text.
    #[serde(default)]
    pub content: Value,
}

impl From<IncomingMessage> for ChatMessage {
    fn from(message: IncomingMessage) -> Self {
        let content = match message.content {
            Value::String(text) => text,
            Value::Null => String::new(),
            other => other.to_string(),
        };
        Self {
            role: Role::from_lenient(&message.role),
            content: Some(content),
            tool_calls: None,
            tool_call_id: None,
        }
    }
}

impl MessagesBody {
    fn into_messages(self) -> Vec<ChatMessage> {
        self.messages.into_iter().map(ChatMessage::from).collect()
    }
}

fn text_stream_response(stream: TextStream, chunked: bool) -> Response {
    let mut response = Body::from_stream(stream).into_response();
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    if chunked {
        headers.insert(header::TRANSFER_ENCODING, HeaderValue::from_static("chunked"));
    }
    response
}

/// Tool-calling chat, streamed as plain text.
async fn chat(
    State(state): State<Arc<AppState>>,
    body: Result<Json<MessagesBody>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(body) = body.map_err(|rejection| {
        warn!(error = %rejection.body_text(), "Unreadable chat request body");
        ApiError::internal(CHAT_FAILED)
    })?;
    let Some(pipeline) = state.pipeline.as_ref() else {
        error!("Chat requested but DEEPSEEK_API_KEY is not configured");
        return Err(ApiError::internal(CHAT_FAILED));
    };
    let stream = pipeline
        .respond(body.into_messages())
        .await
        .map_err(|err| {
            error!(error = %err, "Error calling DeepSeek API");
            ApiError::internal(CHAT_FAILED)
        })?;
    Ok(text_stream_response(stream, false))
}

/// Reasoning stream with `<think>` framing.
async fn reasoning(
    State(state): State<Arc<AppState>>,
    body: Result<Json<MessagesBody>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(body) = body.map_err(|rejection| {
        warn!(error = %rejection.body_text(), "Unreadable reasoning request body");
        ApiError::internal(REASONING_FAILED)
    })?;
    if body.messages.is_empty() {
        return Err(ApiError::BadRequest("messages must not be empty".to_string()));
    }
    let Some(model) = state.reasoner.as_deref() else {
        error!("Reasoning requested but DEEPSEEK_API_KEY is not configured");
        return Err(ApiError::internal(REASONING_FAILED));
    };
    let stream = reasoning_stream(model, &state.reasoner_model, body.into_messages())
        .await
        .map_err(|err| {
            error!(error = %err, "Error starting reasoning stream");
            ApiError::internal(REASONING_FAILED)
        })?;
    Ok(text_stream_response(stream, true))
}

/// Free-text recipe question.
#[derive(Debug, Deserialize)]
pub struct RecipeBody {
    /// The user's sentence, e.g. "how do I make 番茄炒蛋?".
    pub message: String,
}

/// Recipe lookup result.
#[derive(Debug, Serialize)]
pub struct RecipeResponse {
    /// Dish name extracted from the message.
    pub dish: String,
    /// Best matching recipe, if any.
    pub recipe: Option<String>,
}

/// Extract the dish from a sentence and look up its recipe.
async fn recipe(
    State(state): State<Arc<AppState>>,
    body: Result<Json<RecipeBody>, JsonRejection>,
) -> Result<Json<RecipeResponse>, ApiError> {
    let Json(body) = body.map_err(|rejection| ApiError::invalid_body(&rejection))?;
    if body.message.trim().is_empty() {
        return Err(ApiError::BadRequest("message must not be empty".to_string()));
    }
    let recipes = state
        .recipes
        .as_ref()
        .ok_or_else(|| ApiError::Unavailable(VECTOR_STORE_DISABLED.to_string()))?;

    let dish = recipes.extract_dish_name(&body.message).await.map_err(|err| {
        error!(error = %err, "Dish name extraction failed");
        ApiError::internal("Failed to extract dish name")
    })?;
    info!(dish = %dish, "Extracted dish name");

    let recipe = recipes.search_recipe(&dish).await.map_err(|err| {
        error!(error = %err, "Recipe search failed");
        ApiError::internal("Failed to search recipe")
    })?;
    Ok(Json(RecipeResponse { dish, recipe }))
}

#[cfg(test)]
mod tests {
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use serde_json::json;
    use tower::ServiceExt;

    use super::*;
    use crate::chat::ChatPipeline;
    use crate::llm::testing::ScriptedModel;
    use crate::llm::{AssistantMessage, LlmError, StreamDelta};
    use crate::tools::ToolRegistry;

    fn post(uri: &str, body: &Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap_or_default()
    }

    fn post_raw(uri: &str, content_type: Option<&str>, body: &'static str) -> Request<Body> {
        let mut builder = Request::builder().method("POST").uri(uri);
        if let Some(content_type) = content_type {
            builder = builder.header("content-type", content_type);
        }
        builder.body(Body::from(body)).unwrap_or_default()
    }

    async fn json_body(response: Response) -> Value {
        serde_json::from_str(&body_text(response).await).unwrap_or_default()
    }

    async fn send(state: AppState, request: Request<Body>) -> (StatusCode, Response) {
        let Ok(response) = create_router(Arc::new(state)).oneshot(request).await else {
            panic!("router failed")
        };
        (response.status(), response)
    }

    async fn body_text(response: Response) -> String {
        let bytes = response
            .into_body()
            .collect()
            .await
            .map(|collected| collected.to_bytes())
            .unwrap_or_default();
        String::from_utf8_lossy(&bytes).into_owned()
    }

    #[tokio::test]
    async fn test_health() {
        let request = Request::builder().uri("/health").body(Body::empty()).unwrap_or_default();
        let (status, response) = send(AppState::default(), request).await;
        assert_eq!(status, StatusCode::OK);
        let body: Value = serde_json::from_str(&body_text(response).await).unwrap_or_default();
        assert_eq!(body["status"], "ok");
        assert_eq!(body["service"], "apex-ai");
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn test_chat_streams_plain_text() {
        let model = Arc::new(ScriptedModel::new().with_completion(AssistantMessage {
            content: Some("Hi!".to_string()),
            ..AssistantMessage::default()
        }));
        let pipeline = ChatPipeline::new(model.clone(), Arc::new(ToolRegistry::new()), "deepseek-chat", "sys")
            .with_typewriter_delay(std::time::Duration::ZERO);
        let state = AppState::default().with_pipeline(pipeline);

        let (status, response) = send(
            state,
            post("/api/chat", &json!({"messages": [{"role": "user", "content": "hello"}]})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).and_then(|v| v.to_str().ok()),
            Some("text/plain; charset=utf-8")
        );
        assert_eq!(body_text(response).await, "Hi!");
        assert_eq!(model.requests()[0].messages[1].content.as_deref(), Some("hello"));
    }

    #[tokio::test]
    async fn test_chat_failure_is_json_500() {
        let model = Arc::new(ScriptedModel::new().with_completion_error(LlmError::EmptyResponse));
        let pipeline = ChatPipeline::new(model, Arc::new(ToolRegistry::new()), "deepseek-chat", "sys");
        let (status, response) = send(
            AppState::default().with_pipeline(pipeline),
            post("/api/chat", &json!({"messages": []})),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        let body: Value = serde_json::from_str(&body_text(response).await).unwrap_or_default();
        assert_eq!(body, json!({"error": "Failed to fetch response from DeepSeek API"}));
    }

    #[tokio::test]
    async fn test_reasoning_stream_route() {
        let model = Arc::new(ScriptedModel::new().with_stream(vec![
            Ok(StreamDelta::reasoning("why")),
            Ok(StreamDelta::content("because")),
        ]));
        let state = AppState::default().with_reasoner(model, "deepseek-reasoner");
        let (status, response) = send(
            state,
            post("/api/langchain", &json!({"messages": [{"role": "human", "content": "q"}]})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            response.headers().get(header::TRANSFER_ENCODING).and_then(|v| v.to_str().ok()),
            Some("chunked")
        );
        assert_eq!(body_text(response).await, "<think>\nwhy\n</think>\nbecause");
    }

    #[tokio::test]
    async fn test_reasoning_rejects_empty_messages() {
        let (status, _) = send(AppState::default(), post("/api/langchain", &json!({"messages": []}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_reasoning_start_failure() {
        let model = Arc::new(ScriptedModel::new());
        let state = AppState::default().with_reasoner(model, "deepseek-reasoner");
        let (status, response) = send(
            state,
            post("/api/langchain", &json!({"messages": [{"role": "user", "content": "q"}]})),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        let body: Value = serde_json::from_str(&body_text(response).await).unwrap_or_default();
        assert_eq!(body, json!({"error": "Internal server error"}));
    }

    #[tokio::test]
    async fn test_recipe_without_vector_store() {
        let (status, response) = send(AppState::default(), post("/api/recipe", &json!({"message": "番茄炒蛋怎么做"}))).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        let body: Value = serde_json::from_str(&body_text(response).await).unwrap_or_default();
        assert_eq!(body, json!({"error": "Vector store is not configured"}));
    }

    #[tokio::test]
    async fn test_chat_malformed_body_is_json_500() {
        let model = Arc::new(ScriptedModel::new());
        let pipeline = ChatPipeline::new(model.clone(), Arc::new(ToolRegistry::new()), "deepseek-chat", "sys");
        let state = AppState::default().with_pipeline(pipeline);
        let router = create_router(Arc::new(state));

        for request in [
            post_raw("/api/chat", Some("application/json"), "{not json"),
            post_raw("/api/chat", None, r#"{"messages": []}"#),
            post_raw("/api/chat", Some("application/json"), r#"{"messages": "hi"}"#),
        ] {
            let Ok(response) = router.clone().oneshot(request).await else {
                panic!("router failed")
            };
            assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
            assert_eq!(
                response.headers().get(header::CONTENT_TYPE).and_then(|v| v.to_str().ok()),
                Some("application/json")
            );
            assert_eq!(json_body(response).await, json!({"error": CHAT_FAILED}));
        }
        assert!(model.requests().is_empty());
    }

    #[tokio::test]
    async fn test_reasoning_malformed_body_is_json_500() {
        let model = Arc::new(ScriptedModel::new());
        let state = AppState::default().with_reasoner(model.clone(), "deepseek-reasoner");
        let router = create_router(Arc::new(state));

        for request in [
            post_raw("/api/langchain", Some("application/json"), "{not json"),
            post_raw("/api/langchain", Some("text/plain"), r#"{"messages": []}"#),
        ] {
            let Ok(response) = router.clone().oneshot(request).await else {
                panic!("router failed")
            };
            assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
            assert_eq!(json_body(response).await, json!({"error": "Internal server error"}));
        }
        assert!(model.requests().is_empty());
    }

    #[tokio::test]
    async fn test_recipe_malformed_body_is_json_400() {
        let (status, response) =
            send(AppState::default(), post_raw("/api/recipe", Some("application/json"), "{not json")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        let message = body["error"].as_str().unwrap_or_default();
        assert!(message.starts_with("Invalid request body"), "{message}");

        let (status, _) =
            send(AppState::default(), post_raw("/api/recipe", None, r#"{"message": "红烧肉"}"#)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_incoming_message_mapping() {
        let message: IncomingMessage =
            serde_json::from_value(json!({"role": "assistant", "content": ["a"]})).unwrap_or(IncomingMessage {
                role: String::new(),
                content: Value::Null,
            });
        let mapped = ChatMessage::from(message);
        assert_eq!(mapped.role, Role::Assistant);
        assert_eq!(mapped.content.as_deref(), Some(r#"["a"]"#));
    }
}
