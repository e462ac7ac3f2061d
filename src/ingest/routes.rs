//! HTTP wrapper around the ingestion job.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use tokio::sync::Mutex;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::ingest::service::IngestService;

struct IngestState {
    service: IngestService,
    // Runs rebuild the same collection, so they never overlap.
    running: Mutex<()>,
}

/// Router exposing `/`, `/ingest/how-to-cook` and `/health`.
pub fn ingest_router(service: IngestService) -> Router {
    let state = Arc::new(IngestState {
        service,
        running: Mutex::new(()),
    });
    Router::new()
        .route("/", get(hello))
        .route("/ingest/how-to-cook", get(ingest_how_to_cook))
        .route("/health", get(health))
        .with_state(state)
}

/// Bind `0.0.0.0:port` and serve until `shutdown` completes.
///
/// # Errors
/// Returns an error if the listener cannot be bound.
pub async fn serve_ingest<F>(service: IngestService, port: u16, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = ingest_router(service).layer(TraceLayer::new_for_http());
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Ingestion service running on port {port}");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
}

async fn hello() -> impl IntoResponse {
    Json(json!({ "message": "Hello from the Apex AI ingestion service!" }))
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

async fn ingest_how_to_cook(State(state): State<Arc<IngestState>>) -> Response {
    let _guard = state.running.lock().await;
    match state.service.run().await {
        Ok(report) => Json(report).into_response(),
        Err(err) => {
            error!(error = %err, "Ingestion failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Ingestion failed", "details": err.to_string() })),
            )
                .into_response()
        }
    }
}
