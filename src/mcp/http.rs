//! Streamable-HTTP front end for [`McpServer`] at `/mcp`.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::Json;
use dashmap::DashMap;
use serde_json::Value;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tokio::time::Instant;
use tracing::{debug, info};
use uuid::Uuid;

use crate::mcp::protocol::{
    JsonRpcError, JsonRpcMessage, JsonRpcResponse, RequestId, SESSION_ID_HEADER, methods,
};
use crate::mcp::server::{McpServer, parse_error_response};

/// Sessions idle longer than this are dropped.
pub const SESSION_IDLE_TTL: Duration = Duration::from_secs(30 * 60);
/// Most sessions kept at once; the least recently used one is evicted first.
pub const MAX_SESSIONS: usize = 1024;

/// Bounds on the session table.
#[derive(Debug, Clone, Copy)]
pub struct SessionLimits {
    /// Idle time after which a session expires.
    pub idle_ttl: Duration,
    /// Capacity of the session table.
    pub max_sessions: usize,
}

impl Default for SessionLimits {
    fn default() -> Self {
        Self {
            idle_ttl: SESSION_IDLE_TTL,
            max_sessions: MAX_SESSIONS,
        }
    }
}

/// Session ids mapped to the time they were last used.
struct SessionStore {
    last_seen: DashMap<String, Instant>,
    limits: SessionLimits,
}

impl SessionStore {
    fn new(limits: SessionLimits) -> Self {
        Self {
            last_seen: DashMap::new(),
            limits: SessionLimits {
                max_sessions: limits.max_sessions.max(1),
                ..limits
            },
        }
    }

    /// Register a new session, making room first.
    fn open(&self) -> String {
        let now = Instant::now();
        self.sweep(now);
        while self.last_seen.len() >= self.limits.max_sessions {
            let oldest = self
                .last_seen
                .iter()
                .min_by_key(|entry| *entry.value())
                .map(|entry| entry.key().clone());
            let Some(oldest) = oldest else { break };
            self.last_seen.remove(&oldest);
            debug!(session = %oldest, "MCP session evicted");
        }
        let session = Uuid::new_v4().to_string();
        self.last_seen.insert(session.clone(), now);
        session
    }

    /// Refresh `session`; expired sessions are removed and reported unknown.
    fn touch(&self, session: &str) -> bool {
        let now = Instant::now();
        let Some(mut seen) = self.last_seen.get_mut(session) else {
            return false;
        };
        if now.duration_since(*seen) > self.limits.idle_ttl {
            drop(seen);
            self.last_seen.remove(session);
            debug!(session = %session, "MCP session expired");
            return false;
        }
        *seen = now;
        true
    }

    fn close(&self, session: &str) {
        self.last_seen.remove(session);
    }

    fn sweep(&self, now: Instant) {
        let ttl = self.limits.idle_ttl;
        self.last_seen.retain(|_, seen| now.duration_since(*seen) <= ttl);
    }

    fn len(&self) -> usize {
        self.last_seen.len()
    }
}

struct HttpState {
    server: Arc<McpServer>,
    sessions: SessionStore,
}

/// Router serving `server` at `/mcp` with permissive CORS.
pub fn http_router(server: Arc<McpServer>) -> Router {
    http_router_with_limits(server, SessionLimits::default())
}

/// [`http_router`] with explicit session bounds.
pub fn http_router_with_limits(server: Arc<McpServer>, limits: SessionLimits) -> Router {
    let state = Arc::new(HttpState {
        server,
        sessions: SessionStore::new(limits),
    });
    Router::new()
        .route(
            "/mcp",
            post(handle_post).delete(handle_delete).get(handle_get),
        )
        .with_state(state)
        .layer(CorsLayer::permissive())
}

/// Bind `0.0.0.0:port` and serve until `shutdown` completes.
///
/// # Errors
/// Returns an error if the listener cannot be bound.
pub async fn serve_http<F>(server: Arc<McpServer>, port: u16, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let name = server.info().name.clone();
    let app = http_router(server).layer(TraceLayer::new_for_http());
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(server = %name, "MCP Server running on http://localhost:{port}");
    info!("MCP Endpoint: http://localhost:{port}/mcp");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
}

fn rpc_error(status: StatusCode, error: JsonRpcError) -> Response {
    (status, Json(JsonRpcResponse::error(RequestId::Null, error))).into_response()
}

fn session_header(headers: &HeaderMap) -> Option<String> {
    headers
        .get(SESSION_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

fn check_session(state: &HttpState, headers: &HeaderMap) -> Result<String, Response> {
    let Some(session) = session_header(headers) else {
        return Err(rpc_error(
            StatusCode::BAD_REQUEST,
            JsonRpcError::invalid_request("Bad Request: No valid session ID provided"),
        ));
    };
    if !state.sessions.touch(&session) {
        return Err(rpc_error(
            StatusCode::NOT_FOUND,
            JsonRpcError::invalid_request("Session not found"),
        ));
    }
    Ok(session)
}

async fn handle_post(
    State(state): State<Arc<HttpState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let value: Value = match serde_json::from_slice(&body) {
        Ok(value) => value,
        Err(err) => return (StatusCode::BAD_REQUEST, Json(parse_error_response(&err))).into_response(),
    };

    let message = match JsonRpcMessage::from_value(value) {
        Ok(message) => message,
        Err((id, error)) => {
            return (StatusCode::BAD_REQUEST, Json(JsonRpcResponse::error(id, error))).into_response();
        }
    };

    let is_initialize =
        matches!(&message, JsonRpcMessage::Request(request) if request.method == methods::INITIALIZE);

    let session = if is_initialize {
        let session = state.sessions.open();
        debug!(session = %session, active = state.sessions.len(), "MCP session created");
        session
    } else {
        match check_session(&state, &headers) {
            Ok(session) => session,
            Err(response) => return response,
        }
    };

    let Some(reply) = state.server.handle_message(message).await else {
        return StatusCode::ACCEPTED.into_response();
    };

    let mut response = Json(reply).into_response();
    if let Ok(value) = HeaderValue::from_str(&session) {
        response.headers_mut().insert(SESSION_ID_HEADER, value);
    }
    response
}

async fn handle_delete(State(state): State<Arc<HttpState>>, headers: HeaderMap) -> Response {
    match check_session(&state, &headers) {
        Ok(session) => {
            state.sessions.close(&session);
            debug!(session = %session, "MCP session closed");
            StatusCode::OK.into_response()
        }
        Err(response) => response,
    }
}

async fn handle_get() -> Response {
    rpc_error(
        StatusCode::METHOD_NOT_ALLOWED,
        JsonRpcError::invalid_request("Method not allowed: server-initiated streams are not supported"),
    )
}
