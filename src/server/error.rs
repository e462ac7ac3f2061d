//! Error type returned by route handlers.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

/// Message returned by vector-store routes when Chroma is not configured.
pub const VECTOR_STORE_DISABLED: &str = "Vector store is not configured";

/// Handler failures, rendered as `{"error": "<message>"}`.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request body is unusable.
    #[error("{0}")]
    BadRequest(String),

    /// The addressed resource does not exist.
    #[error("{0}")]
    NotFound(String),

    /// A backing service is not configured.
    #[error("{0}")]
    Unavailable(String),

    /// Anything else; the message is safe to show to clients.
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    /// Internal error with a fixed client-facing message.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Body that axum could not read as JSON (bad syntax, wrong shape or
    /// missing `content-type`).
    #[must_use]
    pub fn invalid_body(rejection: &JsonRejection) -> Self {
        Self::BadRequest(format!("Invalid request body: {}", rejection.body_text()))
    }

    /// Chroma is not configured.
    #[must_use]
    pub fn vector_store_disabled() -> Self {
        Self::Unavailable(VECTOR_STORE_DISABLED.to_string())
    }

    /// Status code for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
