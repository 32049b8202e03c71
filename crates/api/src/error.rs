//! API error responses

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use detection_loop::LoopError;
use region_store::StoreError;
use serde_json::json;
use thiserror::Error;
use tracing::warn;

/// Errors returned to HTTP clients as `{ "error": "<message>" }`
#[derive(Debug, Error)]
pub enum ApiError {
    /// Client mistake, reported verbatim
    #[error("{0}")]
    BadRequest(String),

    /// Server-side failure with a fixed client message
    #[error("{0}")]
    Internal(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Loop(#[from] LoopError),
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        ApiError::Internal(message.into())
    }

    fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Store(StoreError::InvalidIndex { .. }) => StatusCode::BAD_REQUEST,
            ApiError::Loop(e) if e.is_precondition() => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message(&self) -> String {
        match self {
            ApiError::Store(StoreError::InvalidIndex { .. }) => "Invalid index".to_string(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            warn!("Request failed: {}", self);
        }
        (status, Json(json!({ "error": self.message() }))).into_response()
    }
}
