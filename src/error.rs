// error.rs — the workflow error taxonomy and its HTTP mapping.
//
// Every fallible service operation returns `WorkflowError`. Internal causes
// (storage, blob I/O) funnel into `Internal` and are logged with full context;
// the wire response stays opaque for that variant only.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::error;

#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    /// Missing or malformed required fields. Always client-fixable;
    /// the message names the offending field.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Task, attachment, or referenced record not resolvable.
    #[error("{0} not found")]
    NotFound(String),

    /// Attachment over the per-file byte cap.
    #[error("file '{name}' is {size} bytes, over the {limit} byte limit")]
    PayloadTooLarge { name: String, size: u64, limit: u64 },

    /// Attachment failed both the content-type and extension allow-lists.
    /// `allowed` carries the accepted extensions so the caller can see
    /// what would be admitted.
    #[error("file '{name}' has unsupported type '{content_type}'; accepted extensions: {allowed}")]
    UnsupportedMediaType {
        name: String,
        content_type: String,
        allowed: String,
    },

    /// Bearer token absent, malformed, expired, or bad signature.
    #[error("unauthenticated: {0}")]
    Unauthenticated(String),

    /// Token valid but its role lacks the required permission.
    #[error("permission '{0}' required")]
    Forbidden(String),

    /// Storage or blob transport failure. Logged here, opaque on the wire.
    #[error("internal error")]
    Internal(#[from] anyhow::Error),
}

impl From<sqlx::Error> for WorkflowError {
    fn from(e: sqlx::Error) -> Self {
        WorkflowError::Internal(anyhow::Error::new(e).context("database operation failed"))
    }
}

impl WorkflowError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            WorkflowError::Validation(_) => StatusCode::BAD_REQUEST,
            WorkflowError::NotFound(_) => StatusCode::NOT_FOUND,
            WorkflowError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            WorkflowError::UnsupportedMediaType { .. } => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            WorkflowError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            WorkflowError::Forbidden(_) => StatusCode::FORBIDDEN,
            WorkflowError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for WorkflowError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = match &self {
            WorkflowError::Internal(e) => {
                error!(err = ?e, "internal error");
                json!({ "error": "internal error" })
            }
            other => json!({ "error": other.to_string() }),
        };
        (status, Json(body)).into_response()
    }
}
