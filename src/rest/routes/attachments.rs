// rest/routes/attachments.rs — attachment download.

use axum::{
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Response},
};
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;

use crate::error::WorkflowError;
use crate::AppContext;

// Strip anything a browser could misread in a Content-Disposition filename.
static FILENAME_SANITIZER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^A-Za-z0-9._-]+").unwrap());

/// GET /api/attachments/{id} — stream the stored payload back with its
/// original content type and a sanitized filename.
pub async fn download(
    State(ctx): State<Arc<AppContext>>,
    Path(id): Path<String>,
) -> Result<Response, WorkflowError> {
    let (meta, payload) = ctx.workflow.get_attachment(&id).await?;

    let content_type = if meta.content_type.is_empty() {
        "application/octet-stream"
    } else {
        meta.content_type.as_str()
    };
    let safe_name = FILENAME_SANITIZER.replace_all(&meta.file_name, "_");
    let disposition = format!("attachment; filename=\"{safe_name}\"");

    Ok((
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        payload,
    )
        .into_response())
}
