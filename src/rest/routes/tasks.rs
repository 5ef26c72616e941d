// rest/routes/tasks.rs — work-order routes.
//
// Creation and developer updates arrive as multipart forms (text fields plus
// file parts); everything else is plain JSON. Handlers decode the wire shape
// and delegate to the workflow service, which owns validation, admission and
// transitions.

use axum::{
    extract::{multipart::Field, Multipart, Path, State},
    http::{header, HeaderMap},
    Json,
};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::attachments::IncomingFile;
use crate::error::WorkflowError;
use crate::tasks::model::{
    AssignRequest, CompanyRef, ContactRef, CreateTaskRequest, DeveloperUpdateRequest,
    ReviewRequest, TaskView, UnpostRequest,
};
use crate::AppContext;

fn multipart_err(e: axum::extract::multipart::MultipartError) -> WorkflowError {
    WorkflowError::Validation(format!("malformed multipart body: {e}"))
}

fn parse_json_field<T: serde::de::DeserializeOwned>(
    name: &str,
    text: &str,
) -> Result<T, WorkflowError> {
    serde_json::from_str(text)
        .map_err(|e| WorkflowError::Validation(format!("{name} must be a JSON object: {e}")))
}

async fn read_file(field: Field<'_>) -> Result<IncomingFile, WorkflowError> {
    let name = field.file_name().unwrap_or("unnamed").to_string();
    let content_type = field.content_type().unwrap_or("").to_string();
    let bytes = field.bytes().await.map_err(multipart_err)?.to_vec();
    Ok(IncomingFile {
        name,
        content_type,
        bytes,
    })
}

// ─── Creation ─────────────────────────────────────────────────────────────────

/// POST /api/tasks — multipart fields `code`, `company` (JSON), `contact`
/// (JSON), `working`, `date_time`, `created_by`, plus any number of `files`
/// parts.
pub async fn create_task(
    State(ctx): State<Arc<AppContext>>,
    mut multipart: Multipart,
) -> Result<Json<TaskView>, WorkflowError> {
    let mut code = String::new();
    let mut company: Option<CompanyRef> = None;
    let mut contact: Option<ContactRef> = None;
    let mut working = String::new();
    let mut date_time = String::new();
    let mut created_by = String::new();
    let mut files = Vec::new();

    while let Some(field) = multipart.next_field().await.map_err(multipart_err)? {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "code" => code = field.text().await.map_err(multipart_err)?,
            "company" => {
                company = Some(parse_json_field(
                    "company",
                    &field.text().await.map_err(multipart_err)?,
                )?)
            }
            "contact" => {
                contact = Some(parse_json_field(
                    "contact",
                    &field.text().await.map_err(multipart_err)?,
                )?)
            }
            "working" => working = field.text().await.map_err(multipart_err)?,
            "date_time" => date_time = field.text().await.map_err(multipart_err)?,
            "created_by" => created_by = field.text().await.map_err(multipart_err)?,
            "files" => files.push(read_file(field).await?),
            _ => {}
        }
    }

    let req = CreateTaskRequest {
        code,
        company: company
            .ok_or_else(|| WorkflowError::Validation("company is required".into()))?,
        contact: contact
            .ok_or_else(|| WorkflowError::Validation("contact is required".into()))?,
        working,
        date_time,
        created_by,
    };
    let view = ctx.workflow.create_task(req, files).await?;
    Ok(Json(view))
}

// ─── Reads ────────────────────────────────────────────────────────────────────

pub async fn list_tasks(
    State(ctx): State<Arc<AppContext>>,
) -> Result<Json<Vec<TaskView>>, WorkflowError> {
    Ok(Json(ctx.workflow.list_all_views().await?))
}

pub async fn list_active(
    State(ctx): State<Arc<AppContext>>,
) -> Result<Json<Vec<TaskView>>, WorkflowError> {
    Ok(Json(ctx.workflow.list_active_views().await?))
}

pub async fn completed_report(
    State(ctx): State<Arc<AppContext>>,
) -> Result<Json<Vec<TaskView>>, WorkflowError> {
    Ok(Json(ctx.workflow.completed_report_views().await?))
}

pub async fn get_task(
    State(ctx): State<Arc<AppContext>>,
    Path(id): Path<String>,
) -> Result<Json<TaskView>, WorkflowError> {
    Ok(Json(ctx.workflow.get_task_view(&id).await?))
}

// ─── Primary-axis operations ──────────────────────────────────────────────────

pub async fn assign_task(
    State(ctx): State<Arc<AppContext>>,
    Path(id): Path<String>,
    Json(req): Json<AssignRequest>,
) -> Result<Json<TaskView>, WorkflowError> {
    Ok(Json(ctx.workflow.assign_task(&id, req).await?))
}

pub async fn approve_task(
    State(ctx): State<Arc<AppContext>>,
    Path(id): Path<String>,
) -> Result<Json<TaskView>, WorkflowError> {
    Ok(Json(ctx.workflow.approve_task(&id).await?))
}

pub async fn review_task(
    State(ctx): State<Arc<AppContext>>,
    Path(id): Path<String>,
    Json(req): Json<ReviewRequest>,
) -> Result<Json<TaskView>, WorkflowError> {
    Ok(Json(ctx.workflow.review_task(&id, req).await?))
}

pub async fn hold_task(
    State(ctx): State<Arc<AppContext>>,
    Path(id): Path<String>,
) -> Result<Json<TaskView>, WorkflowError> {
    Ok(Json(ctx.workflow.hold_task(&id).await?))
}

// ─── Developer axis ───────────────────────────────────────────────────────────

/// POST /api/tasks/{id}/developer — multipart fields `developer_status`,
/// `developer_remarks`, optional `developer_status_rejection` and
/// `developer_rejection_remarks`, plus `developer_files` and
/// `rejection_files` parts.
pub async fn update_developer(
    State(ctx): State<Arc<AppContext>>,
    Path(id): Path<String>,
    mut multipart: Multipart,
) -> Result<Json<TaskView>, WorkflowError> {
    let mut req = DeveloperUpdateRequest::default();
    let mut developer_files = Vec::new();
    let mut fix_files = Vec::new();

    while let Some(field) = multipart.next_field().await.map_err(multipart_err)? {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "developer_status" => {
                req.developer_status = field.text().await.map_err(multipart_err)?
            }
            "developer_remarks" => {
                req.developer_remarks = field.text().await.map_err(multipart_err)?
            }
            "developer_status_rejection" => {
                req.developer_status_rejection = Some(field.text().await.map_err(multipart_err)?)
            }
            "developer_rejection_remarks" => {
                req.developer_rejection_remarks = Some(field.text().await.map_err(multipart_err)?)
            }
            "developer_files" => developer_files.push(read_file(field).await?),
            "rejection_files" => fix_files.push(read_file(field).await?),
            _ => {}
        }
    }

    let view = ctx
        .workflow
        .update_developer_state(&id, req, developer_files, fix_files)
        .await?;
    Ok(Json(view))
}

// ─── Retraction ───────────────────────────────────────────────────────────────

/// POST /api/tasks/unpost — the one gated route. Requires a bearer token
/// whose role carries `tasks.unpost`.
pub async fn bulk_unpost(
    State(ctx): State<Arc<AppContext>>,
    headers: HeaderMap,
    Json(req): Json<UnpostRequest>,
) -> Result<Json<Value>, WorkflowError> {
    let auth = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());
    let count = ctx.workflow.bulk_unpost(auth, req).await?;
    Ok(Json(json!({ "unposted": count })))
}
