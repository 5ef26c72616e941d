use crate::error::WorkflowError;
use crate::AppContext;
use axum::{extract::State, Json};
use serde_json::{json, Value};
use std::sync::Arc;

pub async fn health(
    State(ctx): State<Arc<AppContext>>,
) -> Result<Json<Value>, WorkflowError> {
    let uptime = ctx.started_at.elapsed().as_secs();
    let tasks = ctx.workflow.count_tasks().await?;
    Ok(Json(json!({
        "status": "ok",
        "uptime_secs": uptime,
        "tasks": tasks,
        "version": env!("CARGO_PKG_VERSION"),
    })))
}
