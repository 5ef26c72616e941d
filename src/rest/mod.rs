// rest/mod.rs — HTTP API server.
//
// Axum server bridging HTTP calls to the workflow service.
//
// Endpoints:
//   GET  /health
//   POST /api/tasks                      (multipart: fields + files)
//   GET  /api/tasks
//   GET  /api/tasks/active
//   GET  /api/tasks/completed-report
//   GET  /api/tasks/stream               (SSE)
//   GET  /api/tasks/{id}
//   POST /api/tasks/{id}/assign
//   POST /api/tasks/{id}/approve
//   POST /api/tasks/{id}/review
//   POST /api/tasks/{id}/hold
//   POST /api/tasks/{id}/developer       (multipart: fields + two file batches)
//   POST /api/tasks/unpost               (bearer token, tasks.unpost)
//   GET  /api/attachments/{id}

pub mod routes;
pub mod sse;

use anyhow::Result;
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::AppContext;

/// Whole-request body cap: room for a batch of files at the per-file limit
/// plus multipart framing. Per-file size is enforced by admission.
const MAX_BODY_BYTES: usize = 64 * 1024 * 1024;

pub async fn start_server(ctx: Arc<AppContext>) -> Result<()> {
    let bind = format!("{}:{}", ctx.config.bind_address, ctx.config.port);
    let addr: SocketAddr = bind.parse()?;

    let router = build_router(ctx);

    info!("HTTP API listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received");
        })
        .await?;
    Ok(())
}

pub fn build_router(ctx: Arc<AppContext>) -> Router {
    Router::new()
        .route("/health", get(routes::health::health))
        .route(
            "/api/tasks",
            get(routes::tasks::list_tasks).post(routes::tasks::create_task),
        )
        .route("/api/tasks/active", get(routes::tasks::list_active))
        .route(
            "/api/tasks/completed-report",
            get(routes::tasks::completed_report),
        )
        .route("/api/tasks/stream", get(sse::tasks_stream))
        .route("/api/tasks/unpost", post(routes::tasks::bulk_unpost))
        .route("/api/tasks/{id}", get(routes::tasks::get_task))
        .route("/api/tasks/{id}/assign", post(routes::tasks::assign_task))
        .route("/api/tasks/{id}/approve", post(routes::tasks::approve_task))
        .route("/api/tasks/{id}/review", post(routes::tasks::review_task))
        .route("/api/tasks/{id}/hold", post(routes::tasks::hold_task))
        .route(
            "/api/tasks/{id}/developer",
            post(routes::tasks::update_developer),
        )
        .route("/api/attachments/{id}", get(routes::attachments::download))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(CorsLayer::permissive())
        .with_state(ctx)
}
