pub mod attachments;
pub mod auth;
pub mod config;
pub mod directory;
pub mod error;
pub mod rest;
pub mod storage;
pub mod tasks;
pub mod workflow;

use std::sync::Arc;

use config::Config;
use workflow::WorkflowService;

/// Shared application state passed to every route handler.
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<Config>,
    /// The orchestration layer every handler delegates to.
    pub workflow: WorkflowService,
    pub started_at: std::time::Instant,
}
