//! Work-order orchestration.
//!
//! Routes hand this service decoded requests and files; it runs admission,
//! the pure transition layer, and persistence in that order and returns
//! views. Creation batches are all-or-nothing; developer-update batches are
//! best-effort. Bulk unpost is the only operation behind the permission
//! gate.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{info, warn};

use crate::attachments::{plan_batch, AttachmentMeta, AttachmentStore, BatchMode, IncomingFile};
use crate::auth::{self, PERM_TASKS_UNPOST};
use crate::config::Config;
use crate::directory::{UserDirectory, UNKNOWN_DISPLAY_NAME};
use crate::error::WorkflowError;
use crate::storage::now_rfc3339;
use crate::tasks::machine;
use crate::tasks::model::{
    new_task_id, AssignRequest, CreateTaskRequest, DeveloperUpdateRequest, ReviewRequest,
    TaskRecord, TaskView, UnpostRequest,
};
use crate::tasks::TaskStorage;

#[derive(Clone)]
pub struct WorkflowService {
    config: Arc<Config>,
    tasks: TaskStorage,
    attachments: AttachmentStore,
    directory: UserDirectory,
}

impl WorkflowService {
    pub fn new(
        config: Arc<Config>,
        tasks: TaskStorage,
        attachments: AttachmentStore,
        directory: UserDirectory,
    ) -> Self {
        Self {
            config,
            tasks,
            attachments,
            directory,
        }
    }

    fn max_file_bytes(&self) -> u64 {
        self.config.attachments.max_file_bytes
    }

    async fn load(&self, id: &str) -> Result<TaskRecord, WorkflowError> {
        self.tasks
            .get_task(id)
            .await?
            .ok_or_else(|| WorkflowError::NotFound(format!("task {id}")))
    }

    async fn store_accepted(
        &self,
        files: &[&IncomingFile],
        task_id: &str,
        role: &str,
        uploaded_by: &str,
        now: &str,
    ) -> Result<Vec<String>, WorkflowError> {
        let mut ids = Vec::with_capacity(files.len());
        for file in files {
            let id = self
                .attachments
                .put(file, Some(task_id), role, uploaded_by, now)
                .await?;
            ids.push(id);
        }
        Ok(ids)
    }

    /// Decorate records into views, resolving creator names with one lookup
    /// per distinct user. Unknown creators get the sentinel, not an error.
    async fn decorate(&self, records: Vec<TaskRecord>) -> Result<Vec<TaskView>, WorkflowError> {
        let mut names: HashMap<String, String> = HashMap::new();
        let mut views = Vec::with_capacity(records.len());
        for record in &records {
            if !names.contains_key(&record.created_by) {
                let name = self
                    .directory
                    .display_name(&record.created_by)
                    .await?
                    .unwrap_or_else(|| UNKNOWN_DISPLAY_NAME.to_string());
                names.insert(record.created_by.clone(), name);
            }
            let name = names[&record.created_by].clone();
            views.push(TaskView::from_record(record).with_creator_name(name));
        }
        Ok(views)
    }

    async fn view_of(&self, record: &TaskRecord) -> Result<TaskView, WorkflowError> {
        let name = self
            .directory
            .display_name(&record.created_by)
            .await?
            .unwrap_or_else(|| UNKNOWN_DISPLAY_NAME.to_string());
        Ok(TaskView::from_record(record).with_creator_name(name))
    }

    // ─── Creation ─────────────────────────────────────────────────────────────

    /// Create a work order with its initial attachments. The whole request
    /// fails if any non-empty file is inadmissible; nothing is stored in that
    /// case.
    pub async fn create_task(
        &self,
        req: CreateTaskRequest,
        files: Vec<IncomingFile>,
    ) -> Result<TaskView, WorkflowError> {
        machine::validate_create(&req)?;
        let plan = plan_batch(&files, BatchMode::AllOrNothing, self.max_file_bytes())?;

        let id = new_task_id();
        let now = now_rfc3339();
        let attachment_ids = self
            .store_accepted(&plan.accepted, &id, "task", &req.created_by, &now)
            .await?;

        let record = machine::new_record(&req, id, attachment_ids, &now);
        self.tasks.insert_task(&record).await?;
        info!(
            task_id = %record.id,
            code = %record.code,
            files = plan.accepted.len(),
            skipped = plan.skipped.len(),
            "work order created"
        );
        self.view_of(&record).await
    }

    // ─── Primary-axis operations ──────────────────────────────────────────────

    pub async fn assign_task(
        &self,
        id: &str,
        req: AssignRequest,
    ) -> Result<TaskView, WorkflowError> {
        let task = self.load(id).await?;
        let task = machine::assign(task, &req, &now_rfc3339())?;
        self.tasks.update_task(&task).await?;
        info!(task_id = %id, assigned_to = %req.assigned_to, "work order assigned");
        self.view_of(&task).await
    }

    pub async fn approve_task(&self, id: &str) -> Result<TaskView, WorkflowError> {
        let task = self.load(id).await?;
        let task = machine::approve(task, &now_rfc3339())?;
        self.tasks.update_task(&task).await?;
        info!(task_id = %id, "work order approved");
        self.view_of(&task).await
    }

    pub async fn review_task(
        &self,
        id: &str,
        req: ReviewRequest,
    ) -> Result<TaskView, WorkflowError> {
        let task = self.load(id).await?;
        let task = machine::review_completion(task, &req, &now_rfc3339())?;
        self.tasks.update_task(&task).await?;
        info!(task_id = %id, approved = req.approve, "completion reviewed");
        self.view_of(&task).await
    }

    pub async fn hold_task(&self, id: &str) -> Result<TaskView, WorkflowError> {
        let task = self.load(id).await?;
        let task = machine::hold(task)?;
        self.tasks.update_task(&task).await?;
        info!(task_id = %id, "work order put on hold");
        self.view_of(&task).await
    }

    // ─── Developer axis ───────────────────────────────────────────────────────

    /// Apply a developer-state update with its two attachment batches. Both
    /// batches are best-effort: inadmissible files are logged and dropped,
    /// the update itself still goes through.
    pub async fn update_developer_state(
        &self,
        id: &str,
        req: DeveloperUpdateRequest,
        developer_files: Vec<IncomingFile>,
        fix_files: Vec<IncomingFile>,
    ) -> Result<TaskView, WorkflowError> {
        let task = self.load(id).await?;
        let now = now_rfc3339();

        // Validate the transition before writing any blobs, so a rejected
        // update cannot leave orphaned attachments behind.
        machine::apply_developer_update(task.clone(), &req, &[], &[], &now)?;

        let max = self.max_file_bytes();
        let dev_plan = plan_batch(&developer_files, BatchMode::BestEffort, max)?;
        let fix_plan = plan_batch(&fix_files, BatchMode::BestEffort, max)?;
        for (name, err) in dev_plan.rejected.iter().chain(fix_plan.rejected.iter()) {
            warn!(task_id = %id, file = %name, err = %err, "attachment dropped");
        }

        let uploader = task
            .assigned_to
            .clone()
            .unwrap_or_else(|| task.created_by.clone());
        let dev_ids = self
            .store_accepted(&dev_plan.accepted, id, "developer", &uploader, &now)
            .await?;
        let fix_ids = self
            .store_accepted(&fix_plan.accepted, id, "rejection", &uploader, &now)
            .await?;

        let task = machine::apply_developer_update(task, &req, &dev_ids, &fix_ids, &now)?;
        self.tasks.update_task(&task).await?;
        info!(
            task_id = %id,
            developer_status = %task.developer_status,
            stored = dev_ids.len() + fix_ids.len(),
            dropped = dev_plan.rejected.len() + fix_plan.rejected.len(),
            "developer state updated"
        );
        self.view_of(&task).await
    }

    // ─── Retraction ───────────────────────────────────────────────────────────

    /// Bulk-unpost tasks. Requires a bearer token whose role carries
    /// `tasks.unpost`. Returns how many tasks actually changed; unknown and
    /// already-unposted IDs are skipped, so a replay returns 0.
    pub async fn bulk_unpost(
        &self,
        auth_header: Option<&str>,
        req: UnpostRequest,
    ) -> Result<u64, WorkflowError> {
        let claims = auth::authorize(
            auth_header,
            self.config.auth.secret.as_deref(),
            PERM_TASKS_UNPOST,
        )?;
        if req.ids.is_empty() {
            return Err(WorkflowError::Validation("ids must not be empty".into()));
        }
        let count = self.tasks.bulk_unpost(&req.ids, &now_rfc3339()).await?;
        info!(
            requested = req.ids.len(),
            unposted = count,
            sub = %claims.sub,
            "bulk unpost"
        );
        Ok(count)
    }

    // ─── Reads ────────────────────────────────────────────────────────────────

    pub async fn get_task_view(&self, id: &str) -> Result<TaskView, WorkflowError> {
        let task = self.load(id).await?;
        self.view_of(&task).await
    }

    pub async fn list_all_views(&self) -> Result<Vec<TaskView>, WorkflowError> {
        let records = self.tasks.list_all().await?;
        self.decorate(records).await
    }

    pub async fn list_active_views(&self) -> Result<Vec<TaskView>, WorkflowError> {
        let records = self.tasks.list_active().await?;
        self.decorate(records).await
    }

    /// Completed work fit for reporting: completion approved, final status
    /// done, not retracted.
    pub async fn completed_report_views(&self) -> Result<Vec<TaskView>, WorkflowError> {
        let records = self.tasks.list_completed_report().await?;
        self.decorate(records).await
    }

    pub async fn get_attachment(
        &self,
        id: &str,
    ) -> Result<(AttachmentMeta, Vec<u8>), WorkflowError> {
        self.attachments
            .get(id)
            .await?
            .ok_or_else(|| WorkflowError::NotFound(format!("attachment {id}")))
    }

    pub async fn count_tasks(&self) -> Result<i64, WorkflowError> {
        Ok(self.tasks.count_tasks().await?)
    }
}
