//! Pure transition logic for the work-order status axes.
//!
//! Every function here is deterministic and I/O-free: it takes the current
//! record (plus the request and a timestamp) and returns the new record or a
//! rejection. Persistence happens elsewhere. The one cross-axis coupling —
//! a rejection fix forcing `final_status` back to in-progress — lives in
//! [`apply_developer_update`] as an explicit guarded side effect.

use crate::error::WorkflowError;
use crate::tasks::model::{
    append_ids, AssignRequest, CreateTaskRequest, DeveloperStatus, DeveloperUpdateRequest,
    FinalStatus, ReviewRequest, TaskRecord, TaskStatus, REJECTION_FIXED,
};

/// Valid primary-axis transitions. `unposted` is terminal; `on-hold` is
/// reachable from every non-terminal state and resumes forward when the
/// target's sub-state guard passes (checked by the transition functions).
pub fn valid_primary_transition(from: TaskStatus, to: TaskStatus) -> bool {
    use TaskStatus::*;
    match (from, to) {
        (Unposted, _) => false,
        (_, Unposted) => true,
        (_, OnHold) => true,
        (Pending, Assigned) | (OnHold, Assigned) => true,
        (Assigned, Approved) | (OnHold, Approved) => true,
        (Approved, Completed) | (OnHold, Completed) => true,
        _ => false,
    }
}

fn current_status(task: &TaskRecord) -> Result<TaskStatus, WorkflowError> {
    TaskStatus::parse(&task.status).ok_or_else(|| {
        WorkflowError::Internal(anyhow::anyhow!(
            "task {} has unrecognized status '{}'",
            task.id,
            task.status
        ))
    })
}

fn reject_transition(to: TaskStatus, from: TaskStatus) -> WorkflowError {
    WorkflowError::Validation(format!(
        "invalid transition: {} from {}",
        to.as_str(),
        from.as_str()
    ))
}

// ─── Creation ─────────────────────────────────────────────────────────────────

/// Validate the creation payload: every required field present and non-empty.
pub fn validate_create(req: &CreateTaskRequest) -> Result<(), WorkflowError> {
    let missing = |field: &str| WorkflowError::Validation(format!("{field} is required"));
    if req.code.trim().is_empty() {
        return Err(missing("code"));
    }
    if req.company.id.trim().is_empty() || req.company.name.trim().is_empty() {
        return Err(missing("company (id and name)"));
    }
    if req.contact.name.trim().is_empty() {
        return Err(missing("contact (name)"));
    }
    if req.working.trim().is_empty() {
        return Err(missing("working"));
    }
    if req.date_time.trim().is_empty() {
        return Err(missing("date_time"));
    }
    if req.created_by.trim().is_empty() {
        return Err(missing("created_by"));
    }
    Ok(())
}

/// Build a fresh record with the initial axis values: primary `pending`,
/// developer `pending`, final `in-progress`, all flags unset.
pub fn new_record(
    req: &CreateTaskRequest,
    id: String,
    attachment_ids: Vec<String>,
    now: &str,
) -> TaskRecord {
    TaskRecord {
        id,
        code: req.code.clone(),
        company_id: req.company.id.clone(),
        company_name: req.company.name.clone(),
        company_city: req.company.city.clone(),
        company_address: req.company.address.clone(),
        contact_name: req.contact.name.clone(),
        contact_phone: req.contact.phone.clone(),
        working: req.working.clone(),
        date_time: req.date_time.clone(),
        created_by: req.created_by.clone(),
        created_at: now.to_string(),
        status: TaskStatus::Pending.as_str().to_string(),
        assigned: false,
        assigned_to: None,
        assigned_date: None,
        assignment_remarks: None,
        approved: false,
        approved_at: None,
        completion_approved: false,
        completion_approved_at: None,
        completion_remarks: None,
        developer_status: DeveloperStatus::Pending.as_str().to_string(),
        developer_remarks: None,
        developer_done_date: None,
        developer_attachments: "[]".to_string(),
        developer_status_rejection: None,
        developer_rejection_remarks: None,
        rejection_solve_attachments: "[]".to_string(),
        final_status: FinalStatus::InProgress.as_str().to_string(),
        unposted: false,
        unposted_at: None,
        unpost_status: None,
        task_attachments: crate::tasks::model::encode_ids(&attachment_ids),
    }
}

// ─── Primary-axis transitions ─────────────────────────────────────────────────

/// `pending | on-hold → assigned`. Requires a non-empty assignee.
pub fn assign(
    mut task: TaskRecord,
    req: &AssignRequest,
    now: &str,
) -> Result<TaskRecord, WorkflowError> {
    if req.assigned_to.trim().is_empty() {
        return Err(WorkflowError::Validation("assigned_to is required".into()));
    }
    let cur = current_status(&task)?;
    if !valid_primary_transition(cur, TaskStatus::Assigned) {
        return Err(reject_transition(TaskStatus::Assigned, cur));
    }
    task.status = TaskStatus::Assigned.as_str().to_string();
    task.assigned = true;
    task.assigned_to = Some(req.assigned_to.clone());
    task.assigned_date = Some(now.to_string());
    task.assignment_remarks = req.assignment_remarks.clone();
    Ok(task)
}

/// `assigned | on-hold → approved`. Resuming from hold requires the order to
/// have been assigned first.
pub fn approve(mut task: TaskRecord, now: &str) -> Result<TaskRecord, WorkflowError> {
    let cur = current_status(&task)?;
    if !valid_primary_transition(cur, TaskStatus::Approved) {
        return Err(reject_transition(TaskStatus::Approved, cur));
    }
    if cur == TaskStatus::OnHold && !task.assigned {
        return Err(WorkflowError::Validation(
            "cannot approve: task was never assigned".into(),
        ));
    }
    task.status = TaskStatus::Approved.as_str().to_string();
    task.approved = true;
    task.approved_at = Some(now.to_string());
    Ok(task)
}

/// Completion review.
///
/// Approve: `approved | on-hold → completed`, sets the completion flags and
/// derives `final_status = done`. Reject: records the rejection remarks and
/// derives `final_status = rejected`, leaving the primary axis where it is —
/// the fix cycle then runs on the developer axis.
pub fn review_completion(
    mut task: TaskRecord,
    req: &ReviewRequest,
    now: &str,
) -> Result<TaskRecord, WorkflowError> {
    let cur = current_status(&task)?;
    if cur != TaskStatus::Approved && cur != TaskStatus::OnHold {
        return Err(WorkflowError::Validation(format!(
            "completion review requires an approved task (status is {})",
            cur.as_str()
        )));
    }
    if req.approve {
        if cur == TaskStatus::OnHold && !task.approved {
            return Err(WorkflowError::Validation(
                "cannot complete: task was never approved".into(),
            ));
        }
        task.status = TaskStatus::Completed.as_str().to_string();
        task.completion_approved = true;
        task.completion_approved_at = Some(now.to_string());
        task.completion_remarks = req.completion_remarks.clone();
        task.final_status = FinalStatus::Done.as_str().to_string();
    } else {
        let remarks = req
            .reject_remarks
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| WorkflowError::Validation("reject_remarks is required".into()))?;
        task.final_status = FinalStatus::Rejected.as_str().to_string();
        task.developer_rejection_remarks = Some(remarks.to_string());
        // A fresh rejection is unfixed until the developer says otherwise.
        task.developer_status_rejection = None;
    }
    Ok(task)
}

/// Any non-terminal state → `on-hold`.
pub fn hold(mut task: TaskRecord) -> Result<TaskRecord, WorkflowError> {
    let cur = current_status(&task)?;
    if !valid_primary_transition(cur, TaskStatus::OnHold) {
        return Err(reject_transition(TaskStatus::OnHold, cur));
    }
    task.status = TaskStatus::OnHold.as_str().to_string();
    Ok(task)
}

// ─── Developer-axis update ────────────────────────────────────────────────────

/// Apply a developer-state update: set the developer axis, append the new
/// attachment IDs (never replacing), and — when the request carries the
/// `"fixed"` rejection marker on a rejected order — force `final_status`
/// back to `in-progress`. That forcing is the single cross-axis coupling.
pub fn apply_developer_update(
    mut task: TaskRecord,
    req: &DeveloperUpdateRequest,
    new_developer_ids: &[String],
    new_fix_ids: &[String],
    now: &str,
) -> Result<TaskRecord, WorkflowError> {
    let status = DeveloperStatus::parse(&req.developer_status).ok_or_else(|| {
        WorkflowError::Validation(
            "developer_status must be one of pending, done, not-done, on-hold".into(),
        )
    })?;
    if req.developer_remarks.trim().is_empty() {
        return Err(WorkflowError::Validation(
            "developer_remarks is required".into(),
        ));
    }

    match req.developer_status_rejection.as_deref() {
        None => {}
        Some(REJECTION_FIXED) => {
            if task.final_status != FinalStatus::Rejected.as_str() {
                return Err(WorkflowError::Validation(
                    "rejection fix requires a rejected task".into(),
                ));
            }
            task.developer_status_rejection = Some(REJECTION_FIXED.to_string());
            if let Some(remarks) = req
                .developer_rejection_remarks
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
            {
                task.developer_rejection_remarks = Some(remarks.to_string());
            }
            // The cross-axis coupling: a fixed rejection re-opens the order.
            task.final_status = FinalStatus::InProgress.as_str().to_string();
        }
        Some(other) => {
            return Err(WorkflowError::Validation(format!(
                "developer_status_rejection only accepts '{REJECTION_FIXED}' (got '{other}')"
            )));
        }
    }

    task.developer_status = status.as_str().to_string();
    task.developer_remarks = Some(req.developer_remarks.clone());
    task.developer_done_date = if status == DeveloperStatus::Done {
        Some(now.to_string())
    } else {
        None
    };
    task.developer_attachments = append_ids(&task.developer_attachments, new_developer_ids);
    task.rejection_solve_attachments = append_ids(&task.rejection_solve_attachments, new_fix_ids);
    Ok(task)
}

// ─── Retraction ───────────────────────────────────────────────────────────────

/// The canonical unpost mutation. Sets the retraction fields and forces the
/// primary and final axes to `unposted`, so a retracted record reads as
/// retracted on every axis. Returns `false` when the record was already
/// unposted — replays modify nothing.
pub fn apply_unpost(mut task: TaskRecord, now: &str) -> (TaskRecord, bool) {
    if task.unposted {
        return (task, false);
    }
    task.unposted = true;
    task.unposted_at = Some(now.to_string());
    task.unpost_status = Some(TaskStatus::Unposted.as_str().to_string());
    task.status = TaskStatus::Unposted.as_str().to_string();
    task.final_status = FinalStatus::Unposted.as_str().to_string();
    (task, true)
}
