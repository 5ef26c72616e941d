//! Work-order data model: the task record, its status axes, and wire DTOs.

use serde::{Deserialize, Serialize};

/// Generate a new task ID (ULID — lexically sortable by creation time).
pub fn new_task_id() -> String {
    ulid::Ulid::new().to_string()
}

// ─── Status axes ──────────────────────────────────────────────────────────────

/// Primary routing axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskStatus {
    Pending,
    Assigned,
    Approved,
    Completed,
    OnHold,
    Unposted,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Assigned => "assigned",
            TaskStatus::Approved => "approved",
            TaskStatus::Completed => "completed",
            TaskStatus::OnHold => "on-hold",
            TaskStatus::Unposted => "unposted",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(TaskStatus::Pending),
            "assigned" => Some(TaskStatus::Assigned),
            "approved" => Some(TaskStatus::Approved),
            "completed" => Some(TaskStatus::Completed),
            "on-hold" => Some(TaskStatus::OnHold),
            "unposted" => Some(TaskStatus::Unposted),
            _ => None,
        }
    }
}

/// Developer execution axis — runs on its own clock, independent of
/// the primary axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeveloperStatus {
    Pending,
    Done,
    NotDone,
    OnHold,
}

impl DeveloperStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeveloperStatus::Pending => "pending",
            DeveloperStatus::Done => "done",
            DeveloperStatus::NotDone => "not-done",
            DeveloperStatus::OnHold => "on-hold",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(DeveloperStatus::Pending),
            "done" => Some(DeveloperStatus::Done),
            "not-done" => Some(DeveloperStatus::NotDone),
            "on-hold" => Some(DeveloperStatus::OnHold),
            _ => None,
        }
    }
}

/// Final disposition axis — derived at transition time, never set by clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FinalStatus {
    InProgress,
    Rejected,
    Done,
    Unposted,
}

impl FinalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FinalStatus::InProgress => "in-progress",
            FinalStatus::Rejected => "rejected",
            FinalStatus::Done => "done",
            FinalStatus::Unposted => "unposted",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "in-progress" => Some(FinalStatus::InProgress),
            "rejected" => Some(FinalStatus::Rejected),
            "done" => Some(FinalStatus::Done),
            "unposted" => Some(FinalStatus::Unposted),
            _ => None,
        }
    }
}

/// The rejection sub-axis carries exactly one marker value when set.
pub const REJECTION_FIXED: &str = "fixed";

// ─── Task record ──────────────────────────────────────────────────────────────

/// One field-service work order. Status columns hold the axis wire strings;
/// the three attachment-list columns hold JSON arrays of attachment IDs.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct TaskRecord {
    pub id: String,
    pub code: String,
    pub company_id: String,
    pub company_name: String,
    pub company_city: String,
    pub company_address: String,
    pub contact_name: String,
    pub contact_phone: String,
    pub working: String,
    pub date_time: String,
    pub created_by: String,
    pub created_at: String,

    pub status: String,

    pub assigned: bool,
    pub assigned_to: Option<String>,
    pub assigned_date: Option<String>,
    pub assignment_remarks: Option<String>,

    pub approved: bool,
    pub approved_at: Option<String>,
    pub completion_approved: bool,
    pub completion_approved_at: Option<String>,
    pub completion_remarks: Option<String>,

    pub developer_status: String,
    pub developer_remarks: Option<String>,
    pub developer_done_date: Option<String>,
    pub developer_attachments: String, // JSON array of attachment IDs

    pub developer_status_rejection: Option<String>,
    pub developer_rejection_remarks: Option<String>,
    pub rejection_solve_attachments: String, // JSON array of attachment IDs

    pub final_status: String,

    pub unposted: bool,
    pub unposted_at: Option<String>,
    pub unpost_status: Option<String>,

    pub task_attachments: String, // JSON array of attachment IDs
}

/// Decode a JSON-array attachment-list column. A malformed column reads as
/// empty rather than failing the whole row.
pub fn decode_ids(json: &str) -> Vec<String> {
    serde_json::from_str(json).unwrap_or_default()
}

/// Encode an attachment-ID list back into its JSON-array column form.
pub fn encode_ids(ids: &[String]) -> String {
    serde_json::to_string(ids).unwrap_or_else(|_| "[]".to_string())
}

/// Append `new_ids` to a JSON-array column value. Existing IDs are never
/// removed or reordered.
pub fn append_ids(json: &str, new_ids: &[String]) -> String {
    if new_ids.is_empty() {
        return json.to_string();
    }
    let mut ids = decode_ids(json);
    ids.extend(new_ids.iter().cloned());
    encode_ids(&ids)
}

// ─── Wire DTOs ────────────────────────────────────────────────────────────────

/// Company reference: ID plus the denormalized display fields captured at
/// creation time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompanyRef {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub address: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContactRef {
    pub name: String,
    #[serde(default)]
    pub phone: String,
}

/// Assembled by the create handler from multipart fields; the `company` and
/// `contact` sub-objects arrive JSON-encoded inside their fields.
#[derive(Debug, Clone)]
pub struct CreateTaskRequest {
    pub code: String,
    pub company: CompanyRef,
    pub contact: ContactRef,
    pub working: String,
    pub date_time: String,
    pub created_by: String,
}

/// Developer-axis update. `developer_status_rejection` carries the
/// `"fixed"` marker when the update also resolves a rejection.
#[derive(Debug, Clone, Default)]
pub struct DeveloperUpdateRequest {
    pub developer_status: String,
    pub developer_remarks: String,
    pub developer_status_rejection: Option<String>,
    pub developer_rejection_remarks: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UnpostRequest {
    pub ids: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssignRequest {
    pub assigned_to: String,
    #[serde(default)]
    pub assignment_remarks: Option<String>,
}

/// Completion review: approve closes the order out; reject opens the
/// rejection/fix cycle on the developer axis.
#[derive(Debug, Clone, Deserialize)]
pub struct ReviewRequest {
    pub approve: bool,
    #[serde(default)]
    pub completion_remarks: Option<String>,
    #[serde(default)]
    pub reject_remarks: Option<String>,
}

// ─── Read views ───────────────────────────────────────────────────────────────

/// Outbound task shape: record fields with the attachment lists decoded and,
/// on detail reads, the creator resolved to a display name.
#[derive(Debug, Clone, Serialize)]
pub struct TaskView {
    pub id: String,
    pub code: String,
    pub company: CompanyRef,
    pub contact: ContactRef,
    pub working: String,
    pub date_time: String,
    pub created_by: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_by_name: Option<String>,
    pub created_at: String,

    pub status: String,
    pub assigned: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignment_remarks: Option<String>,

    pub approved: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approved_at: Option<String>,
    pub completion_approved: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completion_approved_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completion_remarks: Option<String>,

    pub developer_status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub developer_remarks: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub developer_done_date: Option<String>,
    pub developer_attachments: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub developer_status_rejection: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub developer_rejection_remarks: Option<String>,
    pub rejection_solve_attachments: Vec<String>,

    pub final_status: String,

    pub unposted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unposted_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unpost_status: Option<String>,

    pub task_attachments: Vec<String>,
}

impl TaskView {
    pub fn from_record(rec: &TaskRecord) -> Self {
        Self {
            id: rec.id.clone(),
            code: rec.code.clone(),
            company: CompanyRef {
                id: rec.company_id.clone(),
                name: rec.company_name.clone(),
                city: rec.company_city.clone(),
                address: rec.company_address.clone(),
            },
            contact: ContactRef {
                name: rec.contact_name.clone(),
                phone: rec.contact_phone.clone(),
            },
            working: rec.working.clone(),
            date_time: rec.date_time.clone(),
            created_by: rec.created_by.clone(),
            created_by_name: None,
            created_at: rec.created_at.clone(),
            status: rec.status.clone(),
            assigned: rec.assigned,
            assigned_to: rec.assigned_to.clone(),
            assigned_date: rec.assigned_date.clone(),
            assignment_remarks: rec.assignment_remarks.clone(),
            approved: rec.approved,
            approved_at: rec.approved_at.clone(),
            completion_approved: rec.completion_approved,
            completion_approved_at: rec.completion_approved_at.clone(),
            completion_remarks: rec.completion_remarks.clone(),
            developer_status: rec.developer_status.clone(),
            developer_remarks: rec.developer_remarks.clone(),
            developer_done_date: rec.developer_done_date.clone(),
            developer_attachments: decode_ids(&rec.developer_attachments),
            developer_status_rejection: rec.developer_status_rejection.clone(),
            developer_rejection_remarks: rec.developer_rejection_remarks.clone(),
            rejection_solve_attachments: decode_ids(&rec.rejection_solve_attachments),
            final_status: rec.final_status.clone(),
            unposted: rec.unposted,
            unposted_at: rec.unposted_at.clone(),
            unpost_status: rec.unpost_status.clone(),
            task_attachments: decode_ids(&rec.task_attachments),
        }
    }

    pub fn with_creator_name(mut self, name: String) -> Self {
        self.created_by_name = Some(name);
        self
    }
}
