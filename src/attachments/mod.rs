//! Attachment admission policy.
//!
//! A file is admitted when its declared content type OR its filename
//! extension appears on the allow-lists, and its size is within the cap
//! (inclusive). Zero-byte files are never errors: they are skipped so that a
//! stray empty form part cannot sink an otherwise valid batch.
//!
//! Batch semantics differ by caller and are planned here, executed by
//! [`storage::AttachmentStore`]: creation batches are all-or-nothing, while
//! developer-update batches store what they can.

pub mod storage;

pub use storage::{AttachmentMeta, AttachmentStore};

use crate::error::WorkflowError;

/// Declared content types accepted without looking at the extension.
const ALLOWED_CONTENT_TYPES: &[&str] = &[
    "application/pdf",
    "image/jpeg",
    "image/png",
    "image/gif",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "application/vnd.ms-excel",
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
    "text/plain",
    "text/csv",
    "application/json",
];

/// Extensions accepted regardless of the declared content type. Browsers and
/// mobile clients routinely send `application/octet-stream` for perfectly
/// ordinary files, so the extension gets an equal vote.
const ALLOWED_EXTENSIONS: &[&str] = &[
    "pdf", "jpg", "jpeg", "png", "gif", "doc", "docx", "xls", "xlsx", "txt", "csv", "json",
];

/// One uploaded file, as decoded from a multipart field.
#[derive(Debug, Clone)]
pub struct IncomingFile {
    pub name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// What to do with a single file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Store,
    /// Zero-byte upload: not stored, not an error.
    Skip,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchMode {
    /// Any inadmissible file fails the whole batch (task creation).
    AllOrNothing,
    /// Inadmissible files are dropped, the rest proceed (developer updates).
    BestEffort,
}

/// The outcome of planning a batch: which files to store, which zero-byte
/// names were skipped, and (best-effort only) which files were turned away.
#[derive(Debug, Default)]
pub struct BatchPlan<'a> {
    pub accepted: Vec<&'a IncomingFile>,
    pub skipped: Vec<String>,
    pub rejected: Vec<(String, WorkflowError)>,
}

fn normalize_content_type(raw: &str) -> String {
    // "text/plain; charset=utf-8" → "text/plain"
    raw.split(';').next().unwrap_or("").trim().to_ascii_lowercase()
}

fn extension_of(name: &str) -> Option<String> {
    let (_, ext) = name.rsplit_once('.')?;
    if ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

fn type_allowed(name: &str, content_type: &str) -> bool {
    let ct = normalize_content_type(content_type);
    if ALLOWED_CONTENT_TYPES.contains(&ct.as_str()) {
        return true;
    }
    match extension_of(name) {
        Some(ext) => ALLOWED_EXTENSIONS.contains(&ext.as_str()),
        None => false,
    }
}

/// Check a single file against the size cap and the type allow-lists.
pub fn admit(file: &IncomingFile, max_bytes: u64) -> Result<Admission, WorkflowError> {
    if file.bytes.is_empty() {
        return Ok(Admission::Skip);
    }
    let size = file.bytes.len() as u64;
    if size > max_bytes {
        return Err(WorkflowError::PayloadTooLarge {
            name: file.name.clone(),
            size,
            limit: max_bytes,
        });
    }
    if !type_allowed(&file.name, &file.content_type) {
        return Err(WorkflowError::UnsupportedMediaType {
            name: file.name.clone(),
            content_type: file.content_type.clone(),
            allowed: ALLOWED_EXTENSIONS.join(", "),
        });
    }
    Ok(Admission::Store)
}

/// Run admission over a batch. In [`BatchMode::AllOrNothing`] the first
/// inadmissible file aborts with its error; in [`BatchMode::BestEffort`] it
/// lands in `rejected` and planning continues.
pub fn plan_batch<'a>(
    files: &'a [IncomingFile],
    mode: BatchMode,
    max_bytes: u64,
) -> Result<BatchPlan<'a>, WorkflowError> {
    let mut plan = BatchPlan::default();
    for file in files {
        match admit(file, max_bytes) {
            Ok(Admission::Store) => plan.accepted.push(file),
            Ok(Admission::Skip) => plan.skipped.push(file.name.clone()),
            Err(err) => match mode {
                BatchMode::AllOrNothing => return Err(err),
                BatchMode::BestEffort => plan.rejected.push((file.name.clone(), err)),
            },
        }
    }
    Ok(plan)
}
