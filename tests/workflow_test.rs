//! Work-order workflow integration tests.
//!
//! These exercise the full service pipeline against a real SQLite database:
//!   admission → transition layer → persistence → views
//!
//! All tests use tempfile directories — no server process required.

use jsonwebtoken::{encode, EncodingKey, Header};
use std::sync::Arc;
use tempfile::TempDir;
use workorderd::{
    attachments::{AttachmentStore, IncomingFile},
    auth::{Claims, Role, PERM_TASKS_UNPOST},
    config::Config,
    directory::UserDirectory,
    error::WorkflowError,
    storage::Storage,
    tasks::model::{
        AssignRequest, CompanyRef, ContactRef, CreateTaskRequest, DeveloperUpdateRequest,
        ReviewRequest, UnpostRequest,
    },
    tasks::TaskStorage,
    workflow::WorkflowService,
};

const SECRET: &str = "integration-test-secret";

// ─── Helpers ─────────────────────────────────────────────────────────────────

async fn make_service(dir: &TempDir) -> WorkflowService {
    make_service_with_cap(dir, 10 * 1024 * 1024).await
}

async fn make_service_with_cap(dir: &TempDir, max_file_bytes: u64) -> WorkflowService {
    let mut config = Config::new(
        None,
        Some(dir.path().to_path_buf()),
        None,
        None,
        Some(SECRET.to_string()),
    );
    config.attachments.max_file_bytes = max_file_bytes;
    let config = Arc::new(config);

    let storage = Storage::new(dir.path()).await.unwrap();
    WorkflowService::new(
        config,
        TaskStorage::new(storage.pool()),
        AttachmentStore::new(storage.pool()),
        UserDirectory::new(storage.pool()),
    )
}

fn make_request(code: &str) -> CreateTaskRequest {
    CreateTaskRequest {
        code: code.to_string(),
        company: CompanyRef {
            id: "c-acme".to_string(),
            name: "Acme Field Services".to_string(),
            city: "Springfield".to_string(),
            address: "1 Main St".to_string(),
        },
        contact: ContactRef {
            name: "Dana Ops".to_string(),
            phone: "555-0100".to_string(),
        },
        working: "replace breaker panel".to_string(),
        date_time: "2024-05-02T08:00:00+00:00".to_string(),
        created_by: "u-1".to_string(),
    }
}

fn file(name: &str, content_type: &str, bytes: &[u8]) -> IncomingFile {
    IncomingFile {
        name: name.to_string(),
        content_type: content_type.to_string(),
        bytes: bytes.to_vec(),
    }
}

fn dev_update(status: &str, remarks: &str) -> DeveloperUpdateRequest {
    DeveloperUpdateRequest {
        developer_status: status.to_string(),
        developer_remarks: remarks.to_string(),
        developer_status_rejection: None,
        developer_rejection_remarks: None,
    }
}

fn mint_token(permissions: &[&str]) -> String {
    let claims = Claims {
        sub: "u-manager".to_string(),
        exp: (chrono::Utc::now().timestamp() + 3600) as usize,
        role: Role {
            name: "manager".to_string(),
            permissions: permissions.iter().map(|p| p.to_string()).collect(),
        },
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .unwrap()
}

fn bearer(permissions: &[&str]) -> String {
    format!("Bearer {}", mint_token(permissions))
}

// ─── Creation and reads ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_create_and_fetch() {
    let dir = TempDir::new().unwrap();
    let service = make_service(&dir).await;

    let created = service
        .create_task(
            make_request("T-100"),
            vec![
                file("scope.pdf", "application/pdf", b"pdf bytes"),
                file("site.jpg", "image/jpeg", b"jpeg bytes"),
            ],
        )
        .await
        .unwrap();

    assert_eq!(created.code, "T-100");
    assert_eq!(created.status, "pending");
    assert_eq!(created.developer_status, "pending");
    assert_eq!(created.final_status, "in-progress");
    assert_eq!(created.task_attachments.len(), 2);
    assert!(created.developer_attachments.is_empty());

    let fetched = service.get_task_view(&created.id).await.unwrap();
    assert_eq!(fetched.task_attachments, created.task_attachments);
    assert_eq!(fetched.company.name, "Acme Field Services");
}

#[tokio::test]
async fn test_creator_name_decoration() {
    let dir = TempDir::new().unwrap();
    let storage = Storage::new(dir.path()).await.unwrap();
    let directory = UserDirectory::new(storage.pool());
    directory
        .upsert_user("u-1", "Priya Manager", "2024-05-01T00:00:00+00:00")
        .await
        .unwrap();

    let mut config = Config::new(
        None,
        Some(dir.path().to_path_buf()),
        None,
        None,
        Some(SECRET.to_string()),
    );
    config.attachments.max_file_bytes = 10 * 1024 * 1024;
    let service = WorkflowService::new(
        Arc::new(config),
        TaskStorage::new(storage.pool()),
        AttachmentStore::new(storage.pool()),
        directory,
    );

    let view = service
        .create_task(make_request("T-200"), vec![])
        .await
        .unwrap();
    assert_eq!(view.created_by_name.as_deref(), Some("Priya Manager"));

    // unknown creators resolve to the sentinel, not an error
    let mut req = make_request("T-201");
    req.created_by = "u-ghost".to_string();
    let view = service.create_task(req, vec![]).await.unwrap();
    assert_eq!(view.created_by_name.as_deref(), Some("Unknown"));
}

#[tokio::test]
async fn test_get_missing_task_is_not_found() {
    let dir = TempDir::new().unwrap();
    let service = make_service(&dir).await;
    let err = service.get_task_view("no-such-id").await.unwrap_err();
    assert!(matches!(err, WorkflowError::NotFound(_)));
}

#[tokio::test]
async fn test_validation_missing_working() {
    let dir = TempDir::new().unwrap();
    let service = make_service(&dir).await;
    let mut req = make_request("T-300");
    req.working = String::new();
    let err = service.create_task(req, vec![]).await.unwrap_err();
    assert!(matches!(err, WorkflowError::Validation(_)));
}

// ─── Attachment batch semantics ───────────────────────────────────────────────

#[tokio::test]
async fn test_create_batch_is_all_or_nothing() {
    let dir = TempDir::new().unwrap();
    let service = make_service(&dir).await;

    let err = service
        .create_task(
            make_request("T-400"),
            vec![
                file("ok.pdf", "application/pdf", b"fine"),
                file("virus.exe", "application/x-msdownload", b"nope"),
            ],
        )
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::UnsupportedMediaType { .. }));

    // nothing was created
    assert!(service.list_all_views().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_developer_batch_is_best_effort() {
    let dir = TempDir::new().unwrap();
    let service = make_service(&dir).await;
    let task = service
        .create_task(make_request("T-401"), vec![])
        .await
        .unwrap();

    let view = service
        .update_developer_state(
            &task.id,
            dev_update("done", "wired and tested"),
            vec![
                file("photo.jpg", "image/jpeg", b"jpeg"),
                file("tool.exe", "application/x-msdownload", b"nope"),
                file("empty.png", "image/png", b""),
            ],
            vec![],
        )
        .await
        .unwrap();

    // only the admissible, non-empty file was stored
    assert_eq!(view.developer_attachments.len(), 1);
    assert_eq!(view.developer_status, "done");
}

#[tokio::test]
async fn test_zero_byte_files_are_skipped_on_create() {
    let dir = TempDir::new().unwrap();
    let service = make_service(&dir).await;

    let view = service
        .create_task(
            make_request("T-402"),
            vec![
                file("empty.pdf", "application/pdf", b""),
                file("real.pdf", "application/pdf", b"content"),
            ],
        )
        .await
        .unwrap();
    assert_eq!(view.task_attachments.len(), 1);
}

#[tokio::test]
async fn test_oversize_file_fails_creation() {
    let dir = TempDir::new().unwrap();
    // tiny cap so the test does not allocate 10 MiB
    let service = make_service_with_cap(&dir, 64).await;

    let err = service
        .create_task(
            make_request("T-403"),
            vec![file("big.pdf", "application/pdf", &[0u8; 65])],
        )
        .await
        .unwrap_err();
    match err {
        WorkflowError::PayloadTooLarge { size, limit, .. } => {
            assert_eq!(size, 65);
            assert_eq!(limit, 64);
        }
        other => panic!("expected PayloadTooLarge, got {other:?}"),
    }

    // at the cap is still fine
    let view = service
        .create_task(
            make_request("T-404"),
            vec![file("fits.pdf", "application/pdf", &[0u8; 64])],
        )
        .await
        .unwrap();
    assert_eq!(view.task_attachments.len(), 1);
}

#[tokio::test]
async fn test_generic_content_type_with_listed_extension() {
    let dir = TempDir::new().unwrap();
    let service = make_service(&dir).await;

    let view = service
        .create_task(
            make_request("T-405"),
            vec![file("report.xlsx", "application/octet-stream", b"sheet")],
        )
        .await
        .unwrap();
    assert_eq!(view.task_attachments.len(), 1);
}

#[tokio::test]
async fn test_attachment_accumulation_across_updates() {
    let dir = TempDir::new().unwrap();
    let service = make_service(&dir).await;
    let task = service
        .create_task(make_request("T-406"), vec![])
        .await
        .unwrap();

    let first = service
        .update_developer_state(
            &task.id,
            dev_update("not-done", "half way"),
            vec![file("day1.jpg", "image/jpeg", b"one")],
            vec![],
        )
        .await
        .unwrap();
    assert_eq!(first.developer_attachments.len(), 1);

    let second = service
        .update_developer_state(
            &task.id,
            dev_update("done", "finished"),
            vec![file("day2.jpg", "image/jpeg", b"two")],
            vec![],
        )
        .await
        .unwrap();
    // earlier IDs survive, new ones append in order
    assert_eq!(second.developer_attachments.len(), 2);
    assert_eq!(second.developer_attachments[0], first.developer_attachments[0]);
}

#[tokio::test]
async fn test_attachment_download_roundtrip() {
    let dir = TempDir::new().unwrap();
    let service = make_service(&dir).await;

    let view = service
        .create_task(
            make_request("T-407"),
            vec![file("scope.pdf", "application/pdf", b"the scope document")],
        )
        .await
        .unwrap();

    let id = &view.task_attachments[0];
    let (meta, payload) = service.get_attachment(id).await.unwrap();
    assert_eq!(meta.file_name, "scope.pdf");
    assert_eq!(meta.content_type, "application/pdf");
    assert_eq!(meta.size_bytes, "the scope document".len() as i64);
    assert_eq!(payload, b"the scope document");

    let err = service.get_attachment("missing").await.unwrap_err();
    assert!(matches!(err, WorkflowError::NotFound(_)));
}

// ─── Axis independence ────────────────────────────────────────────────────────

#[tokio::test]
async fn test_developer_update_leaves_primary_axis_alone() {
    let dir = TempDir::new().unwrap();
    let service = make_service(&dir).await;
    let task = service
        .create_task(make_request("T-500"), vec![])
        .await
        .unwrap();

    let view = service
        .update_developer_state(&task.id, dev_update("done", "all wired"), vec![], vec![])
        .await
        .unwrap();
    assert_eq!(view.status, "pending");
    assert_eq!(view.developer_status, "done");
    assert!(view.developer_done_date.is_some());
    assert_eq!(view.final_status, "in-progress");
}

#[tokio::test]
async fn test_assignment_leaves_developer_axis_alone() {
    let dir = TempDir::new().unwrap();
    let service = make_service(&dir).await;
    let task = service
        .create_task(make_request("T-501"), vec![])
        .await
        .unwrap();
    service
        .update_developer_state(&task.id, dev_update("done", "early finish"), vec![], vec![])
        .await
        .unwrap();

    let view = service
        .assign_task(
            &task.id,
            AssignRequest {
                assigned_to: "dev-7".to_string(),
                assignment_remarks: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(view.status, "assigned");
    assert_eq!(view.developer_status, "done");
}

// ─── Bulk unpost and the gate ─────────────────────────────────────────────────

#[tokio::test]
async fn test_unpost_requires_token() {
    let dir = TempDir::new().unwrap();
    let service = make_service(&dir).await;
    let task = service
        .create_task(make_request("T-600"), vec![])
        .await
        .unwrap();

    let err = service
        .bulk_unpost(
            None,
            UnpostRequest {
                ids: vec![task.id.clone()],
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::Unauthenticated(_)));

    let err = service
        .bulk_unpost(
            Some(&bearer(&["tasks.read"])),
            UnpostRequest {
                ids: vec![task.id.clone()],
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::Forbidden(_)));

    // the task is untouched after both failures
    let view = service.get_task_view(&task.id).await.unwrap();
    assert!(!view.unposted);
}

#[tokio::test]
async fn test_unpost_idempotence_counts() {
    let dir = TempDir::new().unwrap();
    let service = make_service(&dir).await;
    let a = service
        .create_task(make_request("T-601"), vec![])
        .await
        .unwrap();
    let b = service
        .create_task(make_request("T-602"), vec![])
        .await
        .unwrap();

    let header = bearer(&[PERM_TASKS_UNPOST]);
    let ids = vec![a.id.clone(), b.id.clone(), "no-such-task".to_string()];

    let count = service
        .bulk_unpost(Some(&header), UnpostRequest { ids: ids.clone() })
        .await
        .unwrap();
    assert_eq!(count, 2); // unknown IDs are skipped silently

    let count = service
        .bulk_unpost(Some(&header), UnpostRequest { ids })
        .await
        .unwrap();
    assert_eq!(count, 0); // replay changes nothing

    let view = service.get_task_view(&a.id).await.unwrap();
    assert!(view.unposted);
    assert_eq!(view.status, "unposted");
    assert_eq!(view.final_status, "unposted");
    assert_eq!(view.unpost_status.as_deref(), Some("unposted"));
}

#[tokio::test]
async fn test_unpost_empty_ids_is_validation_error() {
    let dir = TempDir::new().unwrap();
    let service = make_service(&dir).await;
    let err = service
        .bulk_unpost(
            Some(&bearer(&[PERM_TASKS_UNPOST])),
            UnpostRequest { ids: vec![] },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::Validation(_)));
}

#[tokio::test]
async fn test_only_unpost_is_gated() {
    let dir = TempDir::new().unwrap();
    let service = make_service(&dir).await;

    // creation, listing, updates all work with no token at all
    let task = service
        .create_task(make_request("T-603"), vec![])
        .await
        .unwrap();
    service
        .assign_task(
            &task.id,
            AssignRequest {
                assigned_to: "dev-1".to_string(),
                assignment_remarks: None,
            },
        )
        .await
        .unwrap();
    service
        .update_developer_state(&task.id, dev_update("done", "done"), vec![], vec![])
        .await
        .unwrap();
    assert_eq!(service.list_active_views().await.unwrap().len(), 1);
}

// ─── Full lifecycle ───────────────────────────────────────────────────────────

/// The canonical end-to-end path: create with attachment → assign → approve →
/// developer done → completion rejected → rejection fixed → completion
/// approved → on the completed report → bulk unposted → off the report.
#[tokio::test]
async fn test_full_lifecycle_with_rejection_cycle() {
    let dir = TempDir::new().unwrap();
    let service = make_service(&dir).await;

    let task = service
        .create_task(
            make_request("T-1"),
            vec![file("scope.pdf", "application/pdf", b"scope")],
        )
        .await
        .unwrap();

    service
        .assign_task(
            &task.id,
            AssignRequest {
                assigned_to: "dev-7".to_string(),
                assignment_remarks: Some("priority customer".to_string()),
            },
        )
        .await
        .unwrap();
    service.approve_task(&task.id).await.unwrap();

    // developer reports done with a work photo
    let view = service
        .update_developer_state(
            &task.id,
            dev_update("done", "panel replaced"),
            vec![file("panel.jpg", "image/jpeg", b"photo")],
            vec![],
        )
        .await
        .unwrap();
    assert_eq!(view.status, "approved");
    assert_eq!(view.developer_status, "done");

    // reviewer rejects the completion
    let view = service
        .review_task(
            &task.id,
            ReviewRequest {
                approve: false,
                completion_remarks: None,
                reject_remarks: Some("breaker labels missing".to_string()),
            },
        )
        .await
        .unwrap();
    assert_eq!(view.final_status, "rejected");
    assert!(service.completed_report_views().await.unwrap().is_empty());

    // developer fixes it with evidence — the fix re-opens the order
    let mut fix = dev_update("done", "labels added");
    fix.developer_status_rejection = Some("fixed".to_string());
    let view = service
        .update_developer_state(
            &task.id,
            fix,
            vec![],
            vec![file("labels.jpg", "image/jpeg", b"labels")],
        )
        .await
        .unwrap();
    assert_eq!(view.developer_status_rejection.as_deref(), Some("fixed"));
    assert_eq!(view.final_status, "in-progress");
    assert_eq!(view.rejection_solve_attachments.len(), 1);

    // reviewer approves this time
    let view = service
        .review_task(
            &task.id,
            ReviewRequest {
                approve: true,
                completion_remarks: Some("verified on site".to_string()),
                reject_remarks: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(view.status, "completed");
    assert!(view.completion_approved);
    assert_eq!(view.final_status, "done");

    // reportable: completion approved + done + not unposted
    let report = service.completed_report_views().await.unwrap();
    assert_eq!(report.len(), 1);
    assert_eq!(report[0].id, task.id);

    // retraction pulls it off the report and the active list
    let count = service
        .bulk_unpost(
            Some(&bearer(&[PERM_TASKS_UNPOST])),
            UnpostRequest {
                ids: vec![task.id.clone()],
            },
        )
        .await
        .unwrap();
    assert_eq!(count, 1);
    assert!(service.completed_report_views().await.unwrap().is_empty());
    assert!(service.list_active_views().await.unwrap().is_empty());
    // still visible in the unfiltered list
    assert_eq!(service.list_all_views().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_hold_blocks_nothing_on_developer_axis() {
    let dir = TempDir::new().unwrap();
    let service = make_service(&dir).await;
    let task = service
        .create_task(make_request("T-700"), vec![])
        .await
        .unwrap();

    service.hold_task(&task.id).await.unwrap();
    let view = service
        .update_developer_state(&task.id, dev_update("not-done", "waiting on parts"), vec![], vec![])
        .await
        .unwrap();
    assert_eq!(view.status, "on-hold");
    assert_eq!(view.developer_status, "not-done");
}

// ─── Shutdown checkpoint ──────────────────────────────────────────────────────

#[tokio::test]
async fn test_wal_checkpoint_truncates_log_after_writes() {
    let dir = TempDir::new().unwrap();
    let config = Arc::new(Config::new(
        None,
        Some(dir.path().to_path_buf()),
        None,
        None,
        Some(SECRET.to_string()),
    ));
    let storage = Storage::new(dir.path()).await.unwrap();
    let service = WorkflowService::new(
        config,
        TaskStorage::new(storage.pool()),
        AttachmentStore::new(storage.pool()),
        UserDirectory::new(storage.pool()),
    );

    service.create_task(make_request("T-800"), vec![]).await.unwrap();
    service.create_task(make_request("T-801"), vec![]).await.unwrap();

    // the handle kept by the server for shutdown still checkpoints cleanly
    storage.checkpoint_wal().await.unwrap();

    let wal_len = std::fs::metadata(dir.path().join("workorderd.db-wal"))
        .map(|m| m.len())
        .unwrap_or(0);
    assert_eq!(wal_len, 0, "WAL still holds {wal_len} bytes after checkpoint");
    // data survives the checkpoint
    assert_eq!(service.list_all_views().await.unwrap().len(), 2);
}
