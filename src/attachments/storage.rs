//! Blob persistence for admitted attachments.
//!
//! Payloads live in the database next to their metadata. Every stored file
//! gets a v4 UUID and a SHA-256 checksum computed at write time; the checksum
//! is metadata for audits, not an access key.

use anyhow::Result;
use serde::Serialize;
use sha2::{Digest, Sha256};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::attachments::IncomingFile;

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct AttachmentMeta {
    pub id: String,
    pub file_name: String,
    pub content_type: String,
    pub size_bytes: i64,
    pub checksum_sha256: String,
    pub task_id: Option<String>,
    /// Which list this file belongs to: "task", "developer" or "rejection".
    pub role: String,
    pub uploaded_by: String,
    pub uploaded_at: String,
}

#[derive(Clone)]
pub struct AttachmentStore {
    pool: SqlitePool,
}

impl AttachmentStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Store one admitted file and return its new ID. The caller is expected
    /// to have run admission already; this function does no policy checks.
    pub async fn put(
        &self,
        file: &IncomingFile,
        task_id: Option<&str>,
        role: &str,
        uploaded_by: &str,
        now: &str,
    ) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        let checksum = hex::encode(Sha256::digest(&file.bytes));
        sqlx::query(
            "INSERT INTO attachments
             (id, file_name, content_type, size_bytes, checksum_sha256,
              task_id, role, uploaded_by, uploaded_at, payload)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(&file.name)
        .bind(&file.content_type)
        .bind(file.bytes.len() as i64)
        .bind(&checksum)
        .bind(task_id)
        .bind(role)
        .bind(uploaded_by)
        .bind(now)
        .bind(&file.bytes)
        .execute(&self.pool)
        .await?;
        Ok(id)
    }

    pub async fn get(&self, id: &str) -> Result<Option<(AttachmentMeta, Vec<u8>)>> {
        let meta: Option<AttachmentMeta> = sqlx::query_as(
            "SELECT id, file_name, content_type, size_bytes, checksum_sha256,
                    task_id, role, uploaded_by, uploaded_at
             FROM attachments WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        let Some(meta) = meta else {
            return Ok(None);
        };
        let (payload,): (Vec<u8>,) = sqlx::query_as("SELECT payload FROM attachments WHERE id = ?")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        Ok(Some((meta, payload)))
    }

    pub async fn get_meta(&self, id: &str) -> Result<Option<AttachmentMeta>> {
        Ok(sqlx::query_as(
            "SELECT id, file_name, content_type, size_bytes, checksum_sha256,
                    task_id, role, uploaded_by, uploaded_at
             FROM attachments WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?)
    }
}
