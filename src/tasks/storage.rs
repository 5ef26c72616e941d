//! SQLite persistence for work orders.
//!
//! All status columns are stored as their wire strings and the attachment
//! lists as JSON arrays in TEXT columns, so rows deserialize straight into
//! [`TaskRecord`]. Mutations happen through full-row updates computed by the
//! transition layer; the one exception is bulk unpost, which is a single
//! guarded UPDATE so replays count zero rows.

use anyhow::{anyhow, Result};
use sqlx::SqlitePool;

use crate::storage::with_timeout;
use crate::tasks::model::TaskRecord;

#[derive(Clone)]
pub struct TaskStorage {
    pool: SqlitePool,
}

impl TaskStorage {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    // ─── Writes ───────────────────────────────────────────────────────────────

    pub async fn insert_task(&self, task: &TaskRecord) -> Result<()> {
        sqlx::query(
            "INSERT INTO tasks
             (id, code, company_id, company_name, company_city, company_address,
              contact_name, contact_phone, working, date_time, created_by, created_at,
              status, assigned, assigned_to, assigned_date, assignment_remarks,
              approved, approved_at,
              completion_approved, completion_approved_at, completion_remarks,
              developer_status, developer_remarks, developer_done_date, developer_attachments,
              developer_status_rejection, developer_rejection_remarks, rejection_solve_attachments,
              final_status, unposted, unposted_at, unpost_status, task_attachments)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&task.id)
        .bind(&task.code)
        .bind(&task.company_id)
        .bind(&task.company_name)
        .bind(&task.company_city)
        .bind(&task.company_address)
        .bind(&task.contact_name)
        .bind(&task.contact_phone)
        .bind(&task.working)
        .bind(&task.date_time)
        .bind(&task.created_by)
        .bind(&task.created_at)
        .bind(&task.status)
        .bind(task.assigned)
        .bind(&task.assigned_to)
        .bind(&task.assigned_date)
        .bind(&task.assignment_remarks)
        .bind(task.approved)
        .bind(&task.approved_at)
        .bind(task.completion_approved)
        .bind(&task.completion_approved_at)
        .bind(&task.completion_remarks)
        .bind(&task.developer_status)
        .bind(&task.developer_remarks)
        .bind(&task.developer_done_date)
        .bind(&task.developer_attachments)
        .bind(&task.developer_status_rejection)
        .bind(&task.developer_rejection_remarks)
        .bind(&task.rejection_solve_attachments)
        .bind(&task.final_status)
        .bind(task.unposted)
        .bind(&task.unposted_at)
        .bind(&task.unpost_status)
        .bind(&task.task_attachments)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Persist a record mutated by the transition layer. Immutable creation
    /// fields (code, company, contact, schedule) are deliberately not in the
    /// SET list.
    pub async fn update_task(&self, task: &TaskRecord) -> Result<()> {
        let rows = sqlx::query(
            "UPDATE tasks SET
                status = ?, assigned = ?, assigned_to = ?, assigned_date = ?, assignment_remarks = ?,
                approved = ?, approved_at = ?,
                completion_approved = ?, completion_approved_at = ?, completion_remarks = ?,
                developer_status = ?, developer_remarks = ?, developer_done_date = ?, developer_attachments = ?,
                developer_status_rejection = ?, developer_rejection_remarks = ?, rejection_solve_attachments = ?,
                final_status = ?, unposted = ?, unposted_at = ?, unpost_status = ?
             WHERE id = ?",
        )
        .bind(&task.status)
        .bind(task.assigned)
        .bind(&task.assigned_to)
        .bind(&task.assigned_date)
        .bind(&task.assignment_remarks)
        .bind(task.approved)
        .bind(&task.approved_at)
        .bind(task.completion_approved)
        .bind(&task.completion_approved_at)
        .bind(&task.completion_remarks)
        .bind(&task.developer_status)
        .bind(&task.developer_remarks)
        .bind(&task.developer_done_date)
        .bind(&task.developer_attachments)
        .bind(&task.developer_status_rejection)
        .bind(&task.developer_rejection_remarks)
        .bind(&task.rejection_solve_attachments)
        .bind(&task.final_status)
        .bind(task.unposted)
        .bind(&task.unposted_at)
        .bind(&task.unpost_status)
        .bind(&task.id)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if rows == 0 {
            return Err(anyhow!("task {} vanished during update", task.id));
        }
        Ok(())
    }

    /// Retract every not-yet-unposted task in `ids` with one guarded UPDATE.
    /// Returns how many rows actually changed; already-unposted and unknown
    /// IDs are simply not matched, so a replay returns 0.
    pub async fn bulk_unpost(&self, ids: &[String], now: &str) -> Result<u64> {
        if ids.is_empty() {
            return Ok(0);
        }
        let placeholders = vec!["?"; ids.len()].join(", ");
        let sql = format!(
            "UPDATE tasks SET
                unposted = 1, unposted_at = ?, unpost_status = 'unposted',
                status = 'unposted', final_status = 'unposted'
             WHERE id IN ({placeholders}) AND unposted = 0",
        );
        let mut query = sqlx::query(&sql).bind(now);
        for id in ids {
            query = query.bind(id);
        }
        Ok(query.execute(&self.pool).await?.rows_affected())
    }

    // ─── Reads ────────────────────────────────────────────────────────────────

    pub async fn get_task(&self, id: &str) -> Result<Option<TaskRecord>> {
        Ok(sqlx::query_as("SELECT * FROM tasks WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    pub async fn list_all(&self) -> Result<Vec<TaskRecord>> {
        let pool = self.pool.clone();
        with_timeout(async {
            Ok(
                sqlx::query_as("SELECT * FROM tasks ORDER BY created_at DESC")
                    .fetch_all(&pool)
                    .await?,
            )
        })
        .await
    }

    /// Everything still live, i.e. not retracted.
    pub async fn list_active(&self) -> Result<Vec<TaskRecord>> {
        let pool = self.pool.clone();
        with_timeout(async {
            Ok(sqlx::query_as(
                "SELECT * FROM tasks WHERE unposted = 0 ORDER BY created_at DESC",
            )
            .fetch_all(&pool)
            .await?)
        })
        .await
    }

    /// Reportable completed work: completion approved, derived final status
    /// done, and not retracted. All three conditions, always.
    pub async fn list_completed_report(&self) -> Result<Vec<TaskRecord>> {
        let pool = self.pool.clone();
        with_timeout(async {
            Ok(sqlx::query_as(
                "SELECT * FROM tasks
                 WHERE completion_approved = 1 AND final_status = 'done' AND unposted = 0
                 ORDER BY completion_approved_at DESC",
            )
            .fetch_all(&pool)
            .await?)
        })
        .await
    }

    pub async fn count_tasks(&self) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM tasks")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
