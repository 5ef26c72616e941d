//! Minimal user directory: ID → display name.
//!
//! Work orders store bare user IDs; views decorate them with names. An
//! unknown ID is not an error — it resolves to the sentinel display value.

use anyhow::Result;
use sqlx::SqlitePool;

/// Display value for a `created_by` the directory has no row for.
pub const UNKNOWN_DISPLAY_NAME: &str = "Unknown";

#[derive(Clone)]
pub struct UserDirectory {
    pool: SqlitePool,
}

impl UserDirectory {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn display_name(&self, id: &str) -> Result<Option<String>> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT display_name FROM users WHERE id = ?")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(|(name,)| name))
    }

    pub async fn upsert_user(&self, id: &str, display_name: &str, now: &str) -> Result<()> {
        sqlx::query(
            "INSERT INTO users (id, display_name, created_at) VALUES (?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET display_name = excluded.display_name",
        )
        .bind(id)
        .bind(display_name)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
