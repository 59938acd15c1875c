//! Activity log repository implementation.

use sqlx::SqlitePool;

use filedepot_core::types::{Page, Pagination};
use filedepot_core::{AppError, AppResult, ErrorKind};
use filedepot_entity::activity::ActivityEntry;

/// Repository for the append-only activity log.
#[derive(Debug, Clone)]
pub struct ActivityRepository {
    pool: SqlitePool,
}

impl ActivityRepository {
    /// Create a new activity repository.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Append an entry.
    pub async fn append(&self, entry: &ActivityEntry) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO activity_log (id, user_id, action, details, timestamp) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(entry.id)
        .bind(entry.user_id)
        .bind(entry.action)
        .bind(&entry.details)
        .bind(entry.timestamp)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to append activity entry", e)
        })?;
        Ok(())
    }

    /// Entries newest first.
    pub async fn recent(&self, page: Pagination) -> AppResult<Page<ActivityEntry>> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM activity_log")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to count activity entries", e)
            })?;

        let entries = sqlx::query_as::<_, ActivityEntry>(
            "SELECT * FROM activity_log ORDER BY timestamp DESC, id DESC LIMIT ? OFFSET ?",
        )
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to list activity entries", e)
        })?;

        Ok(Page::new(entries, total as u64, page))
    }

    /// The latest `limit` entries, for the dashboard.
    pub async fn latest(&self, limit: i64) -> AppResult<Vec<ActivityEntry>> {
        sqlx::query_as::<_, ActivityEntry>(
            "SELECT * FROM activity_log ORDER BY timestamp DESC, id DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to fetch latest activity", e)
        })
    }

    /// Delete every entry. Only the audited administrative purge calls
    /// this; it appends its own entry afterwards.
    pub async fn purge_all(&self) -> AppResult<u64> {
        let result = sqlx::query("DELETE FROM activity_log")
            .execute(&self.pool)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to purge activity log", e)
            })?;
        Ok(result.rows_affected())
    }
}
