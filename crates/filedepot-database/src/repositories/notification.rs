//! Notification repository implementation.

use sqlx::SqlitePool;
use uuid::Uuid;

use filedepot_core::types::{Page, Pagination};
use filedepot_core::{AppError, AppResult, ErrorKind};
use filedepot_entity::notification::{Notification, NotificationKind};

/// Repository for in-app notifications.
#[derive(Debug, Clone)]
pub struct NotificationRepository {
    pool: SqlitePool,
}

impl NotificationRepository {
    /// Create a new notification repository.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a notification.
    pub async fn create(&self, notification: &Notification) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO notifications \
             (id, user_id, kind, title, message, is_read, is_urgent, related_file_id, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(notification.id)
        .bind(notification.user_id)
        .bind(notification.kind)
        .bind(&notification.title)
        .bind(&notification.message)
        .bind(notification.is_read)
        .bind(notification.is_urgent)
        .bind(notification.related_file_id)
        .bind(notification.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to create notification", e)
        })?;
        Ok(())
    }

    /// A user's notifications, newest first.
    pub async fn find_by_user(
        &self,
        user_id: Uuid,
        unread_only: bool,
        page: Pagination,
    ) -> AppResult<Page<Notification>> {
        let (count_sql, select_sql) = if unread_only {
            (
                "SELECT COUNT(*) FROM notifications WHERE user_id = ? AND is_read = 0",
                "SELECT * FROM notifications WHERE user_id = ? AND is_read = 0 \
                 ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?",
            )
        } else {
            (
                "SELECT COUNT(*) FROM notifications WHERE user_id = ?",
                "SELECT * FROM notifications WHERE user_id = ? \
                 ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?",
            )
        };

        let total: i64 = sqlx::query_scalar(count_sql)
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to count notifications", e)
            })?;

        let items = sqlx::query_as::<_, Notification>(select_sql)
            .bind(user_id)
            .bind(page.limit())
            .bind(page.offset())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to list notifications", e)
            })?;

        Ok(Page::new(items, total as u64, page))
    }

    /// Unread count for the notification badge.
    pub async fn count_unread(&self, user_id: Uuid) -> AppResult<i64> {
        sqlx::query_scalar(
            "SELECT COUNT(*) FROM notifications WHERE user_id = ? AND is_read = 0",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to count unread", e))
    }

    /// Mark one notification read, scoped to the recipient.
    pub async fn mark_read(&self, id: Uuid, user_id: Uuid) -> AppResult<()> {
        let result = sqlx::query(
            "UPDATE notifications SET is_read = 1 WHERE id = ? AND user_id = ?",
        )
        .bind(id)
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to mark read", e))?;
        if result.rows_affected() == 0 {
            return Err(AppError::not_found(format!("Notification {id} not found")));
        }
        Ok(())
    }

    /// Mark all of a user's notifications read. Returns how many flipped.
    pub async fn mark_all_read(&self, user_id: Uuid) -> AppResult<u64> {
        let result = sqlx::query(
            "UPDATE notifications SET is_read = 1 WHERE user_id = ? AND is_read = 0",
        )
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to mark all read", e))?;
        Ok(result.rows_affected())
    }

    /// Delete one notification, scoped to the recipient.
    pub async fn delete(&self, id: Uuid, user_id: Uuid) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM notifications WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to delete notification", e)
            })?;
        if result.rows_affected() == 0 {
            return Err(AppError::not_found(format!("Notification {id} not found")));
        }
        Ok(())
    }

    /// Delete all of a user's notifications. Returns how many went.
    pub async fn clear_all(&self, user_id: Uuid) -> AppResult<u64> {
        let result = sqlx::query("DELETE FROM notifications WHERE user_id = ?")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to clear notifications", e)
            })?;
        Ok(result.rows_affected())
    }

    /// Whether the user already has an unread reminder of the given kind
    /// for a file. Keeps the due-reminder scan idempotent.
    pub async fn has_unread_for_file(
        &self,
        user_id: Uuid,
        file_id: Uuid,
        kind: NotificationKind,
    ) -> AppResult<bool> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM notifications \
             WHERE user_id = ? AND related_file_id = ? AND kind = ? AND is_read = 0",
        )
        .bind(user_id)
        .bind(file_id)
        .bind(kind)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to check reminders", e)
        })?;
        Ok(count > 0)
    }
}
