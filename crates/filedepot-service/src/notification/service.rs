//! Notification CRUD and the on-demand due-date reminder scan.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::info;
use uuid::Uuid;

use filedepot_core::types::{Page, Pagination};
use filedepot_core::AppResult;
use filedepot_database::repositories::{FileRepository, NotificationRepository};
use filedepot_entity::notification::{Notification, NotificationKind};

use crate::context::RequestContext;

/// Manages user notifications.
#[derive(Debug, Clone)]
pub struct NotificationService {
    notifications: Arc<NotificationRepository>,
    files: Arc<FileRepository>,
}

impl NotificationService {
    /// Creates a new notification service.
    pub fn new(
        notifications: Arc<NotificationRepository>,
        files: Arc<FileRepository>,
    ) -> Self {
        Self {
            notifications,
            files,
        }
    }

    /// List the caller's notifications, newest first.
    pub async fn list(
        &self,
        ctx: &RequestContext,
        unread_only: bool,
        page: Pagination,
    ) -> AppResult<Page<Notification>> {
        self.notifications
            .find_by_user(ctx.user_id, unread_only, page)
            .await
    }

    /// Unread count for the badge.
    pub async fn unread_count(&self, ctx: &RequestContext) -> AppResult<i64> {
        self.notifications.count_unread(ctx.user_id).await
    }

    /// Mark one notification read.
    pub async fn mark_read(&self, ctx: &RequestContext, id: Uuid) -> AppResult<()> {
        self.notifications.mark_read(id, ctx.user_id).await
    }

    /// Mark everything read. Returns how many flipped.
    pub async fn mark_all_read(&self, ctx: &RequestContext) -> AppResult<u64> {
        self.notifications.mark_all_read(ctx.user_id).await
    }

    /// Delete one notification.
    pub async fn delete(&self, ctx: &RequestContext, id: Uuid) -> AppResult<()> {
        self.notifications.delete(id, ctx.user_id).await
    }

    /// Delete all of the caller's notifications.
    pub async fn clear_all(&self, ctx: &RequestContext) -> AppResult<u64> {
        self.notifications.clear_all(ctx.user_id).await
    }

    /// Create `task_due` reminders for assigned, unfinished files whose
    /// due date falls within `window` of `now`.
    ///
    /// Called on demand (there is no background scheduler); a file whose
    /// assignee already has an unread reminder is skipped, so repeated
    /// scans stay idempotent. Returns the number of reminders created.
    pub async fn remind_due_tasks(
        &self,
        now: DateTime<Utc>,
        window: Duration,
    ) -> AppResult<u64> {
        let due_soon = self.files.due_between(now, now + window).await?;

        let mut created = 0u64;
        for record in due_soon {
            let (Some(assignee), Some(due)) = (record.assigned_to_id, record.due_date) else {
                continue;
            };
            if self
                .notifications
                .has_unread_for_file(assignee, record.id, NotificationKind::TaskDue)
                .await?
            {
                continue;
            }
            let notification =
                Notification::task_due(assignee, &record.filename, record.id, due);
            self.notifications.create(&notification).await?;
            created += 1;
        }

        if created > 0 {
            info!(created, "Created due-date reminders");
        }
        Ok(created)
    }
}
