//! In-app notification entity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// What triggered a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// A file was assigned to the recipient as a task.
    TaskAssigned,
    /// An assigned task's due date is approaching.
    TaskDue,
    /// A file the recipient cares about changed.
    FileUpdate,
    /// System-originated message.
    System,
}

/// An in-app notification.
///
/// Created by the task engine; mutated only to flip `is_read`; deleted by
/// explicit recipient action or bulk clear.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Notification {
    /// Unique notification identifier.
    pub id: Uuid,
    /// The recipient.
    pub user_id: Uuid,
    /// What triggered this notification.
    pub kind: NotificationKind,
    /// Short headline.
    pub title: String,
    /// Full message body.
    pub message: String,
    /// Whether the recipient has read it.
    pub is_read: bool,
    /// Whether it should be highlighted (e.g. a due date is involved).
    pub is_urgent: bool,
    /// The originating file, when applicable. Nulled if the file goes away.
    pub related_file_id: Option<Uuid>,
    /// When the notification was created.
    pub created_at: DateTime<Utc>,
}

impl Notification {
    /// Build a task-assignment notification.
    pub fn task_assigned(
        recipient: Uuid,
        filename: &str,
        file_id: Uuid,
        has_due_date: bool,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: recipient,
            kind: NotificationKind::TaskAssigned,
            title: "New Task Assigned".to_string(),
            message: format!("You have been assigned to: {filename}"),
            is_read: false,
            is_urgent: has_due_date,
            related_file_id: Some(file_id),
            created_at: Utc::now(),
        }
    }

    /// Build a due-date reminder notification.
    pub fn task_due(recipient: Uuid, filename: &str, file_id: Uuid, due: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: recipient,
            kind: NotificationKind::TaskDue,
            title: "Task Due Soon".to_string(),
            message: format!("{filename} is due {}", due.format("%Y-%m-%d %H:%M UTC")),
            is_read: false,
            is_urgent: true,
            related_file_id: Some(file_id),
            created_at: Utc::now(),
        }
    }
}
