//! Activity log entity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// The mutating actions the activity log records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActivityAction {
    Upload,
    Overwrite,
    Download,
    Delete,
    BatchDelete,
    BatchDownload,
    BatchMove,
    BatchAssign,
    RestoreVersion,
    StatusChange,
    UpdateInstruction,
    Assign,
    CreateDir,
    DeleteDir,
    Sync,
    PurgeLog,
    Register,
}

/// One append-only activity log entry.
///
/// Entries are never mutated; the only deletion path is the audited
/// administrative purge, which itself appends a `PurgeLog` entry.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ActivityEntry {
    /// Unique entry identifier.
    pub id: Uuid,
    /// The acting user; `None` for system actions.
    pub user_id: Option<Uuid>,
    /// What happened.
    pub action: ActivityAction,
    /// Free-text detail.
    pub details: String,
    /// When it happened.
    pub timestamp: DateTime<Utc>,
}
