//! File version entity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A preserved prior content of a file, created automatically on overwrite
/// and on restore.
///
/// Versions are immutable once written. `version_number` starts at 1 for
/// the originally uploaded content and strictly increases with no gaps,
/// enforced by a unique `(file_id, version_number)` constraint.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct FileVersion {
    /// Unique version identifier.
    pub id: Uuid,
    /// The file this version belongs to. Deleting the file cascades here.
    pub file_id: Uuid,
    /// Sequential version number, 1-based.
    pub version_number: i64,
    /// Path of the version blob within the versions area.
    pub storage_path: String,
    /// Size in bytes.
    pub size_bytes: i64,
    /// The user whose write displaced this content.
    pub created_by: Option<Uuid>,
    /// When this version was created.
    pub created_at: DateTime<Utc>,
}
