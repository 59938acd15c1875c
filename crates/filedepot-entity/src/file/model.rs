//! File record entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::status::TaskStatus;

/// The database-tracked representation of an uploaded document, as opposed
/// to its physical bytes on disk.
///
/// Directories are pure filesystem entities and never have a record; the
/// `(folder, filename)` pair is unique among records.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct FileRecord {
    /// Unique file identifier.
    pub id: Uuid,
    /// User-visible file name, unique within its folder.
    pub filename: String,
    /// Normalized relative folder path. `"/"` for the storage root,
    /// otherwise e.g. `"Operation/Subteam"`.
    pub folder: String,
    /// The uploader. Immutable after creation.
    pub owner_id: Uuid,
    /// Current task holder, if the file is assigned.
    pub assigned_to_id: Option<Uuid>,
    /// Work instruction attached to the assignment.
    pub instruction: Option<String>,
    /// Task workflow status. Meaningless while `assigned_to_id` is `None`.
    pub status: TaskStatus,
    /// Task due date.
    pub due_date: Option<DateTime<Utc>>,
    /// When the record was created. Immutable.
    pub created_at: DateTime<Utc>,
    /// When the record was last mutated.
    pub updated_at: DateTime<Utc>,
    /// Byte count of the current physical content.
    pub size_bytes: i64,
}

impl FileRecord {
    /// Relative storage path of the current content, `folder/filename` with
    /// the root folder collapsing to the bare filename.
    pub fn relative_path(&self) -> String {
        let folder = self.folder.trim_matches('/');
        if folder.is_empty() {
            self.filename.clone()
        } else {
            format!("{folder}/{}", self.filename)
        }
    }

    /// The file extension (lowercase), if any.
    pub fn extension(&self) -> Option<String> {
        self.filename
            .rsplit('.')
            .next()
            .filter(|ext| *ext != self.filename)
            .map(|ext| ext.to_lowercase())
    }

    /// Whether the task is overdue at `now`.
    ///
    /// Always computed, never stored: a file is overdue exactly when it has
    /// a due date in the past and is not done.
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        match self.due_date {
            Some(due) => due < now && self.status != TaskStatus::Done,
            None => false,
        }
    }
}

/// Data required to create a new file record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateFileRecord {
    /// The file name.
    pub filename: String,
    /// Normalized folder path.
    pub folder: String,
    /// The uploader.
    pub owner_id: Uuid,
    /// Initial assignee, if the upload doubles as a task assignment.
    pub assigned_to_id: Option<Uuid>,
    /// Work instruction.
    pub instruction: Option<String>,
    /// Task due date.
    pub due_date: Option<DateTime<Utc>>,
    /// Byte count of the uploaded content.
    pub size_bytes: i64,
    /// Record creation time. Usually `Utc::now()`; the filesystem sync
    /// operation passes the on-disk timestamp instead.
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn record(due: Option<DateTime<Utc>>, status: TaskStatus) -> FileRecord {
        let now = Utc::now();
        FileRecord {
            id: Uuid::new_v4(),
            filename: "report.pdf".to_string(),
            folder: "Operation".to_string(),
            owner_id: Uuid::new_v4(),
            assigned_to_id: Some(Uuid::new_v4()),
            instruction: None,
            status,
            due_date: due,
            created_at: now,
            updated_at: now,
            size_bytes: 10,
        }
    }

    #[test]
    fn test_overdue_is_pure_computation() {
        let now = Utc::now();
        let past = now - Duration::hours(1);

        // Past due date, still pending: overdue flips without any write.
        assert!(record(Some(past), TaskStatus::Pending).is_overdue(now));
        assert!(record(Some(past), TaskStatus::InProgress).is_overdue(now));

        // Done clears overdue even with a past due date.
        assert!(!record(Some(past), TaskStatus::Done).is_overdue(now));

        // No due date is never overdue.
        assert!(!record(None, TaskStatus::Pending).is_overdue(now));

        // Future due date is not overdue yet.
        let future = now + Duration::hours(1);
        assert!(!record(Some(future), TaskStatus::Pending).is_overdue(now));
    }

    #[test]
    fn test_relative_path_collapses_root() {
        let mut rec = record(None, TaskStatus::Pending);
        rec.folder = "/".to_string();
        assert_eq!(rec.relative_path(), "report.pdf");
        rec.folder = "Operation/Subteam".to_string();
        assert_eq!(rec.relative_path(), "Operation/Subteam/report.pdf");
    }

    #[test]
    fn test_extension() {
        let rec = record(None, TaskStatus::Pending);
        assert_eq!(rec.extension().as_deref(), Some("pdf"));
    }
}
