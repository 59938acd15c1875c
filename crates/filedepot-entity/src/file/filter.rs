//! Search filter for file record queries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::status::TaskStatus;

/// Composable filter set for the advanced file search.
///
/// Every field is independently optional; set fields compose with logical
/// AND. `overdue_only` needs the caller's `now` so that overdue stays a
/// pure computation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileSearchFilter {
    /// Case-insensitive filename substring.
    pub name_contains: Option<String>,
    /// Exact folder path.
    pub folder: Option<String>,
    /// Extension-derived file type, with or without the leading dot
    /// (`"pdf"` and `".pdf"` are equivalent).
    pub file_type: Option<String>,
    /// Only records created at or after this instant.
    pub created_after: Option<DateTime<Utc>>,
    /// Only records created at or before this instant.
    pub created_before: Option<DateTime<Utc>>,
    /// Only records uploaded by this user.
    pub uploader_id: Option<Uuid>,
    /// Only records assigned to this user.
    pub assigned_to_id: Option<Uuid>,
    /// Only records in this task status.
    pub status: Option<TaskStatus>,
    /// Only records that do (or do not) carry a due date.
    pub has_due_date: Option<bool>,
    /// Only records overdue at `as_of`.
    pub overdue_only: bool,
    /// The instant "overdue" is evaluated against. Defaults to the query
    /// execution time when unset.
    pub as_of: Option<DateTime<Utc>>,
}

impl FileSearchFilter {
    /// The normalized extension filter, always with a leading dot and
    /// lowercase, e.g. `Some(".pdf")`.
    pub fn normalized_file_type(&self) -> Option<String> {
        self.file_type.as_ref().map(|t| {
            let t = t.to_lowercase();
            if t.starts_with('.') { t } else { format!(".{t}") }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_type_normalization() {
        let mut filter = FileSearchFilter {
            file_type: Some("PDF".to_string()),
            ..Default::default()
        };
        assert_eq!(filter.normalized_file_type().as_deref(), Some(".pdf"));

        filter.file_type = Some(".docx".to_string());
        assert_eq!(filter.normalized_file_type().as_deref(), Some(".docx"));
    }
}
