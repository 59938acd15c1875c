//! Folder listing value objects.
//!
//! A listing merges physical directory entries with file records; the two
//! views can disagree, and the merge reports the disagreement instead of
//! repairing it (reads never mutate).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::model::FileRecord;

/// Where a listing entry came from, and whether the two views agreed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryOrigin {
    /// Filesystem entry backed by a matching file record.
    Tracked,
    /// Filesystem entry with no record. The admin sync operation can
    /// materialize a record for it; listing never does.
    Unindexed,
    /// Record whose physical file is gone. An integrity warning, not a
    /// failure.
    Missing,
}

/// One entry of a merged folder listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FolderEntry {
    /// Entry name within the folder.
    pub name: String,
    /// Whether this is a subdirectory.
    pub is_dir: bool,
    /// Size in bytes; recursive for directories, 0 for missing files.
    pub size_bytes: i64,
    /// Last modification time, when the filesystem reports one.
    pub modified_at: Option<DateTime<Utc>>,
    /// How this entry was derived.
    pub origin: EntryOrigin,
    /// The backing record, present for `Tracked` and `Missing` entries.
    pub record: Option<FileRecord>,
}
