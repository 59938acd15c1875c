//! Storage configuration.

use serde::{Deserialize, Serialize};

/// File storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Root directory for all runtime data. Current file content lives under
    /// `<data_root>/files/`, version blobs under `<data_root>/versions/`.
    #[serde(default = "default_data_root")]
    pub data_root: String,
    /// Maximum upload size in bytes (default 100 MiB).
    #[serde(default = "default_max_upload")]
    pub max_upload_size_bytes: u64,
    /// Allowed upload extensions, compared case-insensitively against the
    /// final extension of the filename.
    #[serde(default = "default_allowed_extensions")]
    pub allowed_extensions: Vec<String>,
}

impl StorageConfig {
    /// Directory holding current file content.
    pub fn files_root(&self) -> String {
        format!("{}/files", self.data_root.trim_end_matches('/'))
    }

    /// Directory holding version blobs, keyed by file id and version number.
    /// Kept as a sibling of the files tree so version history can never
    /// collide with a folder path.
    pub fn versions_root(&self) -> String {
        format!("{}/versions", self.data_root.trim_end_matches('/'))
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_root: default_data_root(),
            max_upload_size_bytes: default_max_upload(),
            allowed_extensions: default_allowed_extensions(),
        }
    }
}

fn default_data_root() -> String {
    "./data".to_string()
}

fn default_max_upload() -> u64 {
    100 * 1024 * 1024 // 100 MiB
}

fn default_allowed_extensions() -> Vec<String> {
    vec![
        ".pdf".to_string(),
        ".docx".to_string(),
        ".xlsx".to_string(),
        ".pptx".to_string(),
    ]
}
