//! Database configuration.

use serde::{Deserialize, Serialize};

/// Database connection pool configuration.
///
/// FileDepot runs against a single SQLite file next to the stored content;
/// the pool settings mostly matter for concurrent readers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file. Created if missing.
    #[serde(default = "default_path")]
    pub path: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// How long a writer waits on a locked database before failing, in
    /// seconds.
    #[serde(default = "default_busy_timeout")]
    pub busy_timeout_seconds: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_path(),
            max_connections: default_max_connections(),
            busy_timeout_seconds: default_busy_timeout(),
        }
    }
}

fn default_path() -> String {
    "data/filedepot.db".to_string()
}

fn default_max_connections() -> u32 {
    10
}

fn default_busy_timeout() -> u64 {
    5
}
