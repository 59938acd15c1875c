//! Per-user view preferences.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// How a user prefers the file listing rendered.
///
/// Stored whole and upserted whole; clients read defaults until the user
/// saves something.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UserPreferences {
    /// Row identifier.
    pub id: Uuid,
    /// Owning user.
    pub user_id: Uuid,
    /// `"grid"` or `"list"`.
    pub view_mode: String,
    /// Comma-separated column names.
    pub visible_columns: String,
    /// Column to sort by.
    pub sort_key: String,
    /// `"asc"` or `"desc"`.
    pub sort_direction: String,
    /// `"light"`, `"dark"`, or `"system"`.
    pub theme: String,
}

impl UserPreferences {
    /// The defaults a user sees before ever saving preferences.
    pub fn defaults_for(user_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            view_mode: "grid".to_string(),
            visible_columns: "name,size,date,uploader,status".to_string(),
            sort_key: "filename".to_string(),
            sort_direction: "asc".to_string(),
            theme: "system".to_string(),
        }
    }
}
