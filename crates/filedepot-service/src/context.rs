//! Request context carrying the authenticated actor.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use filedepot_entity::file::FileRecord;
use filedepot_entity::user::{User, UserRole};

/// Context for the current authenticated request.
///
/// Built by the (out-of-scope) transport layer after token validation and
/// passed into every service method, so each operation knows *who* is
/// acting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestContext {
    /// The authenticated user's ID.
    pub user_id: Uuid,
    /// The username (convenience field).
    pub username: String,
    /// The user's role.
    pub role: UserRole,
    /// When the request was received.
    pub request_time: DateTime<Utc>,
}

impl RequestContext {
    /// Creates a context for a user.
    pub fn for_user(user: &User) -> Self {
        Self {
            user_id: user.id,
            username: user.username.clone(),
            role: user.role,
            request_time: Utc::now(),
        }
    }

    /// Whether the current user is an admin.
    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }

    /// Whether the current user may read a file's content: admins, the
    /// owner, and the current assignee.
    pub fn can_read(&self, record: &FileRecord) -> bool {
        self.is_admin()
            || record.owner_id == self.user_id
            || record.assigned_to_id == Some(self.user_id)
    }

    /// Whether the current user may delete or move a file: admins and the
    /// owner.
    pub fn can_modify(&self, record: &FileRecord) -> bool {
        self.is_admin() || record.owner_id == self.user_id
    }
}
