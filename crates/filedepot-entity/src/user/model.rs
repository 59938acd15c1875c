//! User entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::role::UserRole;

/// A registered FileDepot user.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    /// Unique user identifier.
    pub id: Uuid,
    /// Login name, unique across the system.
    pub username: String,
    /// Argon2 password hash. Never serialized out of the backend.
    #[serde(skip_serializing)]
    pub password_hash: String,
    /// The user's role.
    pub role: UserRole,
    /// When the account was created.
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Check whether this user is an administrator.
    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }
}

/// Public projection of a user, safe to hand to clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSummary {
    /// Unique user identifier.
    pub id: Uuid,
    /// Login name.
    pub username: String,
    /// The user's role.
    pub role: UserRole,
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            role: user.role,
        }
    }
}
