//! User registration, credential verification, admin user management, and
//! view preferences.

use std::sync::Arc;

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use filedepot_core::types::{Page, Pagination};
use filedepot_core::{AppError, AppResult};
use filedepot_database::repositories::UserRepository;
use filedepot_entity::activity::ActivityAction;
use filedepot_entity::user::{User, UserPreferences, UserRole};

use crate::activity::ActivityLogger;
use crate::context::RequestContext;

/// Registration parameters.
#[derive(Debug, Clone, Validate, Serialize, Deserialize)]
pub struct RegisterRequest {
    /// Desired login name.
    #[validate(length(min = 3, max = 64))]
    pub username: String,
    /// Plain-text password; hashed before it touches the database.
    #[validate(length(min = 8, max = 128))]
    pub password: String,
}

/// Account management.
#[derive(Debug, Clone)]
pub struct UserService {
    users: Arc<UserRepository>,
    activity: ActivityLogger,
}

impl UserService {
    /// Creates a new user service.
    pub fn new(users: Arc<UserRepository>, activity: ActivityLogger) -> Self {
        Self { users, activity }
    }

    /// Register an account. The first account in the system becomes the
    /// administrator, decided atomically against the user count inside
    /// the registration transaction, never a cached flag.
    pub async fn register(&self, req: RegisterRequest) -> AppResult<User> {
        req.validate()
            .map_err(|e| AppError::validation(e.to_string()))?;

        let salt = SaltString::generate(&mut OsRng);
        let hash = Argon2::default()
            .hash_password(req.password.as_bytes(), &salt)
            .map_err(|e| AppError::internal(format!("Failed to hash password: {e}")))?
            .to_string();

        let user = self.users.register(&req.username, &hash).await?;

        self.activity
            .record(
                Some(user.id),
                ActivityAction::Register,
                format!("Registered account {} ({})", user.username, user.role),
            )
            .await;
        info!(username = %user.username, role = %user.role, "Registered user");
        Ok(user)
    }

    /// Verify credentials and return the account.
    ///
    /// This is the contract point for the out-of-scope token layer: it
    /// answers "who is this", not "issue a token".
    pub async fn verify_password(&self, username: &str, password: &str) -> AppResult<User> {
        let user = self
            .users
            .find_by_username(username)
            .await?
            .ok_or_else(|| AppError::forbidden("Incorrect username or password"))?;

        let parsed = PasswordHash::new(&user.password_hash)
            .map_err(|e| AppError::internal(format!("Stored password hash is invalid: {e}")))?;
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .map_err(|_| AppError::forbidden("Incorrect username or password"))?;

        Ok(user)
    }

    /// Look up one user. Admin only.
    pub async fn get(&self, ctx: &RequestContext, id: Uuid) -> AppResult<User> {
        self.require_admin(ctx)?;
        self.users
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("User {id} not found")))
    }

    /// List users with an optional username filter. Admin only.
    pub async fn list(
        &self,
        ctx: &RequestContext,
        search: Option<&str>,
        page: Pagination,
    ) -> AppResult<Page<User>> {
        self.require_admin(ctx)?;
        self.users.list(search, page).await
    }

    /// Total registered users. Unauthenticated; the login screen uses it
    /// to decide whether to offer first-run registration.
    pub async fn count(&self) -> AppResult<i64> {
        self.users.count().await
    }

    /// Change a user's role. Admin only.
    pub async fn update_role(
        &self,
        ctx: &RequestContext,
        id: Uuid,
        role: UserRole,
    ) -> AppResult<User> {
        self.require_admin(ctx)?;
        self.users.update_role(id, role).await
    }

    /// Delete a user. Admin only; admins cannot delete themselves.
    pub async fn delete(&self, ctx: &RequestContext, id: Uuid) -> AppResult<()> {
        self.require_admin(ctx)?;
        if id == ctx.user_id {
            return Err(AppError::validation("You cannot delete your own account"));
        }
        self.users.delete(id).await
    }

    /// The caller's view preferences, defaults until saved.
    pub async fn preferences(&self, ctx: &RequestContext) -> AppResult<UserPreferences> {
        Ok(self
            .users
            .get_preferences(ctx.user_id)
            .await?
            .unwrap_or_else(|| UserPreferences::defaults_for(ctx.user_id)))
    }

    /// Save the caller's view preferences.
    pub async fn save_preferences(
        &self,
        ctx: &RequestContext,
        mut prefs: UserPreferences,
    ) -> AppResult<UserPreferences> {
        prefs.user_id = ctx.user_id;
        self.users.upsert_preferences(&prefs).await?;
        Ok(prefs)
    }

    fn require_admin(&self, ctx: &RequestContext) -> AppResult<()> {
        if ctx.is_admin() {
            Ok(())
        } else {
            Err(AppError::forbidden("Only administrators may manage users"))
        }
    }
}
