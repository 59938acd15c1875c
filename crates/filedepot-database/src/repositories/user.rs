//! User and preferences repository implementation.

use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use filedepot_core::types::{Page, Pagination};
use filedepot_core::{AppError, AppResult, ErrorKind};
use filedepot_entity::user::{User, UserPreferences, UserRole};

/// Repository for users and their view preferences.
#[derive(Debug, Clone)]
pub struct UserRepository {
    pool: SqlitePool,
}

impl UserRepository {
    /// Create a new user repository.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Register a user.
    ///
    /// The first account becomes admin. The count check and the insert run
    /// in one transaction, so the "first user" decision is an atomic
    /// check-and-set against the table, never a cached flag.
    pub async fn register(&self, username: &str, password_hash: &str) -> AppResult<User> {
        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to begin transaction", e)
        })?;

        let existing: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to count users", e))?;

        let user = User {
            id: Uuid::new_v4(),
            username: username.to_string(),
            password_hash: password_hash.to_string(),
            role: if existing == 0 {
                UserRole::Admin
            } else {
                UserRole::Member
            },
            created_at: Utc::now(),
        };

        sqlx::query(
            "INSERT INTO users (id, username, password_hash, role, created_at) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(user.id)
        .bind(&user.username)
        .bind(&user.password_hash)
        .bind(user.role)
        .bind(user.created_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                AppError::already_exists(format!("Username already registered: {username}"))
            }
            _ => AppError::with_source(ErrorKind::Database, "Failed to create user", e),
        })?;

        tx.commit().await.map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to commit registration", e)
        })?;

        Ok(user)
    }

    /// Find a user by ID.
    pub async fn find_by_id(&self, id: Uuid) -> AppResult<Option<User>> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find user", e))
    }

    /// Find a user by username.
    pub async fn find_by_username(&self, username: &str) -> AppResult<Option<User>> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE username = ?")
            .bind(username)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find user", e))
    }

    /// List users with an optional username substring filter.
    pub async fn list(&self, search: Option<&str>, page: Pagination) -> AppResult<Page<User>> {
        let (total, users) = match search {
            Some(q) => {
                let pattern = format!("%{}%", q.to_lowercase());
                let total: i64 = sqlx::query_scalar(
                    "SELECT COUNT(*) FROM users WHERE LOWER(username) LIKE ?",
                )
                .bind(&pattern)
                .fetch_one(&self.pool)
                .await
                .map_err(|e| {
                    AppError::with_source(ErrorKind::Database, "Failed to count users", e)
                })?;
                let users = sqlx::query_as::<_, User>(
                    "SELECT * FROM users WHERE LOWER(username) LIKE ? \
                     ORDER BY username ASC, id ASC LIMIT ? OFFSET ?",
                )
                .bind(&pattern)
                .bind(page.limit())
                .bind(page.offset())
                .fetch_all(&self.pool)
                .await
                .map_err(|e| {
                    AppError::with_source(ErrorKind::Database, "Failed to list users", e)
                })?;
                (total, users)
            }
            None => {
                let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
                    .fetch_one(&self.pool)
                    .await
                    .map_err(|e| {
                        AppError::with_source(ErrorKind::Database, "Failed to count users", e)
                    })?;
                let users = sqlx::query_as::<_, User>(
                    "SELECT * FROM users ORDER BY username ASC, id ASC LIMIT ? OFFSET ?",
                )
                .bind(page.limit())
                .bind(page.offset())
                .fetch_all(&self.pool)
                .await
                .map_err(|e| {
                    AppError::with_source(ErrorKind::Database, "Failed to list users", e)
                })?;
                (total, users)
            }
        };

        Ok(Page::new(users, total as u64, page))
    }

    /// Total registered users.
    pub async fn count(&self) -> AppResult<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to count users", e))
    }

    /// Change a user's role.
    pub async fn update_role(&self, id: Uuid, role: UserRole) -> AppResult<User> {
        let result = sqlx::query("UPDATE users SET role = ? WHERE id = ?")
            .bind(role)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to update user role", e)
            })?;
        if result.rows_affected() == 0 {
            return Err(AppError::not_found(format!("User {id} not found")));
        }
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("User {id} not found")))
    }

    /// Delete a user.
    pub async fn delete(&self, id: Uuid) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to delete user", e))?;
        if result.rows_affected() == 0 {
            return Err(AppError::not_found(format!("User {id} not found")));
        }
        Ok(())
    }

    /// Get a user's view preferences, if they ever saved any.
    pub async fn get_preferences(&self, user_id: Uuid) -> AppResult<Option<UserPreferences>> {
        sqlx::query_as::<_, UserPreferences>(
            "SELECT * FROM user_preferences WHERE user_id = ?",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to get preferences", e))
    }

    /// Insert or replace a user's view preferences.
    pub async fn upsert_preferences(&self, prefs: &UserPreferences) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO user_preferences \
             (id, user_id, view_mode, visible_columns, sort_key, sort_direction, theme) \
             VALUES (?, ?, ?, ?, ?, ?, ?) \
             ON CONFLICT (user_id) DO UPDATE SET \
             view_mode = excluded.view_mode, visible_columns = excluded.visible_columns, \
             sort_key = excluded.sort_key, sort_direction = excluded.sort_direction, \
             theme = excluded.theme",
        )
        .bind(prefs.id)
        .bind(prefs.user_id)
        .bind(&prefs.view_mode)
        .bind(&prefs.visible_columns)
        .bind(&prefs.sort_key)
        .bind(&prefs.sort_direction)
        .bind(&prefs.theme)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to save preferences", e)
        })?;
        Ok(())
    }
}
