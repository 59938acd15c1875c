//! File version repository implementation.

use sqlx::{SqliteConnection, SqlitePool};
use uuid::Uuid;

use filedepot_core::{AppError, AppResult, ErrorKind};
use filedepot_entity::file::FileVersion;

/// Repository for the immutable file version history.
#[derive(Debug, Clone)]
pub struct VersionRepository {
    pool: SqlitePool,
}

impl VersionRepository {
    /// Create a new version repository.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// The next version number for a file, inside the caller's transaction
    /// so allocation and insert commit together.
    pub async fn next_number_with(
        conn: &mut SqliteConnection,
        file_id: Uuid,
    ) -> AppResult<i64> {
        sqlx::query_scalar(
            "SELECT COALESCE(MAX(version_number), 0) + 1 FROM file_versions WHERE file_id = ?",
        )
        .bind(file_id)
        .fetch_one(conn)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to allocate version number", e)
        })
    }

    /// Insert a version row inside the caller's transaction.
    ///
    /// The unique `(file_id, version_number)` constraint backstops the
    /// per-path lock: a violation means two writers raced past it, and the
    /// loser surfaces as `Conflict` instead of corrupting the sequence.
    pub async fn insert_with(
        conn: &mut SqliteConnection,
        version: &FileVersion,
    ) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO file_versions \
             (id, file_id, version_number, storage_path, size_bytes, created_by, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(version.id)
        .bind(version.file_id)
        .bind(version.version_number)
        .bind(&version.storage_path)
        .bind(version.size_bytes)
        .bind(version.created_by)
        .bind(version.created_at)
        .execute(conn)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => AppError::conflict(format!(
                "Concurrent overwrite collision on version {} of file {}",
                version.version_number, version.file_id
            )),
            _ => AppError::with_source(ErrorKind::Database, "Failed to insert file version", e),
        })?;
        Ok(())
    }

    /// All versions of a file, newest first.
    pub async fn list_by_file(&self, file_id: Uuid) -> AppResult<Vec<FileVersion>> {
        sqlx::query_as::<_, FileVersion>(
            "SELECT * FROM file_versions WHERE file_id = ? ORDER BY version_number DESC",
        )
        .bind(file_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to list versions", e))
    }

    /// Find a version by id, scoped to its owning file.
    pub async fn find_for_file(
        &self,
        version_id: Uuid,
        file_id: Uuid,
    ) -> AppResult<Option<FileVersion>> {
        sqlx::query_as::<_, FileVersion>(
            "SELECT * FROM file_versions WHERE id = ? AND file_id = ?",
        )
        .bind(version_id)
        .bind(file_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find version", e))
    }

    /// Number of versions a file has.
    pub async fn count_for_file(&self, file_id: Uuid) -> AppResult<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM file_versions WHERE file_id = ?")
            .bind(file_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to count versions", e))
    }

    /// Delete all version rows of a file inside the caller's transaction
    /// (the blob cleanup is the storage layer's half).
    pub async fn delete_for_file_with(
        conn: &mut SqliteConnection,
        file_id: Uuid,
    ) -> AppResult<u64> {
        let result = sqlx::query("DELETE FROM file_versions WHERE file_id = ?")
            .bind(file_id)
            .execute(conn)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to delete versions", e)
            })?;
        Ok(result.rows_affected())
    }
}
