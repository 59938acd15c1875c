//! File record repository implementation.

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteArguments;
use sqlx::{Arguments, SqliteConnection, SqlitePool};
use uuid::Uuid;

use filedepot_core::types::{Page, Pagination};
use filedepot_core::{AppError, AppResult, ErrorKind};
use filedepot_entity::file::{CreateFileRecord, FileRecord, FileSearchFilter, TaskStatus};

/// Repository for file record CRUD and query operations.
#[derive(Debug, Clone)]
pub struct FileRepository {
    pool: SqlitePool,
}

impl FileRepository {
    /// Create a new file repository.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a new record. A `(folder, filename)` collision surfaces as
    /// `AlreadyExists`.
    pub async fn create(&self, data: &CreateFileRecord) -> AppResult<FileRecord> {
        let record = FileRecord {
            id: Uuid::new_v4(),
            filename: data.filename.clone(),
            folder: data.folder.clone(),
            owner_id: data.owner_id,
            assigned_to_id: data.assigned_to_id,
            instruction: data.instruction.clone(),
            status: TaskStatus::Pending,
            due_date: data.due_date,
            created_at: data.created_at,
            updated_at: data.created_at,
            size_bytes: data.size_bytes,
        };

        sqlx::query(
            "INSERT INTO file_records \
             (id, filename, folder, owner_id, assigned_to_id, instruction, status, due_date, \
              created_at, updated_at, size_bytes) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(record.id)
        .bind(&record.filename)
        .bind(&record.folder)
        .bind(record.owner_id)
        .bind(record.assigned_to_id)
        .bind(&record.instruction)
        .bind(record.status)
        .bind(record.due_date)
        .bind(record.created_at)
        .bind(record.updated_at)
        .bind(record.size_bytes)
        .execute(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => AppError::already_exists(
                format!("A file named '{}' already exists in {}", record.filename, record.folder),
            ),
            _ => AppError::with_source(ErrorKind::Database, "Failed to create file record", e),
        })?;

        Ok(record)
    }

    /// Find a record by ID.
    pub async fn find_by_id(&self, id: Uuid) -> AppResult<Option<FileRecord>> {
        sqlx::query_as::<_, FileRecord>("SELECT * FROM file_records WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find file record", e))
    }

    /// Find a record by folder key and name (for duplicate checking).
    pub async fn find_by_folder_and_name(
        &self,
        folder: &str,
        filename: &str,
    ) -> AppResult<Option<FileRecord>> {
        sqlx::query_as::<_, FileRecord>(
            "SELECT * FROM file_records WHERE folder = ? AND filename = ?",
        )
        .bind(folder)
        .bind(filename)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to find file record by name", e)
        })
    }

    /// All records in one folder, name-sorted.
    pub async fn find_by_folder(&self, folder: &str) -> AppResult<Vec<FileRecord>> {
        sqlx::query_as::<_, FileRecord>(
            "SELECT * FROM file_records WHERE folder = ? ORDER BY filename ASC",
        )
        .bind(folder)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to list folder records", e))
    }

    /// All records in a folder and every folder beneath it.
    pub async fn find_by_folder_prefix(&self, folder: &str) -> AppResult<Vec<FileRecord>> {
        sqlx::query_as::<_, FileRecord>(
            "SELECT * FROM file_records WHERE folder = ? OR folder LIKE ? ORDER BY folder, filename",
        )
        .bind(folder)
        .bind(format!("{}/%", folder.trim_end_matches('/')))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to list subtree records", e)
        })
    }

    /// Update every mutable column of a record. `owner_id`, `created_at`,
    /// and the identity columns are deliberately not writable here beyond
    /// the rename/move fields.
    pub async fn update(&self, record: &FileRecord) -> AppResult<FileRecord> {
        let result = sqlx::query(
            "UPDATE file_records SET filename = ?, folder = ?, assigned_to_id = ?, \
             instruction = ?, status = ?, due_date = ?, updated_at = ?, size_bytes = ? \
             WHERE id = ?",
        )
        .bind(&record.filename)
        .bind(&record.folder)
        .bind(record.assigned_to_id)
        .bind(&record.instruction)
        .bind(record.status)
        .bind(record.due_date)
        .bind(record.updated_at)
        .bind(record.size_bytes)
        .bind(record.id)
        .execute(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => AppError::already_exists(
                format!("A file named '{}' already exists in {}", record.filename, record.folder),
            ),
            _ => AppError::with_source(ErrorKind::Database, "Failed to update file record", e),
        })?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found(format!(
                "File record {} not found",
                record.id
            )));
        }
        Ok(record.clone())
    }

    /// Transaction-scoped size/timestamp update, used inside the overwrite
    /// and restore protocols.
    pub async fn update_size_with(
        conn: &mut SqliteConnection,
        id: Uuid,
        size_bytes: i64,
        updated_at: DateTime<Utc>,
    ) -> AppResult<()> {
        let result = sqlx::query(
            "UPDATE file_records SET size_bytes = ?, updated_at = ? WHERE id = ?",
        )
        .bind(size_bytes)
        .bind(updated_at)
        .bind(id)
        .execute(conn)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to update file size", e))?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found(format!("File record {id} not found")));
        }
        Ok(())
    }

    /// Delete a record. Version rows cascade via the schema.
    pub async fn delete(&self, id: Uuid) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM file_records WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to delete file record", e)
            })?;
        if result.rows_affected() == 0 {
            return Err(AppError::not_found(format!("File record {id} not found")));
        }
        Ok(())
    }

    /// Transaction-scoped delete, used by the recursive directory cascade.
    pub async fn delete_with(conn: &mut SqliteConnection, id: Uuid) -> AppResult<()> {
        sqlx::query("DELETE FROM file_records WHERE id = ?")
            .bind(id)
            .execute(conn)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to delete file record", e)
            })?;
        Ok(())
    }

    /// Filtered, paginated search.
    ///
    /// `visible_to` scopes non-admin callers to records they own or are
    /// assigned; admins pass `None`. Ordering is `created_at DESC` with the
    /// id as a stable tiebreaker so paging stays deterministic.
    pub async fn search(
        &self,
        filter: &FileSearchFilter,
        visible_to: Option<Uuid>,
        page: Pagination,
    ) -> AppResult<Page<FileRecord>> {
        let mut conditions: Vec<&str> = Vec::new();
        let mut args = SqliteArguments::default();

        if let Some(user_id) = visible_to {
            conditions.push("(owner_id = ? OR assigned_to_id = ?)");
            args.add(user_id).map_err(bind_err)?;
            args.add(user_id).map_err(bind_err)?;
        }
        if let Some(q) = &filter.name_contains {
            conditions.push("LOWER(filename) LIKE ?");
            args.add(format!("%{}%", q.to_lowercase())).map_err(bind_err)?;
        }
        if let Some(folder) = &filter.folder {
            conditions.push("folder = ?");
            args.add(folder.clone()).map_err(bind_err)?;
        }
        if let Some(ext) = filter.normalized_file_type() {
            conditions.push("LOWER(filename) LIKE ?");
            args.add(format!("%{ext}")).map_err(bind_err)?;
        }
        if let Some(from) = filter.created_after {
            conditions.push("created_at >= ?");
            args.add(from).map_err(bind_err)?;
        }
        if let Some(to) = filter.created_before {
            conditions.push("created_at <= ?");
            args.add(to).map_err(bind_err)?;
        }
        if let Some(uploader) = filter.uploader_id {
            conditions.push("owner_id = ?");
            args.add(uploader).map_err(bind_err)?;
        }
        if let Some(assignee) = filter.assigned_to_id {
            conditions.push("assigned_to_id = ?");
            args.add(assignee).map_err(bind_err)?;
        }
        if let Some(status) = filter.status {
            conditions.push("status = ?");
            args.add(status).map_err(bind_err)?;
        }
        match filter.has_due_date {
            Some(true) => conditions.push("due_date IS NOT NULL"),
            Some(false) => conditions.push("due_date IS NULL"),
            None => {}
        }
        if filter.overdue_only {
            conditions.push("due_date IS NOT NULL AND due_date < ? AND status != 'done'");
            args.add(filter.as_of.unwrap_or_else(Utc::now)).map_err(bind_err)?;
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let count_sql = format!("SELECT COUNT(*) FROM file_records {where_clause}");
        let select_sql = format!(
            "SELECT * FROM file_records {where_clause} \
             ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?"
        );

        let total: i64 = sqlx::query_scalar_with(&count_sql, args.clone())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to count search results", e)
            })?;

        args.add(page.limit()).map_err(bind_err)?;
        args.add(page.offset()).map_err(bind_err)?;

        let records = sqlx::query_as_with::<_, FileRecord, _>(&select_sql, args)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to search file records", e)
            })?;

        Ok(Page::new(records, total as u64, page))
    }

    /// Files currently assigned to one user.
    pub async fn assigned_to(&self, user_id: Uuid) -> AppResult<Vec<FileRecord>> {
        sqlx::query_as::<_, FileRecord>(
            "SELECT * FROM file_records WHERE assigned_to_id = ? \
             ORDER BY created_at DESC, id DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to list assigned files", e)
        })
    }

    /// Every assigned file, for the admin task board.
    pub async fn all_assigned(&self) -> AppResult<Vec<FileRecord>> {
        sqlx::query_as::<_, FileRecord>(
            "SELECT * FROM file_records WHERE assigned_to_id IS NOT NULL \
             ORDER BY created_at DESC, id DESC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to list assigned files", e)
        })
    }

    /// Assigned files with a due date inside `[now, until]` that are not
    /// done: the due-reminder scan.
    pub async fn due_between(
        &self,
        now: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> AppResult<Vec<FileRecord>> {
        sqlx::query_as::<_, FileRecord>(
            "SELECT * FROM file_records WHERE assigned_to_id IS NOT NULL \
             AND status != 'done' AND due_date IS NOT NULL \
             AND due_date >= ? AND due_date <= ? \
             ORDER BY due_date ASC",
        )
        .bind(now)
        .bind(until)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to scan due files", e))
    }

    /// Total number of records.
    pub async fn count_all(&self) -> AppResult<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM file_records")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to count files", e))
    }

    /// Number of assigned records.
    pub async fn count_assigned(&self) -> AppResult<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM file_records WHERE assigned_to_id IS NOT NULL")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to count assigned files", e)
            })
    }

    /// Number of assigned records in a given status.
    pub async fn count_assigned_with_status(&self, status: TaskStatus) -> AppResult<i64> {
        sqlx::query_scalar(
            "SELECT COUNT(*) FROM file_records \
             WHERE assigned_to_id IS NOT NULL AND status = ?",
        )
        .bind(status)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to count by status", e))
    }

    /// Number of records overdue at `now`.
    pub async fn count_overdue(&self, now: DateTime<Utc>) -> AppResult<i64> {
        sqlx::query_scalar(
            "SELECT COUNT(*) FROM file_records \
             WHERE due_date IS NOT NULL AND due_date < ? AND status != 'done'",
        )
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to count overdue", e))
    }

    /// Number of records under a top-level folder (inclusive of subfolders).
    pub async fn count_in_subtree(&self, folder: &str) -> AppResult<i64> {
        sqlx::query_scalar(
            "SELECT COUNT(*) FROM file_records WHERE folder = ? OR folder LIKE ?",
        )
        .bind(folder)
        .bind(format!("{}/%", folder.trim_end_matches('/')))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to count subtree", e))
    }

    /// Every record, for the filesystem sync scan.
    pub async fn list_all(&self) -> AppResult<Vec<FileRecord>> {
        sqlx::query_as::<_, FileRecord>("SELECT * FROM file_records ORDER BY folder, filename")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to list records", e))
    }

    /// Every filename, for the dashboard's file-type distribution.
    pub async fn list_filenames(&self) -> AppResult<Vec<String>> {
        sqlx::query_scalar("SELECT filename FROM file_records")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to list filenames", e))
    }
}

fn bind_err(e: sqlx::error::BoxDynError) -> AppError {
    AppError::database(format!("Failed to bind query argument: {e}"))
}
