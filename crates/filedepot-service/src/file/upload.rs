//! File upload: new files and versioned overwrites.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, warn};
use uuid::Uuid;
use validator::Validate;

use filedepot_core::config::StorageConfig;
use filedepot_core::types::ByteStream;
use filedepot_core::{AppError, AppResult, ErrorKind};
use filedepot_database::repositories::{
    FileRepository, NotificationRepository, UserRepository, VersionRepository,
};
use filedepot_database::DatabasePool;
use filedepot_entity::activity::ActivityAction;
use filedepot_entity::file::{CreateFileRecord, FileRecord, FileVersion, TaskStatus};
use filedepot_entity::notification::Notification;
use filedepot_storage::local::StagedFile;
use filedepot_storage::{path, LocalStorage, PathLocks, VersionArea};

use crate::activity::ActivityLogger;
use crate::context::RequestContext;

/// Upload parameters. The content stream travels separately.
#[derive(Debug, Clone, Validate)]
pub struct UploadRequest {
    /// Target folder path.
    #[validate(length(max = 1024))]
    pub folder: String,
    /// File name including extension.
    #[validate(length(min = 1, max = 255))]
    pub filename: String,
    /// Declared content length, when the transport knows it. Checked
    /// before any byte is read; the streaming check still applies.
    pub declared_size: Option<i64>,
    /// Assign the file to this user as a task.
    pub assigned_to_id: Option<Uuid>,
    /// Work instruction for the assignment.
    #[validate(length(max = 2000))]
    pub instruction: Option<String>,
    /// Task due date.
    pub due_date: Option<DateTime<Utc>>,
    /// Replace an existing file, versioning the displaced content.
    pub overwrite: bool,
}

/// Handles uploads of new files and versioned overwrites of existing ones.
#[derive(Debug, Clone)]
pub struct UploadService {
    files: Arc<FileRepository>,
    users: Arc<UserRepository>,
    notifications: Arc<NotificationRepository>,
    storage: Arc<LocalStorage>,
    version_area: Arc<VersionArea>,
    locks: PathLocks,
    activity: ActivityLogger,
    db: DatabasePool,
    config: StorageConfig,
}

impl UploadService {
    /// Creates a new upload service.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        files: Arc<FileRepository>,
        users: Arc<UserRepository>,
        notifications: Arc<NotificationRepository>,
        storage: Arc<LocalStorage>,
        version_area: Arc<VersionArea>,
        locks: PathLocks,
        activity: ActivityLogger,
        db: DatabasePool,
        config: StorageConfig,
    ) -> Self {
        Self {
            files,
            users,
            notifications,
            storage,
            version_area,
            locks,
            activity,
            db,
            config,
        }
    }

    /// Upload a file.
    ///
    /// An existing target without `overwrite` fails with `AlreadyExists`,
    /// the structured conflict the client's overwrite-confirmation flow
    /// keys on. With `overwrite`, the displaced content becomes the next
    /// version before the new content lands; both steps commit or neither
    /// does.
    pub async fn upload(
        &self,
        ctx: &RequestContext,
        req: UploadRequest,
        content: ByteStream,
    ) -> AppResult<FileRecord> {
        req.validate()
            .map_err(|e| AppError::validation(e.to_string()))?;
        check_extension(&req.filename, &self.config.allowed_extensions)?;

        if let Some(declared) = req.declared_size {
            if declared < 0 || declared as u64 > self.config.max_upload_size_bytes {
                return Err(AppError::payload_too_large(format!(
                    "Declared size {declared} exceeds the maximum of {} bytes",
                    self.config.max_upload_size_bytes
                )));
            }
        }

        if let Some(assignee) = req.assigned_to_id {
            self.users
                .find_by_id(assignee)
                .await?
                .ok_or_else(|| AppError::not_found(format!("Assignee {assignee} not found")))?;
        }

        let folder_norm = path::normalize(&req.folder)?;
        let fkey = path::folder_key(&folder_norm);
        let rel = path::join_folder(&fkey, &req.filename)?;

        // Serialize against any other mutation of this path.
        let _guard = self.locks.lock(&rel).await;

        let existing = self.files.find_by_folder_and_name(&fkey, &req.filename).await?;
        let fs_exists = self.storage.exists(&rel).await?;

        if (existing.is_some() || fs_exists) && !req.overwrite {
            return Err(AppError::already_exists(format!(
                "File already exists: {rel}"
            )));
        }

        let was_overwrite = existing.is_some();
        let staged = self
            .storage
            .stage_stream(content, self.config.max_upload_size_bytes)
            .await?;

        let record = match existing {
            Some(current) => {
                self.overwrite_existing(ctx, current, staged, fs_exists, &rel, &req)
                    .await?
            }
            None => self.create_new(ctx, staged, &rel, &fkey, &req).await?,
        };

        if let Some(assignee) = req.assigned_to_id {
            if assignee != ctx.user_id {
                let notification = Notification::task_assigned(
                    assignee,
                    &record.filename,
                    record.id,
                    req.due_date.is_some(),
                );
                if let Err(e) = self.notifications.create(&notification).await {
                    warn!(error = %e, "Failed to create assignment notification");
                }
            }
        }

        let action = if was_overwrite {
            ActivityAction::Overwrite
        } else {
            ActivityAction::Upload
        };
        self.activity
            .record(
                Some(ctx.user_id),
                action,
                format!("{} {} in {}", action_verb(action), record.filename, record.folder),
            )
            .await;

        info!(
            file_id = %record.id,
            path = rel,
            bytes = record.size_bytes,
            overwrite = was_overwrite,
            "Uploaded file"
        );
        Ok(record)
    }

    /// Overwrite protocol: allocate the next version number, snapshot the
    /// displaced content into the version area, record the version row and
    /// new size in one transaction, then atomically rename the staged
    /// content over the current path. Every failure path removes whatever
    /// it half-did.
    async fn overwrite_existing(
        &self,
        ctx: &RequestContext,
        current: FileRecord,
        staged: StagedFile,
        fs_exists: bool,
        rel: &str,
        req: &UploadRequest,
    ) -> AppResult<FileRecord> {
        let now = Utc::now();
        let new_size = staged.size_bytes as i64;

        if fs_exists {
            let current_abs = self.storage.resolve(rel).await?;

            let mut tx = self.db.pool().begin().await.map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to begin overwrite", e)
            })?;

            let number = match VersionRepository::next_number_with(&mut *tx, current.id).await {
                Ok(n) => n,
                Err(e) => {
                    staged.discard().await;
                    return Err(e);
                }
            };
            let blob_rel = VersionArea::blob_rel(current.id, number);

            let snap_size = match self
                .version_area
                .snapshot(&current_abs, current.id, number)
                .await
            {
                Ok(size) => size,
                Err(e) => {
                    staged.discard().await;
                    return Err(e);
                }
            };

            let version = FileVersion {
                id: Uuid::new_v4(),
                file_id: current.id,
                version_number: number,
                storage_path: blob_rel.clone(),
                size_bytes: snap_size as i64,
                created_by: Some(ctx.user_id),
                created_at: now,
            };

            if let Err(e) = VersionRepository::insert_with(&mut *tx, &version).await {
                self.version_area.remove_blob(&blob_rel).await;
                staged.discard().await;
                return Err(e);
            }
            if let Err(e) =
                FileRepository::update_size_with(&mut *tx, current.id, new_size, now).await
            {
                self.version_area.remove_blob(&blob_rel).await;
                staged.discard().await;
                return Err(e);
            }

            if let Err(e) = self.storage.promote(staged, rel).await {
                // promote cleans its staging file; the transaction rolls
                // back on drop. Only the blob needs removing.
                self.version_area.remove_blob(&blob_rel).await;
                return Err(e);
            }

            if let Err(e) = tx.commit().await {
                // The new content is already in place but the version row
                // is lost. Put the snapshot back so the system returns to
                // its pre-operation state, then drop the blob.
                warn!(file_id = %current.id, "Overwrite commit failed, restoring prior content");
                if let Ok(restaged) = self.storage.stage_copy(&self.version_area.abs(&blob_rel)).await
                {
                    let _ = self.storage.promote(restaged, rel).await;
                }
                self.version_area.remove_blob(&blob_rel).await;
                return Err(AppError::with_source(
                    ErrorKind::Database,
                    "Failed to commit overwrite",
                    e,
                ));
            }
        } else {
            // Integrity gap: the record exists but its content is missing
            // on disk. There is nothing to snapshot; just land the new
            // content and fix the size.
            warn!(file_id = %current.id, path = rel, "Overwriting record whose content was missing on disk");
            self.storage.promote(staged, rel).await?;
            let mut conn = self.db.pool().acquire().await.map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to acquire connection", e)
            })?;
            FileRepository::update_size_with(&mut *conn, current.id, new_size, now).await?;
        }

        // Assignment metadata travels with the overwrite when provided.
        let mut updated = self
            .files
            .find_by_id(current.id)
            .await?
            .ok_or_else(|| AppError::internal("File record vanished during overwrite"))?;
        let mut dirty = false;
        if req.assigned_to_id.is_some() {
            updated.assigned_to_id = req.assigned_to_id;
            updated.status = TaskStatus::Pending;
            dirty = true;
        }
        if let Some(instruction) = &req.instruction {
            updated.instruction = Some(instruction.clone());
            dirty = true;
        }
        if req.due_date.is_some() {
            updated.due_date = req.due_date;
            dirty = true;
        }
        if dirty {
            updated.updated_at = Utc::now();
            return self.files.update(&updated).await;
        }
        Ok(updated)
    }

    async fn create_new(
        &self,
        ctx: &RequestContext,
        staged: StagedFile,
        rel: &str,
        fkey: &str,
        req: &UploadRequest,
    ) -> AppResult<FileRecord> {
        let size_bytes = staged.size_bytes as i64;
        self.storage.promote(staged, rel).await?;

        let create = CreateFileRecord {
            filename: req.filename.clone(),
            folder: fkey.to_string(),
            owner_id: ctx.user_id,
            assigned_to_id: req.assigned_to_id,
            instruction: req.instruction.clone(),
            due_date: req.due_date,
            size_bytes,
            created_at: Utc::now(),
        };

        match self.files.create(&create).await {
            Ok(record) => Ok(record),
            Err(e) => {
                // The row failed, so the freshly landed content must go
                // too, or the trees diverge.
                let _ = self.storage.delete(rel).await;
                Err(e)
            }
        }
    }
}

/// Enforce the allowed-extension whitelist against the *final* extension,
/// case-insensitively, so `report.pdf.exe` fails and `REPORT.PDF` passes.
fn check_extension(filename: &str, allowed: &[String]) -> AppResult<()> {
    let ext = filename
        .rsplit('.')
        .next()
        .filter(|e| *e != filename && !e.is_empty())
        .map(|e| format!(".{}", e.to_lowercase()))
        .ok_or_else(|| {
            AppError::unsupported_file_type(format!("File has no extension: {filename}"))
        })?;

    if allowed.iter().any(|a| a.eq_ignore_ascii_case(&ext)) {
        Ok(())
    } else {
        Err(AppError::unsupported_file_type(format!(
            "File type not allowed: {ext}. Allowed types: {}",
            allowed.join(", ")
        )))
    }
}

fn action_verb(action: ActivityAction) -> &'static str {
    match action {
        ActivityAction::Overwrite => "Overwrote",
        _ => "Uploaded",
    }
}
