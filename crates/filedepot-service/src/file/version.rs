//! File versioning: list history and restore prior content.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use filedepot_core::{AppError, AppResult, ErrorKind};
use filedepot_database::repositories::{FileRepository, VersionRepository};
use filedepot_database::DatabasePool;
use filedepot_entity::activity::ActivityAction;
use filedepot_entity::file::{FileRecord, FileVersion};
use filedepot_storage::versions::contents_equal;
use filedepot_storage::{LocalStorage, PathLocks, VersionArea};

use crate::activity::ActivityLogger;
use crate::context::RequestContext;

/// Result of a restore request.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RestoreOutcome {
    /// The file that was restored.
    pub file_id: Uuid,
    /// The version number whose content is now current.
    pub restored_version: i64,
    /// True when the target version was already the current content, so
    /// nothing changed and no snapshot was taken.
    pub noop: bool,
    /// The version number the pre-restore content was preserved under,
    /// when a restore actually happened.
    pub preserved_as: Option<i64>,
}

/// Manages file version history.
#[derive(Debug, Clone)]
pub struct VersionService {
    files: Arc<FileRepository>,
    versions: Arc<VersionRepository>,
    storage: Arc<LocalStorage>,
    version_area: Arc<VersionArea>,
    locks: PathLocks,
    activity: ActivityLogger,
    db: DatabasePool,
}

impl VersionService {
    /// Creates a new version service.
    pub fn new(
        files: Arc<FileRepository>,
        versions: Arc<VersionRepository>,
        storage: Arc<LocalStorage>,
        version_area: Arc<VersionArea>,
        locks: PathLocks,
        activity: ActivityLogger,
        db: DatabasePool,
    ) -> Self {
        Self {
            files,
            versions,
            storage,
            version_area,
            locks,
            activity,
            db,
        }
    }

    /// List a file's versions, newest first. Owner or admin only.
    pub async fn list_versions(
        &self,
        ctx: &RequestContext,
        file_id: Uuid,
    ) -> AppResult<Vec<FileVersion>> {
        let record = self.require_file(file_id).await?;
        if !ctx.can_modify(&record) {
            return Err(AppError::forbidden("Not authorized to view version history"));
        }
        self.versions.list_by_file(file_id).await
    }

    /// Restore a file to a prior version.
    ///
    /// The current content is snapshotted as a new version first, so the
    /// restore itself can be undone and history is never lost. Restoring
    /// to content identical to the current file is a successful no-op that
    /// creates no duplicate version entry.
    pub async fn restore(
        &self,
        ctx: &RequestContext,
        file_id: Uuid,
        version_id: Uuid,
    ) -> AppResult<RestoreOutcome> {
        let record = self.require_file(file_id).await?;
        if !ctx.can_modify(&record) {
            return Err(AppError::forbidden("Not authorized to restore this file"));
        }

        let target = self
            .versions
            .find_for_file(version_id, file_id)
            .await?
            .ok_or_else(|| {
                AppError::not_found(format!(
                    "Version {version_id} does not belong to file {file_id}"
                ))
            })?;

        let target_abs = self.version_area.abs(&target.storage_path);
        if !self.version_area.exists(&target.storage_path).await {
            return Err(AppError::not_found(format!(
                "Version {} content no longer exists on disk",
                target.version_number
            )));
        }

        let rel = record.relative_path();
        let _guard = self.locks.lock(&rel).await;

        let current_exists = self.storage.exists(&rel).await?;
        if current_exists {
            let current_abs = self.storage.resolve(&rel).await?;
            if contents_equal(&current_abs, &target_abs).await? {
                info!(file_id = %file_id, version = target.version_number, "Restore target already current");
                return Ok(RestoreOutcome {
                    file_id,
                    restored_version: target.version_number,
                    noop: true,
                    preserved_as: None,
                });
            }
        }

        let now = Utc::now();
        let mut preserved_as = None;

        let mut tx = self.db.pool().begin().await.map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to begin restore", e)
        })?;

        if current_exists {
            let current_abs = self.storage.resolve(&rel).await?;
            let number = VersionRepository::next_number_with(&mut *tx, file_id).await?;
            let blob_rel = VersionArea::blob_rel(file_id, number);
            let snap_size = self
                .version_area
                .snapshot(&current_abs, file_id, number)
                .await?;
            let preserved = FileVersion {
                id: Uuid::new_v4(),
                file_id,
                version_number: number,
                storage_path: blob_rel.clone(),
                size_bytes: snap_size as i64,
                created_by: Some(ctx.user_id),
                created_at: now,
            };
            if let Err(e) = VersionRepository::insert_with(&mut *tx, &preserved).await {
                self.version_area.remove_blob(&blob_rel).await;
                return Err(e);
            }
            preserved_as = Some(number);
        } else {
            warn!(file_id = %file_id, path = rel, "Restoring a file whose current content was missing on disk");
        }

        FileRepository::update_size_with(&mut *tx, file_id, target.size_bytes, now).await?;

        // Copy the target blob over the current path via the same
        // stage-and-rename gate every write uses.
        let staged = self.storage.stage_copy(&target_abs).await?;
        if let Err(e) = self.storage.promote(staged, &rel).await {
            if let Some(number) = preserved_as {
                self.version_area
                    .remove_blob(&VersionArea::blob_rel(file_id, number))
                    .await;
            }
            return Err(e);
        }

        if let Err(e) = tx.commit().await {
            // The restored bytes are in place but none of the rows are.
            // Put the preserved snapshot back so the file returns to its
            // pre-operation state.
            warn!(file_id = %file_id, "Restore commit failed, rolling back content");
            if let Some(number) = preserved_as {
                let blob_rel = VersionArea::blob_rel(file_id, number);
                if let Ok(restaged) = self.storage.stage_copy(&self.version_area.abs(&blob_rel)).await
                {
                    let _ = self.storage.promote(restaged, &rel).await;
                }
                self.version_area.remove_blob(&blob_rel).await;
            }
            return Err(AppError::with_source(
                ErrorKind::Database,
                "Failed to commit restore",
                e,
            ));
        }

        self.activity
            .record(
                Some(ctx.user_id),
                ActivityAction::RestoreVersion,
                format!(
                    "Restored {} to version {}",
                    record.filename, target.version_number
                ),
            )
            .await;

        info!(
            file_id = %file_id,
            restored = target.version_number,
            preserved_as = ?preserved_as,
            "Restored file version"
        );
        Ok(RestoreOutcome {
            file_id,
            restored_version: target.version_number,
            noop: false,
            preserved_as,
        })
    }

    async fn require_file(&self, file_id: Uuid) -> AppResult<FileRecord> {
        self.files
            .find_by_id(file_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("File {file_id} not found")))
    }
}
