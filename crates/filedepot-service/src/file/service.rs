//! Folder listing, single-file delete, directory operations, and the
//! admin filesystem sync.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use filedepot_core::{AppError, AppResult, ErrorKind};
use filedepot_database::repositories::{FileRepository, VersionRepository};
use filedepot_database::DatabasePool;
use filedepot_entity::activity::ActivityAction;
use filedepot_entity::file::{CreateFileRecord, EntryOrigin, FolderEntry};
use filedepot_storage::{path, LocalStorage, PathLocks, VersionArea};

use crate::activity::ActivityLogger;
use crate::context::RequestContext;

/// Result of the admin filesystem sync.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncReport {
    /// Records created for files that existed only on disk.
    pub added: u64,
}

/// Folder-level file operations.
#[derive(Debug, Clone)]
pub struct FileService {
    files: Arc<FileRepository>,
    storage: Arc<LocalStorage>,
    version_area: Arc<VersionArea>,
    locks: PathLocks,
    activity: ActivityLogger,
    db: DatabasePool,
}

impl FileService {
    /// Creates a new file service.
    pub fn new(
        files: Arc<FileRepository>,
        storage: Arc<LocalStorage>,
        version_area: Arc<VersionArea>,
        locks: PathLocks,
        activity: ActivityLogger,
        db: DatabasePool,
    ) -> Self {
        Self {
            files,
            storage,
            version_area,
            locks,
            activity,
            db,
        }
    }

    /// List a folder, merging physical entries with file records.
    ///
    /// Reconciliation policy: a file on disk with no record becomes an
    /// `Unindexed` entry (no row is created; listing never mutates); a
    /// record whose file is gone becomes a `Missing` entry with size 0 and
    /// an integrity warning. Directories come from the filesystem alone.
    pub async fn list_folder(
        &self,
        _ctx: &RequestContext,
        folder: &str,
    ) -> AppResult<Vec<FolderEntry>> {
        let normalized = path::normalize(folder)?;
        if !self.storage.is_dir(&normalized).await? {
            return Err(AppError::not_found(format!("Folder not found: {folder}")));
        }
        let fkey = path::folder_key(&normalized);

        let records = self.files.find_by_folder(&fkey).await?;
        let mut by_name: HashMap<String, _> = records
            .into_iter()
            .map(|r| (r.filename.clone(), r))
            .collect();

        let mut entries = Vec::new();
        for fs_entry in self.storage.list(&normalized).await? {
            if fs_entry.is_dir {
                let child = if normalized.is_empty() {
                    fs_entry.name.clone()
                } else {
                    format!("{normalized}/{}", fs_entry.name)
                };
                entries.push(FolderEntry {
                    name: fs_entry.name,
                    is_dir: true,
                    size_bytes: self.storage.dir_size(&child).await? as i64,
                    modified_at: fs_entry.modified_at,
                    origin: EntryOrigin::Tracked,
                    record: None,
                });
            } else {
                match by_name.remove(&fs_entry.name) {
                    Some(mut record) => {
                        // The disk is authoritative for current size.
                        record.size_bytes = fs_entry.size_bytes as i64;
                        entries.push(FolderEntry {
                            name: fs_entry.name,
                            is_dir: false,
                            size_bytes: record.size_bytes,
                            modified_at: fs_entry.modified_at,
                            origin: EntryOrigin::Tracked,
                            record: Some(record),
                        });
                    }
                    None => {
                        entries.push(FolderEntry {
                            name: fs_entry.name,
                            is_dir: false,
                            size_bytes: fs_entry.size_bytes as i64,
                            modified_at: fs_entry.modified_at,
                            origin: EntryOrigin::Unindexed,
                            record: None,
                        });
                    }
                }
            }
        }

        // Whatever is left in the map has a row but no bytes on disk.
        for (name, record) in by_name {
            warn!(
                file_id = %record.id,
                folder = fkey,
                filename = name,
                "File record has no content on disk"
            );
            entries.push(FolderEntry {
                name,
                is_dir: false,
                size_bytes: 0,
                modified_at: None,
                origin: EntryOrigin::Missing,
                record: Some(record),
            });
        }

        entries.sort_by(|a, b| b.is_dir.cmp(&a.is_dir).then(a.name.cmp(&b.name)));
        Ok(entries)
    }

    /// Delete one file: physical content, record, version rows, and
    /// version blobs all go together. Owner or admin only.
    pub async fn delete_file(&self, ctx: &RequestContext, file_id: Uuid) -> AppResult<()> {
        let record = self
            .files
            .find_by_id(file_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("File {file_id} not found")))?;

        if !ctx.can_modify(&record) {
            return Err(AppError::forbidden("Not authorized to delete this file"));
        }

        let rel = record.relative_path();
        let _guard = self.locks.lock(&rel).await;

        match self.storage.delete(&rel).await {
            Ok(()) => {}
            Err(e) if e.kind == ErrorKind::NotFound => {
                warn!(file_id = %file_id, path = rel, "Deleting record whose content was already gone");
            }
            Err(e) => return Err(e),
        }

        // Version rows cascade with the record; blobs are removed after.
        self.files.delete(file_id).await?;
        self.version_area.remove_history(file_id).await?;

        self.activity
            .record(
                Some(ctx.user_id),
                ActivityAction::Delete,
                format!("Deleted {} from {}", record.filename, record.folder),
            )
            .await;

        info!(file_id = %file_id, path = rel, "Deleted file");
        Ok(())
    }

    /// Create a directory. Admin only.
    pub async fn create_directory(&self, ctx: &RequestContext, folder: &str) -> AppResult<()> {
        if !ctx.is_admin() {
            return Err(AppError::forbidden("Only administrators may create directories"));
        }
        let normalized = path::normalize_non_root(folder)?;
        self.storage.create_dir(&normalized).await?;

        self.activity
            .record(
                Some(ctx.user_id),
                ActivityAction::CreateDir,
                format!("Created directory {normalized}"),
            )
            .await;
        info!(path = normalized, "Created directory");
        Ok(())
    }

    /// Delete a directory. Admin only.
    ///
    /// The fail-safe default refuses anything non-empty; `recursive`
    /// cascades records, version rows, version blobs, and the physical
    /// subtree, with the row deletions in one transaction.
    pub async fn delete_directory(
        &self,
        ctx: &RequestContext,
        folder: &str,
        recursive: bool,
    ) -> AppResult<()> {
        if !ctx.is_admin() {
            return Err(AppError::forbidden("Only administrators may delete directories"));
        }
        let normalized = path::normalize_non_root(folder)?;
        if !self.storage.is_dir(&normalized).await? {
            return Err(AppError::not_found(format!("Directory not found: {folder}")));
        }
        let fkey = path::folder_key(&normalized);
        let records = self.files.find_by_folder_prefix(&fkey).await?;

        if !recursive {
            if !records.is_empty() || !self.storage.list(&normalized).await?.is_empty() {
                return Err(AppError::not_empty(format!(
                    "Directory is not empty: {folder}"
                )));
            }
            self.storage.delete_dir(&normalized, false).await?;
        } else {
            let mut tx = self.db.pool().begin().await.map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to begin directory delete", e)
            })?;
            for record in &records {
                VersionRepository::delete_for_file_with(&mut *tx, record.id).await?;
                FileRepository::delete_with(&mut *tx, record.id).await?;
            }
            tx.commit().await.map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to commit directory delete", e)
            })?;

            for record in &records {
                self.version_area.remove_history(record.id).await?;
            }
            self.storage.delete_dir(&normalized, true).await?;
        }

        self.activity
            .record(
                Some(ctx.user_id),
                ActivityAction::DeleteDir,
                format!(
                    "Deleted directory {normalized} ({} records cascaded)",
                    if recursive { records.len() } else { 0 }
                ),
            )
            .await;
        info!(path = normalized, recursive, "Deleted directory");
        Ok(())
    }

    /// Walk the storage tree and create records for files that exist only
    /// on disk. Admin only; the explicit counterpart to the non-mutating
    /// listing.
    pub async fn sync_filesystem(&self, ctx: &RequestContext) -> AppResult<SyncReport> {
        if !ctx.is_admin() {
            return Err(AppError::forbidden("Only administrators may sync the filesystem"));
        }

        let known: HashSet<(String, String)> = self
            .files
            .list_all()
            .await?
            .into_iter()
            .map(|r| (r.folder, r.filename))
            .collect();

        let mut added = 0u64;
        for found in self.storage.walk_files("").await? {
            if known.contains(&(found.folder.clone(), found.name.clone())) {
                continue;
            }
            let create = CreateFileRecord {
                filename: found.name,
                folder: found.folder,
                owner_id: ctx.user_id,
                assigned_to_id: None,
                instruction: None,
                due_date: None,
                size_bytes: found.size_bytes as i64,
                created_at: found.modified_at.unwrap_or_else(Utc::now),
            };
            match self.files.create(&create).await {
                Ok(_) => added += 1,
                Err(e) => {
                    warn!(error = %e, "Failed to sync one file, continuing");
                }
            }
        }

        self.activity
            .record(
                Some(ctx.user_id),
                ActivityAction::Sync,
                format!("Filesystem sync added {added} records"),
            )
            .await;
        info!(added, "Filesystem sync complete");
        Ok(SyncReport { added })
    }
}
