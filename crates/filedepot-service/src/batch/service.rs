//! Batch operations coordinator.
//!
//! Every batch reports per-item success and failure instead of failing
//! atomically as a whole: one bad id never aborts the rest, and each
//! batch writes exactly one aggregate activity entry.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use filedepot_core::types::ByteStream;
use filedepot_core::{AppError, AppResult, ErrorKind};
use filedepot_database::repositories::{FileRepository, NotificationRepository, UserRepository};
use filedepot_entity::activity::ActivityAction;
use filedepot_entity::file::TaskStatus;
use filedepot_entity::notification::Notification;
use filedepot_storage::archive::{build_zip, ArchiveEntry};
use filedepot_storage::{path, LocalStorage, PathLocks, VersionArea};

use crate::activity::ActivityLogger;
use crate::context::RequestContext;

/// One item that a batch could not process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchFailure {
    /// The failing file id.
    pub id: Uuid,
    /// Why it failed.
    pub reason: String,
}

/// Per-item outcome of a batch operation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchReport {
    /// Ids processed successfully.
    pub succeeded: Vec<Uuid>,
    /// Ids that failed, with reasons.
    pub failed: Vec<BatchFailure>,
}

impl BatchReport {
    fn fail(&mut self, id: Uuid, reason: impl Into<String>) {
        self.failed.push(BatchFailure {
            id,
            reason: reason.into(),
        });
    }
}

/// A zip archive ready to stream, plus what was left out of it.
pub struct ArchiveDownload {
    /// Suggested archive filename.
    pub archive_name: String,
    /// Archive size in bytes.
    pub size_bytes: u64,
    /// Files included, by record id (directory downloads list paths in
    /// the manifest instead).
    pub included: Vec<Uuid>,
    /// Files skipped, with reasons. Also listed in the archive's trailing
    /// manifest entry.
    pub skipped: Vec<BatchFailure>,
    /// The archive bytes. Dropping the stream removes the spool file.
    pub stream: ByteStream,
}

impl std::fmt::Debug for ArchiveDownload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArchiveDownload")
            .field("archive_name", &self.archive_name)
            .field("size_bytes", &self.size_bytes)
            .field("included", &self.included.len())
            .field("skipped", &self.skipped.len())
            .finish()
    }
}

/// Coordinates bulk delete, download, move, and assign.
#[derive(Debug, Clone)]
pub struct BatchService {
    files: Arc<FileRepository>,
    users: Arc<UserRepository>,
    notifications: Arc<NotificationRepository>,
    storage: Arc<LocalStorage>,
    version_area: Arc<VersionArea>,
    locks: PathLocks,
    activity: ActivityLogger,
}

impl BatchService {
    /// Creates a new batch service.
    pub fn new(
        files: Arc<FileRepository>,
        users: Arc<UserRepository>,
        notifications: Arc<NotificationRepository>,
        storage: Arc<LocalStorage>,
        version_area: Arc<VersionArea>,
        locks: PathLocks,
        activity: ActivityLogger,
    ) -> Self {
        Self {
            files,
            users,
            notifications,
            storage,
            version_area,
            locks,
            activity,
        }
    }

    /// Delete a set of files. Owner-or-admin per id; partial success is
    /// the normal outcome, reported per item.
    pub async fn batch_delete(
        &self,
        ctx: &RequestContext,
        file_ids: &[Uuid],
    ) -> AppResult<BatchReport> {
        let mut report = BatchReport::default();

        for &id in file_ids {
            let record = match self.files.find_by_id(id).await? {
                Some(record) => record,
                None => {
                    report.fail(id, "File not found");
                    continue;
                }
            };
            if !ctx.can_modify(&record) {
                report.fail(id, "Not authorized to delete this file");
                continue;
            }

            let rel = record.relative_path();
            let _guard = self.locks.lock(&rel).await;

            match self.storage.delete(&rel).await {
                Ok(()) => {}
                Err(e) if e.kind == ErrorKind::NotFound => {
                    warn!(file_id = %id, path = rel, "Content already gone, removing record");
                }
                Err(e) => {
                    report.fail(id, e.message.clone());
                    continue;
                }
            }
            if let Err(e) = self.files.delete(id).await {
                report.fail(id, e.message.clone());
                continue;
            }
            self.version_area.remove_history(id).await?;
            report.succeeded.push(id);
        }

        self.activity
            .record(
                Some(ctx.user_id),
                ActivityAction::BatchDelete,
                format!(
                    "Deleted {} of {} files ({} failed)",
                    report.succeeded.len(),
                    file_ids.len(),
                    report.failed.len()
                ),
            )
            .await;

        info!(
            requested = file_ids.len(),
            deleted = report.succeeded.len(),
            "Batch delete complete"
        );
        Ok(report)
    }

    /// Build a zip of the given files and stream it.
    ///
    /// Files the caller cannot read (and ids that point nowhere) are
    /// silently skipped from the archive and reported in the trailing
    /// manifest; they never fail the whole download.
    pub async fn batch_download(
        &self,
        ctx: &RequestContext,
        file_ids: &[Uuid],
    ) -> AppResult<ArchiveDownload> {
        let mut entries = Vec::new();
        let mut included = Vec::new();
        let mut skipped = Vec::new();
        let mut used_names: HashSet<String> = HashSet::new();

        for &id in file_ids {
            let record = match self.files.find_by_id(id).await? {
                Some(record) => record,
                None => {
                    skipped.push(BatchFailure {
                        id,
                        reason: "File not found".to_string(),
                    });
                    continue;
                }
            };
            if !ctx.can_read(&record) {
                skipped.push(BatchFailure {
                    id,
                    reason: "Not authorized".to_string(),
                });
                continue;
            }
            let rel = record.relative_path();
            if !self.storage.exists(&rel).await? {
                skipped.push(BatchFailure {
                    id,
                    reason: "Content missing on disk".to_string(),
                });
                continue;
            }

            let name = dedupe_name(&record.filename, &mut used_names);
            entries.push(ArchiveEntry {
                name,
                path: self.storage.resolve(&rel).await?,
            });
            included.push(id);
        }

        let manifest = render_manifest(included.len(), &skipped);
        let archive = build_zip(entries, Some(manifest)).await?;
        let size_bytes = archive.size_bytes;
        let stream: ByteStream = Box::pin(archive.into_stream()?);

        self.activity
            .record(
                Some(ctx.user_id),
                ActivityAction::BatchDownload,
                format!(
                    "Downloaded {} files as archive ({} skipped)",
                    included.len(),
                    skipped.len()
                ),
            )
            .await;

        Ok(ArchiveDownload {
            archive_name: "files.zip".to_string(),
            size_bytes,
            included,
            skipped,
            stream,
        })
    }

    /// Zip one directory subtree, preserving paths under the directory's
    /// own name. Untracked files are included only for admins.
    pub async fn download_directory(
        &self,
        ctx: &RequestContext,
        folder: &str,
    ) -> AppResult<ArchiveDownload> {
        let normalized = path::normalize_non_root(folder)?;
        if !self.storage.is_dir(&normalized).await? {
            return Err(AppError::not_found(format!("Directory not found: {folder}")));
        }
        let fkey = path::folder_key(&normalized);
        let dir_name = normalized
            .rsplit('/')
            .next()
            .unwrap_or(&normalized)
            .to_string();

        let records: std::collections::HashMap<(String, String), _> = self
            .files
            .find_by_folder_prefix(&fkey)
            .await?
            .into_iter()
            .map(|r| ((r.folder.clone(), r.filename.clone()), r))
            .collect();

        let mut entries = Vec::new();
        let mut skipped = Vec::new();
        let mut included = Vec::new();

        for found in self.storage.walk_files(&normalized).await? {
            let key = (found.folder.clone(), found.name.clone());
            let readable = match records.get(&key) {
                Some(record) => {
                    if ctx.can_read(record) {
                        included.push(record.id);
                        true
                    } else {
                        skipped.push(BatchFailure {
                            id: record.id,
                            reason: format!("Not authorized: {}", found.name),
                        });
                        false
                    }
                }
                // No record: only admins see untracked content.
                None => ctx.is_admin(),
            };
            if !readable {
                continue;
            }

            let rel = if found.folder == "/" {
                found.name.clone()
            } else {
                format!("{}/{}", found.folder, found.name)
            };
            // Archive paths are relative to the directory's parent, so the
            // zip unpacks into a folder named after the directory.
            let arc_name = match rel.strip_prefix(&normalized) {
                Some(rest) => format!("{dir_name}{rest}"),
                None => format!("{dir_name}/{}", found.name),
            };
            entries.push(ArchiveEntry {
                name: arc_name,
                path: self.storage.resolve(&rel).await?,
            });
        }

        let manifest = render_manifest(entries.len(), &skipped);
        let archive = build_zip(entries, Some(manifest)).await?;
        let size_bytes = archive.size_bytes;
        let stream: ByteStream = Box::pin(archive.into_stream()?);

        self.activity
            .record(
                Some(ctx.user_id),
                ActivityAction::BatchDownload,
                format!("Downloaded directory {normalized} as archive"),
            )
            .await;

        Ok(ArchiveDownload {
            archive_name: format!("{dir_name}.zip"),
            size_bytes,
            included,
            skipped,
            stream,
        })
    }

    /// Move a set of files to another folder. Owner-or-admin per id; name
    /// collisions at the destination fail that item only.
    pub async fn batch_move(
        &self,
        ctx: &RequestContext,
        file_ids: &[Uuid],
        destination_folder: &str,
    ) -> AppResult<BatchReport> {
        let dest_norm = path::normalize(destination_folder)?;
        let dest_key = path::folder_key(&dest_norm);
        if !dest_norm.is_empty() && !self.storage.is_dir(&dest_norm).await? {
            // Match upload behavior: the destination folder materializes
            // on demand.
            self.storage.create_dir(&dest_norm).await?;
        }

        let mut report = BatchReport::default();
        for &id in file_ids {
            let mut record = match self.files.find_by_id(id).await? {
                Some(record) => record,
                None => {
                    report.fail(id, "File not found");
                    continue;
                }
            };
            if !ctx.can_modify(&record) {
                report.fail(id, "Not authorized to move this file");
                continue;
            }
            if record.folder == dest_key {
                report.fail(id, "Already in the destination folder");
                continue;
            }

            let from_rel = record.relative_path();
            let to_rel = match path::join_folder(&dest_key, &record.filename) {
                Ok(rel) => rel,
                Err(e) => {
                    report.fail(id, e.message.clone());
                    continue;
                }
            };
            if self.storage.exists(&to_rel).await? {
                report.fail(id, "A file with this name already exists in the destination");
                continue;
            }

            let _guard = self.locks.lock(&from_rel).await;
            if let Err(e) = self.storage.rename(&from_rel, &to_rel).await {
                report.fail(id, e.message.clone());
                continue;
            }

            record.folder = dest_key.clone();
            record.updated_at = Utc::now();
            if let Err(e) = self.files.update(&record).await {
                // Put the bytes back so the trees stay consistent.
                let _ = self.storage.rename(&to_rel, &from_rel).await;
                report.fail(id, e.message.clone());
                continue;
            }
            report.succeeded.push(id);
        }

        self.activity
            .record(
                Some(ctx.user_id),
                ActivityAction::BatchMove,
                format!(
                    "Moved {} of {} files to {dest_key} ({} failed)",
                    report.succeeded.len(),
                    file_ids.len(),
                    report.failed.len()
                ),
            )
            .await;
        Ok(report)
    }

    /// Assign a set of files to one user. Admin only; per-item report,
    /// one notification per assigned file, one aggregate log entry.
    pub async fn batch_assign(
        &self,
        ctx: &RequestContext,
        file_ids: &[Uuid],
        assignee_id: Uuid,
        instruction: Option<&str>,
        due_date: Option<DateTime<Utc>>,
    ) -> AppResult<BatchReport> {
        if !ctx.is_admin() {
            return Err(AppError::forbidden("Only administrators may assign tasks"));
        }
        let assignee = self
            .users
            .find_by_id(assignee_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("User {assignee_id} not found")))?;

        let mut report = BatchReport::default();
        for &id in file_ids {
            let mut record = match self.files.find_by_id(id).await? {
                Some(record) => record,
                None => {
                    report.fail(id, "File not found");
                    continue;
                }
            };

            record.assigned_to_id = Some(assignee.id);
            if let Some(instruction) = instruction {
                record.instruction = Some(instruction.to_string());
            }
            if due_date.is_some() {
                record.due_date = due_date;
            }
            record.status = TaskStatus::Pending;
            record.updated_at = Utc::now();

            match self.files.update(&record).await {
                Ok(updated) => {
                    if assignee.id != ctx.user_id {
                        let notification = Notification::task_assigned(
                            assignee.id,
                            &updated.filename,
                            updated.id,
                            due_date.is_some(),
                        );
                        if let Err(e) = self.notifications.create(&notification).await {
                            warn!(error = %e, "Failed to create assignment notification");
                        }
                    }
                    report.succeeded.push(id);
                }
                Err(e) => report.fail(id, e.message.clone()),
            }
        }

        self.activity
            .record(
                Some(ctx.user_id),
                ActivityAction::BatchAssign,
                format!(
                    "Assigned {} files to {}",
                    report.succeeded.len(),
                    assignee.username
                ),
            )
            .await;
        Ok(report)
    }
}

/// Disambiguate duplicate archive names: `a.pdf`, `a (2).pdf`, ...
fn dedupe_name(filename: &str, used: &mut HashSet<String>) -> String {
    if used.insert(filename.to_string()) {
        return filename.to_string();
    }
    let (stem, ext) = match filename.rfind('.') {
        Some(idx) if idx > 0 => (&filename[..idx], &filename[idx..]),
        _ => (filename, ""),
    };
    let mut counter = 2;
    loop {
        let candidate = format!("{stem} ({counter}){ext}");
        if used.insert(candidate.clone()) {
            return candidate;
        }
        counter += 1;
    }
}

fn render_manifest(included: usize, skipped: &[BatchFailure]) -> String {
    let mut out = format!("Included files: {included}\n");
    if skipped.is_empty() {
        out.push_str("Skipped files: none\n");
    } else {
        out.push_str("Skipped files:\n");
        for failure in skipped {
            out.push_str(&format!("  {}: {}\n", failure.id, failure.reason));
        }
    }
    out
}
