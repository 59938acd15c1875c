//! File download.

use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use filedepot_core::types::ByteStream;
use filedepot_core::{AppError, AppResult};
use filedepot_database::repositories::FileRepository;
use filedepot_entity::activity::ActivityAction;
use filedepot_storage::LocalStorage;

use crate::activity::ActivityLogger;
use crate::context::RequestContext;

/// A download ready to stream, with the name the client should present.
pub struct FileDownload {
    /// The user-visible filename.
    pub filename: String,
    /// Content length in bytes.
    pub size_bytes: i64,
    /// The raw content stream.
    pub stream: ByteStream,
}

impl std::fmt::Debug for FileDownload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileDownload")
            .field("filename", &self.filename)
            .field("size_bytes", &self.size_bytes)
            .finish()
    }
}

/// Streams current file content to authorized readers.
#[derive(Debug, Clone)]
pub struct DownloadService {
    files: Arc<FileRepository>,
    storage: Arc<LocalStorage>,
    activity: ActivityLogger,
}

impl DownloadService {
    /// Creates a new download service.
    pub fn new(
        files: Arc<FileRepository>,
        storage: Arc<LocalStorage>,
        activity: ActivityLogger,
    ) -> Self {
        Self {
            files,
            storage,
            activity,
        }
    }

    /// Download a file by record id. Readable by admins, the owner, and
    /// the current assignee.
    pub async fn download(&self, ctx: &RequestContext, file_id: Uuid) -> AppResult<FileDownload> {
        let record = self
            .files
            .find_by_id(file_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("File {file_id} not found")))?;

        if !ctx.can_read(&record) {
            return Err(AppError::forbidden("Not authorized to download this file"));
        }

        let rel = record.relative_path();
        let stream = self.storage.read(&rel).await?;

        self.activity
            .record(
                Some(ctx.user_id),
                ActivityAction::Download,
                format!("Downloaded {} from {}", record.filename, record.folder),
            )
            .await;

        info!(file_id = %record.id, path = rel, "Serving download");
        Ok(FileDownload {
            filename: record.filename,
            size_bytes: record.size_bytes,
            stream,
        })
    }
}
