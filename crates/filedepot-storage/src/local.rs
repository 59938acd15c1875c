//! Local filesystem storage for current file content.
//!
//! All writes stage to a hidden temp file and land with an atomic rename,
//! so readers never observe partial content and a cancelled write leaves
//! the current content untouched.

use std::path::{Path, PathBuf};

use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::stream::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;
use tracing::debug;
use uuid::Uuid;

use filedepot_core::types::ByteStream;
use filedepot_core::{AppError, AppResult, ErrorKind};

use crate::path;

/// Name of the hidden staging directory inside the storage root. Staged
/// files live on the same filesystem as their final location so the final
/// rename is atomic.
const STAGING_DIR: &str = ".staging";

/// Metadata about one directory entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirEntryMeta {
    /// Entry name.
    pub name: String,
    /// Whether the entry is a directory.
    pub is_dir: bool,
    /// Size in bytes (0 for directories; use [`LocalStorage::dir_size`]).
    pub size_bytes: u64,
    /// Last modification time, if the filesystem reports one.
    pub modified_at: Option<DateTime<Utc>>,
}

/// A file found by [`LocalStorage::walk_files`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalkedFile {
    /// Folder key of the containing directory (`"/"` for the root).
    pub folder: String,
    /// File name.
    pub name: String,
    /// Size in bytes.
    pub size_bytes: u64,
    /// Last modification time.
    pub modified_at: Option<DateTime<Utc>>,
}

/// Content staged for an atomic write. Not yet visible at any final path.
#[derive(Debug)]
pub struct StagedFile {
    /// Absolute path of the staging file.
    path: PathBuf,
    /// Bytes written.
    pub size_bytes: u64,
}

impl StagedFile {
    /// Remove the staging file, ignoring errors (it may already be gone).
    pub async fn discard(self) {
        let _ = fs::remove_file(&self.path).await;
    }
}

/// Local filesystem storage rooted at a canonicalized directory.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    /// Canonicalized root; every resolved path must stay under it.
    root: PathBuf,
}

impl LocalStorage {
    /// Create a storage provider rooted at the given path, creating the
    /// root and staging directory if missing.
    pub async fn new(root_path: &str) -> AppResult<Self> {
        fs::create_dir_all(root_path).await.map_err(|e| {
            AppError::with_source(
                ErrorKind::Storage,
                format!("Failed to create storage root: {root_path}"),
                e,
            )
        })?;
        let root = fs::canonicalize(root_path).await.map_err(|e| {
            AppError::with_source(
                ErrorKind::Storage,
                format!("Failed to canonicalize storage root: {root_path}"),
                e,
            )
        })?;
        fs::create_dir_all(root.join(STAGING_DIR)).await.map_err(|e| {
            AppError::with_source(ErrorKind::Storage, "Failed to create staging directory", e)
        })?;
        Ok(Self { root })
    }

    /// The canonicalized storage root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a user-supplied relative path to an absolute path that is
    /// verified to stay inside the root.
    ///
    /// On top of the lexical gate in [`path::normalize`], the deepest
    /// existing ancestor of the resolved path is canonicalized and checked
    /// to be a descendant of the root, which closes the symlink loophole.
    pub async fn resolve(&self, user_path: &str) -> AppResult<PathBuf> {
        let normalized = path::normalize(user_path)?;
        let full = if normalized.is_empty() {
            self.root.clone()
        } else {
            self.root.join(&normalized)
        };
        self.verify_within_root(&full).await?;
        Ok(full)
    }

    async fn verify_within_root(&self, full: &Path) -> AppResult<()> {
        let mut probe = full.to_path_buf();
        loop {
            match fs::canonicalize(&probe).await {
                Ok(real) => {
                    if real.starts_with(&self.root) {
                        return Ok(());
                    }
                    return Err(AppError::path_traversal(format!(
                        "Resolved path escapes the storage root: {}",
                        full.display()
                    )));
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    match probe.parent() {
                        Some(parent) => probe = parent.to_path_buf(),
                        // Ran out of ancestors without finding anything real.
                        None => {
                            return Err(AppError::path_traversal(format!(
                                "Unresolvable path: {}",
                                full.display()
                            )));
                        }
                    }
                }
                Err(e) => {
                    return Err(AppError::with_source(
                        ErrorKind::Storage,
                        format!("Failed to verify path: {}", full.display()),
                        e,
                    ));
                }
            }
        }
    }

    /// Check whether a file or directory exists at the given path.
    pub async fn exists(&self, user_path: &str) -> AppResult<bool> {
        let full = self.resolve(user_path).await?;
        Ok(fs::metadata(&full).await.is_ok())
    }

    /// Whether the path exists and is a directory.
    pub async fn is_dir(&self, user_path: &str) -> AppResult<bool> {
        let full = self.resolve(user_path).await?;
        Ok(fs::metadata(&full)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false))
    }

    /// Open a file as a byte stream.
    pub async fn read(&self, user_path: &str) -> AppResult<ByteStream> {
        let full = self.resolve(user_path).await?;
        let file = fs::File::open(&full).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                AppError::not_found(format!("File not found: {user_path}"))
            } else {
                AppError::with_source(
                    ErrorKind::Storage,
                    format!("Failed to open file: {user_path}"),
                    e,
                )
            }
        })?;
        let stream = ReaderStream::new(file);
        Ok(Box::pin(stream))
    }

    /// Read a file fully into memory.
    pub async fn read_bytes(&self, user_path: &str) -> AppResult<Bytes> {
        let full = self.resolve(user_path).await?;
        let data = fs::read(&full).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                AppError::not_found(format!("File not found: {user_path}"))
            } else {
                AppError::with_source(
                    ErrorKind::Storage,
                    format!("Failed to read file: {user_path}"),
                    e,
                )
            }
        })?;
        Ok(Bytes::from(data))
    }

    /// Stage a byte stream into the hidden staging area, enforcing
    /// `max_bytes` while streaming. Nothing reaches any final path; on
    /// overflow the staging file is removed before the error returns.
    pub async fn stage_stream(
        &self,
        mut stream: ByteStream,
        max_bytes: u64,
    ) -> AppResult<StagedFile> {
        let staging_path = self
            .root
            .join(STAGING_DIR)
            .join(format!("upload-{}", Uuid::new_v4()));

        let mut file = fs::File::create(&staging_path).await.map_err(|e| {
            AppError::with_source(ErrorKind::Storage, "Failed to create staging file", e)
        })?;

        let mut total: u64 = 0;
        while let Some(chunk) = stream.next().await {
            let chunk = match chunk {
                Ok(c) => c,
                Err(e) => {
                    drop(file);
                    let _ = fs::remove_file(&staging_path).await;
                    return Err(AppError::with_source(
                        ErrorKind::Storage,
                        "Upload stream failed",
                        e,
                    ));
                }
            };
            total += chunk.len() as u64;
            if total > max_bytes {
                drop(file);
                let _ = fs::remove_file(&staging_path).await;
                return Err(AppError::payload_too_large(format!(
                    "Upload exceeds the maximum size of {max_bytes} bytes"
                )));
            }
            if let Err(e) = file.write_all(&chunk).await {
                drop(file);
                let _ = fs::remove_file(&staging_path).await;
                return Err(AppError::with_source(
                    ErrorKind::Storage,
                    "Failed to write staged chunk",
                    e,
                ));
            }
        }

        if let Err(e) = file.sync_all().await {
            drop(file);
            let _ = fs::remove_file(&staging_path).await;
            return Err(AppError::with_source(
                ErrorKind::Storage,
                "Failed to sync staged file",
                e,
            ));
        }

        Ok(StagedFile {
            path: staging_path,
            size_bytes: total,
        })
    }

    /// Stage a copy of an existing file (used by version restore).
    pub async fn stage_copy(&self, src: &Path) -> AppResult<StagedFile> {
        let staging_path = self
            .root
            .join(STAGING_DIR)
            .join(format!("restore-{}", Uuid::new_v4()));
        let size = fs::copy(src, &staging_path).await.map_err(|e| {
            AppError::with_source(
                ErrorKind::Storage,
                format!("Failed to stage copy of {}", src.display()),
                e,
            )
        })?;
        Ok(StagedFile {
            path: staging_path,
            size_bytes: size,
        })
    }

    /// Atomically move staged content to its final path, creating parent
    /// directories as needed.
    pub async fn promote(&self, staged: StagedFile, user_path: &str) -> AppResult<u64> {
        let full = self.resolve(user_path).await?;
        self.ensure_parent(&full).await?;
        if let Err(e) = fs::rename(&staged.path, &full).await {
            let _ = fs::remove_file(&staged.path).await;
            return Err(AppError::with_source(
                ErrorKind::Storage,
                format!("Failed to finalize write: {user_path}"),
                e,
            ));
        }
        debug!(path = user_path, bytes = staged.size_bytes, "Wrote file");
        Ok(staged.size_bytes)
    }

    /// Stage and promote in one call.
    ///
    /// With `overwrite` unset, an existing target fails with
    /// `AlreadyExists` before any byte is read from the stream.
    pub async fn write_stream(
        &self,
        user_path: &str,
        stream: ByteStream,
        max_bytes: u64,
        overwrite: bool,
    ) -> AppResult<u64> {
        if !overwrite && self.exists(user_path).await? {
            return Err(AppError::already_exists(format!(
                "File already exists: {user_path}"
            )));
        }
        let staged = self.stage_stream(stream, max_bytes).await?;
        self.promote(staged, user_path).await
    }

    /// Delete a file. `NotFound` when absent; the caller decides whether
    /// that is fatal.
    pub async fn delete(&self, user_path: &str) -> AppResult<()> {
        let full = self.resolve(user_path).await?;
        fs::remove_file(&full).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                AppError::not_found(format!("File not found: {user_path}"))
            } else {
                AppError::with_source(
                    ErrorKind::Storage,
                    format!("Failed to delete file: {user_path}"),
                    e,
                )
            }
        })?;
        debug!(path = user_path, "Deleted file");
        Ok(())
    }

    /// Create a directory (and any missing parents). Fails with
    /// `AlreadyExists` when the path is already present.
    pub async fn create_dir(&self, user_path: &str) -> AppResult<()> {
        let full = self.resolve(user_path).await?;
        if fs::metadata(&full).await.is_ok() {
            return Err(AppError::already_exists(format!(
                "Directory already exists: {user_path}"
            )));
        }
        fs::create_dir_all(&full).await.map_err(|e| {
            AppError::with_source(
                ErrorKind::Storage,
                format!("Failed to create directory: {user_path}"),
                e,
            )
        })?;
        Ok(())
    }

    /// Delete a directory. Without `recursive`, a non-empty directory fails
    /// with `NotEmpty`; with it, the whole subtree goes.
    pub async fn delete_dir(&self, user_path: &str, recursive: bool) -> AppResult<()> {
        let full = self.resolve(user_path).await?;
        let meta = fs::metadata(&full).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                AppError::not_found(format!("Directory not found: {user_path}"))
            } else {
                AppError::with_source(
                    ErrorKind::Storage,
                    format!("Failed to stat directory: {user_path}"),
                    e,
                )
            }
        })?;
        if !meta.is_dir() {
            return Err(AppError::validation(format!(
                "Not a directory: {user_path}"
            )));
        }

        if recursive {
            fs::remove_dir_all(&full).await.map_err(|e| {
                AppError::with_source(
                    ErrorKind::Storage,
                    format!("Failed to delete directory: {user_path}"),
                    e,
                )
            })?;
        } else {
            if !self.list(user_path).await?.is_empty() {
                return Err(AppError::not_empty(format!(
                    "Directory is not empty: {user_path}"
                )));
            }
            fs::remove_dir(&full).await.map_err(|e| {
                AppError::with_source(
                    ErrorKind::Storage,
                    format!("Failed to delete directory: {user_path}"),
                    e,
                )
            })?;
        }
        debug!(path = user_path, recursive, "Deleted directory");
        Ok(())
    }

    /// List the contents of a directory: directories first, then files,
    /// each group name-sorted. Hidden entries (leading `.`) are skipped.
    pub async fn list(&self, user_path: &str) -> AppResult<Vec<DirEntryMeta>> {
        let full = self.resolve(user_path).await?;
        let mut dir = fs::read_dir(&full).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                AppError::not_found(format!("Directory not found: {user_path}"))
            } else {
                AppError::with_source(
                    ErrorKind::Storage,
                    format!("Failed to list directory: {user_path}"),
                    e,
                )
            }
        })?;

        let mut entries = Vec::new();
        while let Some(entry) = dir.next_entry().await.map_err(|e| {
            AppError::with_source(ErrorKind::Storage, "Failed to read directory entry", e)
        })? {
            let name = entry.file_name().to_string_lossy().to_string();
            if name.starts_with('.') {
                continue;
            }
            let meta = entry.metadata().await.map_err(|e| {
                AppError::with_source(ErrorKind::Storage, "Failed to get entry metadata", e)
            })?;
            entries.push(DirEntryMeta {
                name,
                is_dir: meta.is_dir(),
                size_bytes: if meta.is_dir() { 0 } else { meta.len() },
                modified_at: meta.modified().ok().map(DateTime::<Utc>::from),
            });
        }

        entries.sort_by(|a, b| b.is_dir.cmp(&a.is_dir).then(a.name.cmp(&b.name)));
        Ok(entries)
    }

    /// Atomically move a file within the root.
    pub async fn rename(&self, from: &str, to: &str) -> AppResult<()> {
        let from_full = self.resolve(from).await?;
        let to_full = self.resolve(to).await?;
        self.ensure_parent(&to_full).await?;
        fs::rename(&from_full, &to_full).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                AppError::not_found(format!("File not found: {from}"))
            } else {
                AppError::with_source(
                    ErrorKind::Storage,
                    format!("Failed to move {from} -> {to}"),
                    e,
                )
            }
        })?;
        Ok(())
    }

    /// Recursive byte size of a directory. Symlinks are skipped.
    pub async fn dir_size(&self, user_path: &str) -> AppResult<u64> {
        let full = self.resolve(user_path).await?;
        let mut total = 0u64;
        let mut stack = vec![full];
        while let Some(dir) = stack.pop() {
            let mut rd = match fs::read_dir(&dir).await {
                Ok(rd) => rd,
                Err(_) => continue,
            };
            while let Ok(Some(entry)) = rd.next_entry().await {
                if entry.file_name().to_string_lossy().starts_with('.') {
                    continue;
                }
                let Ok(meta) = entry.metadata().await else {
                    continue;
                };
                if meta.is_symlink() {
                    continue;
                }
                if meta.is_dir() {
                    stack.push(entry.path());
                } else {
                    total += meta.len();
                }
            }
        }
        Ok(total)
    }

    /// Recursively list every regular file under a directory, as (folder
    /// key, name) pairs relative to the storage root.
    pub async fn walk_files(&self, user_path: &str) -> AppResult<Vec<WalkedFile>> {
        let start = path::normalize(user_path)?;
        let mut found = Vec::new();
        let mut stack = vec![start];
        while let Some(rel_dir) = stack.pop() {
            for entry in self.list(&rel_dir).await? {
                let child_rel = if rel_dir.is_empty() {
                    entry.name.clone()
                } else {
                    format!("{rel_dir}/{}", entry.name)
                };
                if entry.is_dir {
                    stack.push(child_rel);
                } else {
                    found.push(WalkedFile {
                        folder: path::folder_key(&rel_dir),
                        name: entry.name,
                        size_bytes: entry.size_bytes,
                        modified_at: entry.modified_at,
                    });
                }
            }
        }
        Ok(found)
    }

    async fn ensure_parent(&self, full: &Path) -> AppResult<()> {
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                AppError::with_source(
                    ErrorKind::Storage,
                    format!("Failed to create parent directory: {}", parent.display()),
                    e,
                )
            })?;
        }
        Ok(())
    }
}

/// Turn an in-memory buffer into a [`ByteStream`]. Convenience for callers
/// and tests that already hold the full content.
pub fn bytes_stream(data: Bytes) -> ByteStream {
    Box::pin(futures::stream::once(async move {
        Ok::<_, std::io::Error>(data)
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use filedepot_core::ErrorKind;

    async fn storage() -> (tempfile::TempDir, LocalStorage) {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path().to_str().unwrap()).await.unwrap();
        (dir, storage)
    }

    #[tokio::test]
    async fn test_write_read_round_trip() {
        let (_dir, storage) = storage().await;
        let data = Bytes::from_static(b"quarterly report body");
        storage
            .write_stream("Operation/report.pdf", bytes_stream(data.clone()), 1024, false)
            .await
            .unwrap();

        let read_back = storage.read_bytes("Operation/report.pdf").await.unwrap();
        assert_eq!(read_back, data);
    }

    #[tokio::test]
    async fn test_existing_target_requires_overwrite() {
        let (_dir, storage) = storage().await;
        storage
            .write_stream("a.pdf", bytes_stream(Bytes::from_static(b"one")), 64, false)
            .await
            .unwrap();

        let err = storage
            .write_stream("a.pdf", bytes_stream(Bytes::from_static(b"two")), 64, false)
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::AlreadyExists);

        storage
            .write_stream("a.pdf", bytes_stream(Bytes::from_static(b"two")), 64, true)
            .await
            .unwrap();
        assert_eq!(storage.read_bytes("a.pdf").await.unwrap(), Bytes::from_static(b"two"));
    }

    #[tokio::test]
    async fn test_oversize_stream_persists_nothing() {
        let (_dir, storage) = storage().await;
        let err = storage
            .write_stream(
                "big.pdf",
                bytes_stream(Bytes::from(vec![0u8; 100])),
                10,
                false,
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::PayloadTooLarge);
        assert!(!storage.exists("big.pdf").await.unwrap());
        // The staging area holds no leftovers either.
        let staged = std::fs::read_dir(storage.root().join(STAGING_DIR))
            .unwrap()
            .count();
        assert_eq!(staged, 0);
    }

    #[tokio::test]
    async fn test_resolve_rejects_traversal() {
        let (_dir, storage) = storage().await;
        let err = storage
            .resolve("/Operation/../../etc/passwd")
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::PathTraversal);

        let ok = storage.resolve("/Operation/report.pdf").await.unwrap();
        assert!(ok.starts_with(storage.root()));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_resolve_rejects_symlink_escape() {
        let (_dir, storage) = storage().await;
        let outside = tempfile::tempdir().unwrap();
        std::os::unix::fs::symlink(outside.path(), storage.root().join("vault")).unwrap();

        let err = storage.resolve("vault/secrets.pdf").await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::PathTraversal);
    }

    #[tokio::test]
    async fn test_delete_dir_refuses_non_empty() {
        let (_dir, storage) = storage().await;
        storage.create_dir("Ops").await.unwrap();
        storage
            .write_stream("Ops/a.pdf", bytes_stream(Bytes::from_static(b"x")), 64, false)
            .await
            .unwrap();

        let err = storage.delete_dir("Ops", false).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotEmpty);

        storage.delete_dir("Ops", true).await.unwrap();
        assert!(!storage.exists("Ops").await.unwrap());
    }

    #[tokio::test]
    async fn test_list_orders_dirs_first_and_skips_hidden() {
        let (_dir, storage) = storage().await;
        storage.create_dir("Zeta").await.unwrap();
        storage
            .write_stream("alpha.pdf", bytes_stream(Bytes::from_static(b"x")), 64, false)
            .await
            .unwrap();

        let entries = storage.list("").await.unwrap();
        let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["Zeta", "alpha.pdf"]);
    }

    #[tokio::test]
    async fn test_walk_files() {
        let (_dir, storage) = storage().await;
        storage
            .write_stream("a.pdf", bytes_stream(Bytes::from_static(b"1")), 64, false)
            .await
            .unwrap();
        storage
            .write_stream("Ops/Sub/b.pdf", bytes_stream(Bytes::from_static(b"22")), 64, false)
            .await
            .unwrap();

        let mut walked = storage.walk_files("").await.unwrap();
        walked.sort_by(|a, b| a.name.cmp(&b.name));
        assert_eq!(walked.len(), 2);
        assert_eq!(walked[0].folder, "/");
        assert_eq!(walked[1].folder, "Ops/Sub");
        assert_eq!(walked[1].size_bytes, 2);
    }
}
