//! Version blob area.
//!
//! Prior file contents live under a sibling root keyed by file id and
//! version number (`<versions_root>/<file_id>/<n>`), never addressable via
//! folder paths, so version history cannot collide with user content.

use std::path::{Path, PathBuf};

use tokio::fs;
use tokio::io::AsyncReadExt;
use tracing::debug;
use uuid::Uuid;

use filedepot_core::{AppError, AppResult, ErrorKind};

/// Storage for immutable version blobs.
#[derive(Debug, Clone)]
pub struct VersionArea {
    root: PathBuf,
}

impl VersionArea {
    /// Create the version area rooted at the given path.
    pub async fn new(root_path: &str) -> AppResult<Self> {
        fs::create_dir_all(root_path).await.map_err(|e| {
            AppError::with_source(
                ErrorKind::Storage,
                format!("Failed to create version area: {root_path}"),
                e,
            )
        })?;
        let root = fs::canonicalize(root_path).await.map_err(|e| {
            AppError::with_source(
                ErrorKind::Storage,
                format!("Failed to canonicalize version area: {root_path}"),
                e,
            )
        })?;
        Ok(Self { root })
    }

    /// The relative storage path recorded on a version row.
    pub fn blob_rel(file_id: Uuid, version_number: i64) -> String {
        format!("{file_id}/{version_number}")
    }

    /// Absolute path of a version blob.
    pub fn abs(&self, blob_rel: &str) -> PathBuf {
        self.root.join(blob_rel)
    }

    /// Whether a blob exists.
    pub async fn exists(&self, blob_rel: &str) -> bool {
        fs::metadata(self.abs(blob_rel)).await.is_ok()
    }

    /// Copy current content into the blob slot for `(file_id, n)`.
    /// Returns the snapshot size.
    pub async fn snapshot(
        &self,
        src: &Path,
        file_id: Uuid,
        version_number: i64,
    ) -> AppResult<u64> {
        let rel = Self::blob_rel(file_id, version_number);
        let dst = self.abs(&rel);
        if let Some(parent) = dst.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                AppError::with_source(ErrorKind::Storage, "Failed to create version folder", e)
            })?;
        }
        let size = fs::copy(src, &dst).await.map_err(|e| {
            AppError::with_source(
                ErrorKind::Storage,
                format!("Failed to snapshot version {version_number} of {file_id}"),
                e,
            )
        })?;
        debug!(%file_id, version_number, bytes = size, "Snapshotted version");
        Ok(size)
    }

    /// Remove a single blob (compensation path for failed overwrites).
    pub async fn remove_blob(&self, blob_rel: &str) {
        let _ = fs::remove_file(self.abs(blob_rel)).await;
    }

    /// Remove the whole version history of a file.
    pub async fn remove_history(&self, file_id: Uuid) -> AppResult<()> {
        let dir = self.root.join(file_id.to_string());
        match fs::remove_dir_all(&dir).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AppError::with_source(
                ErrorKind::Storage,
                format!("Failed to remove version history of {file_id}"),
                e,
            )),
        }
    }
}

/// Compare two files byte-for-byte. Sizes are checked first so the common
/// mismatch never reads content.
pub async fn contents_equal(a: &Path, b: &Path) -> AppResult<bool> {
    let (meta_a, meta_b) = (fs::metadata(a).await, fs::metadata(b).await);
    let (meta_a, meta_b) = match (meta_a, meta_b) {
        (Ok(a), Ok(b)) => (a, b),
        _ => return Ok(false),
    };
    if meta_a.len() != meta_b.len() {
        return Ok(false);
    }

    let mut fa = fs::File::open(a).await?;
    let mut fb = fs::File::open(b).await?;
    let mut buf_a = vec![0u8; 64 * 1024];
    let mut buf_b = vec![0u8; 64 * 1024];
    loop {
        let n_a = fa.read(&mut buf_a).await?;
        if n_a == 0 {
            return Ok(true);
        }
        // Both files have the same length, so b must yield as many bytes.
        let mut filled = 0;
        while filled < n_a {
            let n_b = fb.read(&mut buf_b[filled..n_a]).await?;
            if n_b == 0 {
                return Ok(false);
            }
            filled += n_b;
        }
        if buf_a[..n_a] != buf_b[..n_a] {
            return Ok(false);
        }
    }
}
