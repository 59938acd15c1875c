//! Incremental zip archive building.
//!
//! Archives spool to a temporary file on a blocking thread, one entry's
//! bytes in flight at a time rather than the whole batch in memory, and stream
//! back from disk. The spool file is deleted when the stream is dropped,
//! so an interrupted download cleans up after itself.

use std::io::{Seek, Write};
use std::path::PathBuf;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures::Stream;
use tempfile::NamedTempFile;
use tokio_util::io::ReaderStream;
use tracing::debug;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use filedepot_core::{AppError, AppResult, ErrorKind};

/// Name of the trailing manifest entry listing skipped files.
pub const MANIFEST_NAME: &str = "MANIFEST.txt";

/// One file to include in an archive.
#[derive(Debug, Clone)]
pub struct ArchiveEntry {
    /// Name inside the archive (may contain `/` separators).
    pub name: String,
    /// Absolute path of the source file.
    pub path: PathBuf,
}

/// A built archive, ready to stream exactly once.
#[derive(Debug)]
pub struct Archive {
    /// Total archive size in bytes.
    pub size_bytes: u64,
    spool: NamedTempFile,
}

impl Archive {
    /// Consume the archive and stream its bytes. The spool file is removed
    /// when the returned stream is dropped, completed or not.
    pub fn into_stream(self) -> AppResult<ArchiveStream> {
        let reader = self.spool.reopen().map_err(|e| {
            AppError::with_source(ErrorKind::Storage, "Failed to reopen archive spool", e)
        })?;
        Ok(ArchiveStream {
            _spool: self.spool,
            inner: ReaderStream::new(tokio::fs::File::from_std(reader)),
        })
    }
}

/// Byte stream over a spooled archive. Owns the spool so dropping the
/// stream deletes the temporary file.
pub struct ArchiveStream {
    _spool: NamedTempFile,
    inner: ReaderStream<tokio::fs::File>,
}

impl Stream for ArchiveStream {
    type Item = Result<Bytes, std::io::Error>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

/// Build a deflate-compressed zip from the given entries, appending an
/// optional manifest as the final entry.
///
/// Entries are written one at a time with `std::io::copy`, so memory use is
/// bounded by the copy buffer regardless of batch size.
pub async fn build_zip(entries: Vec<ArchiveEntry>, manifest: Option<String>) -> AppResult<Archive> {
    tokio::task::spawn_blocking(move || build_zip_blocking(entries, manifest))
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Internal, "Archive task panicked", e))?
}

fn build_zip_blocking(entries: Vec<ArchiveEntry>, manifest: Option<String>) -> AppResult<Archive> {
    let spool = NamedTempFile::new().map_err(|e| {
        AppError::with_source(ErrorKind::Storage, "Failed to create archive spool", e)
    })?;
    let writer_file = spool.reopen().map_err(|e| {
        AppError::with_source(ErrorKind::Storage, "Failed to open archive spool", e)
    })?;

    let mut writer = ZipWriter::new(writer_file);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    let entry_count = entries.len();
    for entry in entries {
        writer.start_file(entry.name.clone(), options).map_err(|e| {
            AppError::with_source(
                ErrorKind::Storage,
                format!("Failed to start archive entry: {}", entry.name),
                e,
            )
        })?;
        let mut src = std::fs::File::open(&entry.path).map_err(|e| {
            AppError::with_source(
                ErrorKind::Storage,
                format!("Failed to open {} for archiving", entry.path.display()),
                e,
            )
        })?;
        copy_entry(&mut src, &mut writer, &entry.name)?;
    }

    if let Some(manifest) = manifest {
        writer.start_file(MANIFEST_NAME, options).map_err(|e| {
            AppError::with_source(ErrorKind::Storage, "Failed to start manifest entry", e)
        })?;
        writer.write_all(manifest.as_bytes()).map_err(|e| {
            AppError::with_source(ErrorKind::Storage, "Failed to write manifest", e)
        })?;
    }

    let mut finished = writer.finish().map_err(|e| {
        AppError::with_source(ErrorKind::Storage, "Failed to finalize archive", e)
    })?;
    finished.flush().map_err(|e| {
        AppError::with_source(ErrorKind::Storage, "Failed to flush archive", e)
    })?;
    let size_bytes = finished
        .metadata()
        .map_err(|e| AppError::with_source(ErrorKind::Storage, "Failed to stat archive", e))?
        .len();

    debug!(entries = entry_count, bytes = size_bytes, "Built zip archive");
    Ok(Archive { size_bytes, spool })
}

fn copy_entry<W: Write + Seek>(
    src: &mut std::fs::File,
    writer: &mut ZipWriter<W>,
    name: &str,
) -> AppResult<()> {
    std::io::copy(src, writer).map_err(|e| {
        AppError::with_source(
            ErrorKind::Storage,
            format!("Failed to archive entry: {name}"),
            e,
        )
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use std::io::Read;

    async fn collect(mut stream: ArchiveStream) -> Vec<u8> {
        let mut out = Vec::new();
        while let Some(chunk) = stream.next().await {
            out.extend_from_slice(&chunk.unwrap());
        }
        out
    }

    #[tokio::test]
    async fn test_build_and_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.pdf");
        let b = dir.path().join("b.pdf");
        std::fs::write(&a, b"alpha content").unwrap();
        std::fs::write(&b, b"beta content").unwrap();

        let archive = build_zip(
            vec![
                ArchiveEntry { name: "a.pdf".to_string(), path: a },
                ArchiveEntry { name: "sub/b.pdf".to_string(), path: b },
            ],
            Some("skipped: none\n".to_string()),
        )
        .await
        .unwrap();

        assert!(archive.size_bytes > 0);
        let bytes = collect(archive.into_stream().unwrap()).await;

        let mut zip = zip::ZipArchive::new(std::io::Cursor::new(bytes)).unwrap();
        assert_eq!(zip.len(), 3);
        let mut content = String::new();
        zip.by_name("a.pdf").unwrap().read_to_string(&mut content).unwrap();
        assert_eq!(content, "alpha content");
        content.clear();
        zip.by_name(MANIFEST_NAME)
            .unwrap()
            .read_to_string(&mut content)
            .unwrap();
        assert_eq!(content, "skipped: none\n");
    }

    #[tokio::test]
    async fn test_missing_source_fails() {
        let err = build_zip(
            vec![ArchiveEntry {
                name: "gone.pdf".to_string(),
                path: PathBuf::from("/nonexistent/gone.pdf"),
            }],
            None,
        )
        .await
        .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Storage);
    }
}
