//! File services: upload, download, folder operations, and versioning.

pub mod download;
pub mod service;
pub mod upload;
pub mod version;

pub use download::{DownloadService, FileDownload};
pub use service::{FileService, SyncReport};
pub use upload::{UploadRequest, UploadService};
pub use version::{RestoreOutcome, VersionService};
