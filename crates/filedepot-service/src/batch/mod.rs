//! Batch operations over sets of file ids.

pub mod service;

pub use service::{ArchiveDownload, BatchFailure, BatchReport, BatchService};
