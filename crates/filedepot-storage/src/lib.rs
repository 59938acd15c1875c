//! # filedepot-storage
//!
//! Everything that touches the filesystem: the path sanitizer, the local
//! storage provider for current file content, the version blob area, the
//! per-path lock registry, and the zip archive builder.
//!
//! No other crate is allowed to concatenate user input into filesystem
//! paths; every physical access routes through [`path::normalize`] and
//! [`local::LocalStorage::resolve`].

pub mod archive;
pub mod local;
pub mod locks;
pub mod path;
pub mod versions;

pub use local::{DirEntryMeta, LocalStorage, StagedFile};
pub use locks::PathLocks;
pub use versions::VersionArea;
