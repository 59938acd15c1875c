//! File entities: the tracked record, task status, version history, search
//! filters, and folder-listing value objects.

pub mod filter;
pub mod listing;
pub mod model;
pub mod status;
pub mod version;

pub use filter::FileSearchFilter;
pub use listing::{EntryOrigin, FolderEntry};
pub use model::{CreateFileRecord, FileRecord};
pub use status::TaskStatus;
pub use version::FileVersion;
