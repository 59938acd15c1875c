//! Administrative reports.

pub mod dashboard;

pub use dashboard::{DashboardReport, DashboardService, FolderUsage};
