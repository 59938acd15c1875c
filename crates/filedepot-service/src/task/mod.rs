//! Task assignment and status tracking.

pub mod service;

pub use service::{AssignRequest, TaskMetrics, TaskService};
