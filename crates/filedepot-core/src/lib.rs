//! # filedepot-core
//!
//! Core building blocks shared by every FileDepot crate: the unified
//! [`error::AppError`] type, the [`result::AppResult`] alias, layered
//! configuration, and common value types (pagination, byte streams).

pub mod config;
pub mod error;
pub mod result;
pub mod types;

pub use error::{AppError, ErrorKind};
pub use result::AppResult;
