//! Notification lifecycle.

pub mod service;

pub use service::NotificationService;
