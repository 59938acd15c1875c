//! User accounts and preferences.

pub mod service;

pub use service::{RegisterRequest, UserService};
