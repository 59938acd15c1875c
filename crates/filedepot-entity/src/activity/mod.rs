//! Activity log entities.

pub mod model;

pub use model::{ActivityAction, ActivityEntry};
