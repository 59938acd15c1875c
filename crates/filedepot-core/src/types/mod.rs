//! Shared value types.

pub mod pagination;
pub mod stream;

pub use pagination::{Page, Pagination};
pub use stream::ByteStream;
