//! Pagination types for list operations.
//!
//! Listings paginate with a plain skip/limit window; result ordering always
//! carries a stable secondary sort key so that paging stays deterministic
//! when primary keys tie.

use serde::{Deserialize, Serialize};

/// Default number of items per page.
const DEFAULT_LIMIT: u64 = 50;
/// Maximum number of items per page.
const MAX_LIMIT: u64 = 100;

/// Skip/limit window for paginated queries.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Pagination {
    /// Number of items to skip.
    #[serde(default)]
    pub skip: u64,
    /// Maximum number of items to return.
    #[serde(default = "default_limit")]
    pub limit: u64,
}

impl Pagination {
    /// Create a new window, clamping the limit into `1..=MAX_LIMIT`.
    pub fn new(skip: u64, limit: u64) -> Self {
        Self {
            skip,
            limit: limit.clamp(1, MAX_LIMIT),
        }
    }

    /// The SQL `LIMIT` value.
    pub fn limit(&self) -> i64 {
        self.limit.min(MAX_LIMIT).max(1) as i64
    }

    /// The SQL `OFFSET` value.
    pub fn offset(&self) -> i64 {
        self.skip.min(i64::MAX as u64) as i64
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            skip: 0,
            limit: DEFAULT_LIMIT,
        }
    }
}

/// One page of results together with the total match count.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    /// The items in this window.
    pub items: Vec<T>,
    /// Total number of matching items across all pages.
    pub total_items: u64,
    /// The skip that produced this page.
    pub skip: u64,
    /// The limit that produced this page.
    pub limit: u64,
}

impl<T> Page<T> {
    /// Create a new page.
    pub fn new(items: Vec<T>, total_items: u64, window: Pagination) -> Self {
        Self {
            items,
            total_items,
            skip: window.skip,
            limit: window.limit,
        }
    }

    /// Whether more items exist past this window.
    pub fn has_more(&self) -> bool {
        self.skip + (self.items.len() as u64) < self.total_items
    }
}

fn default_limit() -> u64 {
    DEFAULT_LIMIT
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limit_is_clamped() {
        assert_eq!(Pagination::new(0, 0).limit, 1);
        assert_eq!(Pagination::new(0, 10_000).limit, MAX_LIMIT);
        assert_eq!(Pagination::new(30, 25).offset(), 30);
    }

    #[test]
    fn test_has_more() {
        let window = Pagination::new(0, 2);
        let page = Page::new(vec![1, 2], 5, window);
        assert!(page.has_more());

        let window = Pagination::new(4, 2);
        let page = Page::new(vec![5], 5, window);
        assert!(!page.has_more());
    }
}
