//! Per-path mutual exclusion.
//!
//! Every mutation of one `(folder, filename)` (overwrite, restore, delete,
//! move) serializes on that path's lock, so version numbering stays dense
//! and two concurrent writers never interleave their snapshot/rename steps.
//! The second writer waits rather than failing.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Registry of per-path async locks, keyed by normalized relative path.
#[derive(Debug, Clone, Default)]
pub struct PathLocks {
    inner: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl PathLocks {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the lock for a path, waiting if another operation holds it.
    pub async fn lock(&self, key: &str) -> OwnedMutexGuard<()> {
        let mutex = {
            let entry = self
                .inner
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())));
            Arc::clone(entry.value())
        };
        mutex.lock_owned().await
    }
}
