//! Per-key mutual exclusion for sync units
//!
//! Keys are normalized source paths for file units and `module:<slug>` for
//! module units. Two units holding different keys never block each other.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::types::SourcePath;

#[derive(Default)]
pub struct PathLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl PathLocks {
    pub fn new() -> Self {
        Self::default()
    }

    async fn acquire(&self, key: String) -> OwnedMutexGuard<()> {
        // Clone out of the map so no shard lock is held across the await
        let lock = self.locks.entry(key).or_default().clone();
        lock.lock_owned().await
    }

    pub async fn lock_path(&self, path: &SourcePath) -> OwnedMutexGuard<()> {
        self.acquire(path.as_str().to_string()).await
    }

    pub async fn lock_module(&self, slug: &str) -> OwnedMutexGuard<()> {
        self.acquire(format!("module:{}", slug)).await
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}
