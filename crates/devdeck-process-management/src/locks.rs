//! Per-project async locks serializing `start` and `stop` of the same key.

use dashmap::DashMap;
use devdeck_common::ProjectKey;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Debug, Clone, Default)]
pub struct KeyLocks {
    locks: Arc<DashMap<ProjectKey, Arc<Mutex<()>>>>,
}

impl KeyLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the lock for `key`; held until the guard is dropped.
    pub async fn lock(&self, key: &ProjectKey) -> KeyGuard {
        // The map shard guard is released before awaiting
        let mutex = self.locks.entry(key.clone()).or_default().value().clone();
        let guard = mutex.lock_owned().await;
        KeyGuard {
            guard: Some(guard),
            key: key.clone(),
            locks: Arc::clone(&self.locks),
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.locks.len()
    }
}

/// Held lock of one key. The map entry is dropped with the last user.
pub struct KeyGuard {
    guard: Option<OwnedMutexGuard<()>>,
    key: ProjectKey,
    locks: Arc<DashMap<ProjectKey, Arc<Mutex<()>>>>,
}

impl Drop for KeyGuard {
    fn drop(&mut self) {
        drop(self.guard.take());
        // Waiters hold their own clone, so only an unused mutex is removed
        self.locks.remove_if(&self.key, |_, mutex| Arc::strong_count(mutex) == 1);
    }
}
