use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Per-key mutual exclusion. Requests on different keys never wait on each other.
///
/// Lock objects are created on first use and kept for the lifetime of the registry, so
/// it holds at most one small entry per distinct key ever seen.
#[derive(Default)]
pub struct LockRegistry {
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

/// Held while a key is locked. Dropping it releases the key.
pub struct KeyGuard {
    key: String,
    _guard: OwnedMutexGuard<()>,
}

impl LockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait until `key` is free and lock it.
    pub async fn acquire(&self, key: &str) -> KeyGuard {
        // Get-or-insert happens under the map lock; the map lock is never held across an await
        let lock = {
            let mut locks = self.locks.lock();
            let lock = locks.entry(key.to_string()).or_default();
            Arc::clone(lock)
        };

        let guard = lock.lock_owned().await;
        log::trace!("Acquired lock for {}", key);

        KeyGuard {
            key: key.to_string(),
            _guard: guard,
        }
    }

    /// Number of distinct keys that have been locked so far.
    pub fn len(&self) -> usize {
        self.locks.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl KeyGuard {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn release(self) {}
}

impl Drop for KeyGuard {
    fn drop(&mut self) {
        log::trace!("Released lock for {}", self.key);
    }
}
