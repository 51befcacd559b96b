//! Per-key async mutual exclusion
//!
//! Serializes work on the same key (a base environment, a merge request)
//! while letting unrelated keys proceed concurrently.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::OwnedMutexGuard;

/// Map of key to async lock; entries are dropped once no one holds or awaits them
#[derive(Debug, Default)]
pub struct KeyedLock {
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl KeyedLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for exclusive access to `key`
    pub async fn lock(&self, key: &str) -> KeyedGuard<'_> {
        let entry = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(locks.entry(key.to_string()).or_default())
        };

        let guard = entry.lock_owned().await;

        KeyedGuard {
            owner: self,
            key: key.to_string(),
            guard: Some(guard),
        }
    }

    /// Number of keys currently held or awaited
    pub fn active_keys(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// Exclusive access to one key, released on drop
#[derive(Debug)]
pub struct KeyedGuard<'a> {
    owner: &'a KeyedLock,
    key: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for KeyedGuard<'_> {
    fn drop(&mut self) {
        // Release first so our own guard no longer counts as a holder.
        drop(self.guard.take());

        let mut locks = self
            .owner
            .locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let idle = locks
            .get(&self.key)
            .map(|entry| Arc::strong_count(entry) == 1)
            .unwrap_or(false);
        if idle {
            locks.remove(&self.key);
        }
    }
}
