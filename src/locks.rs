//! Named async locks
//!
//! Provides mutex-style exclusive sections keyed by an arbitrary string.
//!
//! # Overview
//!
//! The key mutex hands out one logical lock per distinct key:
//! - `acquire` for a held key suspends until the holder releases
//! - `acquire` for a different key never waits on another key's holder
//! - Release happens when the returned [`KeyGuard`] is dropped, so every exit
//!   path of a critical section (including `?` and panics) releases the lock
//!
//! Callers never hold two keys at once, so there is no lock ordering to get
//! wrong.
//!
//! # Example
//!
//! ```no_run
//! use chatterbox::locks::KeyMutex;
//!
//! # async fn example() {
//! let mutex = KeyMutex::new();
//!
//! let guard = mutex.acquire("QmPeer").await;
//! // read-modify-write the peer's history
//! drop(guard);
//! # }
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type LockTable = HashMap<String, Arc<AsyncMutex<()>>>;

/// Manager for named exclusive sections
///
/// Cheap to clone; clones share the same lock table.
#[derive(Debug, Clone, Default)]
pub struct KeyMutex {
    locks: Arc<Mutex<LockTable>>,
}

/// Proof of holding the lock for one key
///
/// The lock is released when this guard is dropped.
#[derive(Debug)]
pub struct KeyGuard {
    key: String,
    locks: Arc<Mutex<LockTable>>,
    lock: Option<OwnedMutexGuard<()>>,
}

impl KeyMutex {
    /// Create a new key mutex
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the lock for `key`, waiting for the current holder if any
    ///
    /// Dropping the returned future before it resolves gives up the wait and
    /// evicts the table entry if nobody else is using it.
    pub async fn acquire(&self, key: impl Into<String>) -> KeyGuard {
        let key = key.into();
        let mut waiting = Waiting {
            key: &key,
            locks: &self.locks,
            acquired: false,
        };
        let lock = self.entry(&key).lock_owned().await;
        waiting.acquired = true;
        drop(waiting);
        KeyGuard {
            key,
            locks: self.locks.clone(),
            lock: Some(lock),
        }
    }

    /// Acquire the lock for `key` only if nobody holds it
    pub fn try_acquire(&self, key: impl Into<String>) -> Option<KeyGuard> {
        let key = key.into();
        let entry = self.entry(&key);
        let lock = entry.try_lock_owned().ok()?;
        Some(KeyGuard {
            key,
            locks: self.locks.clone(),
            lock: Some(lock),
        })
    }

    /// Check whether `key` is currently held
    pub fn is_locked(&self, key: &str) -> bool {
        let table = self.table();
        table
            .get(key)
            .map(|entry| entry.try_lock().is_err())
            .unwrap_or(false)
    }

    /// Number of keys that are held or waited on
    pub fn lock_count(&self) -> usize {
        self.table().len()
    }

    /// Get (or create) the lock entry for a key
    fn entry(&self, key: &str) -> Arc<AsyncMutex<()>> {
        let mut table = self.table();
        table
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    fn table(&self) -> std::sync::MutexGuard<'_, LockTable> {
        // The table is only touched in short non-panicking sections; recover
        // from poisoning instead of propagating it.
        self.locks.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl KeyGuard {
    /// The key this guard holds
    pub fn key(&self) -> &str {
        &self.key
    }
}

/// Evicts an idle entry when an `acquire` is cancelled mid-wait
struct Waiting<'a> {
    key: &'a str,
    locks: &'a Arc<Mutex<LockTable>>,
    acquired: bool,
}

impl Drop for Waiting<'_> {
    fn drop(&mut self) {
        if self.acquired {
            return;
        }
        let mut table = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        // Only the table's own reference left: no holder, no other waiter
        if table
            .get(self.key)
            .is_some_and(|entry| Arc::strong_count(entry) == 1)
        {
            table.remove(self.key);
        }
    }
}

impl Drop for KeyGuard {
    fn drop(&mut self) {
        let mut table = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(entry) = table.get(&self.key) {
            // One reference in the table, one inside our owned guard. Anything
            // more is a waiter that still needs the entry.
            if Arc::strong_count(entry) <= 2 {
                table.remove(&self.key);
            }
        }
        // Unlock while the table is still held so a new acquirer cannot grab a
        // stale entry between eviction and release.
        self.lock.take();
    }
}
