//! Per-key mutual exclusion for multi-statement store operations.
//!
//! `SQLite` serializes individual statements, but the store has two
//! read-then-write sequences that span statements: branch switching
//! (deactivate all, activate one) and streaming chunk appends
//! (read-modify-write on message content). [`ScopedLocks`] hands out one
//! mutex per key (chat ID or session ID) so those sequences serialize
//! against themselves without a global lock.

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;

/// Registry of per-key mutexes.
///
/// Lock entries are created on first use and kept for the life of the store;
/// a mutex per live chat/session is small and avoids removal races.
#[derive(Default)]
pub struct ScopedLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl ScopedLocks {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            locks: DashMap::new(),
        }
    }

    /// Get (or create) the mutex for a key.
    ///
    /// The returned `Arc` keeps the mutex alive while a caller holds the
    /// guard, even if the registry entry is later dropped.
    #[must_use]
    pub fn acquire(&self, key: &str) -> Arc<Mutex<()>> {
        self.locks
            .entry(key.to_owned())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Number of keys currently tracked.
    #[must_use]
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
