//! Run-level counters.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for one run, shared by the orphan pass and the copy pass.
///
/// Every field is atomic so copy workers can update them without a lock.
#[derive(Debug, Default)]
pub struct RunCounters {
    synced: AtomicU64,
    to_sync: AtomicU64,
    removed: AtomicU64,
    to_remove: AtomicU64,
    errors: AtomicU64,
    required_free_space: AtomicU64,
}

/// Point-in-time copy of [`RunCounters`]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterSnapshot {
    pub synced: u64,
    pub to_sync: u64,
    pub removed: u64,
    pub to_remove: u64,
    pub errors: u64,
    pub required_free_space: u64,
}

impl RunCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_synced(&self) {
        self.synced.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_removed(&self) {
        self.removed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn set_to_sync(&self, count: u64) {
        self.to_sync.store(count, Ordering::Relaxed);
    }

    pub fn set_to_remove(&self, count: u64) {
        self.to_remove.store(count, Ordering::Relaxed);
    }

    pub fn add_required_free_space(&self, bytes: u64) {
        self.required_free_space.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Force the error count to at least one after a fatal failure
    pub fn ensure_error(&self) {
        self.errors.fetch_max(1, Ordering::Relaxed);
    }

    pub fn errors(&self) -> u64 {
        self.errors.load(Ordering::Relaxed)
    }

    pub fn required_free_space(&self) -> u64 {
        self.required_free_space.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            synced: self.synced.load(Ordering::Relaxed),
            to_sync: self.to_sync.load(Ordering::Relaxed),
            removed: self.removed.load(Ordering::Relaxed),
            to_remove: self.to_remove.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            required_free_space: self.required_free_space.load(Ordering::Relaxed),
        }
    }
}

impl CounterSnapshot {
    /// Exit status for the process: success only when nothing failed
    pub fn is_success(&self) -> bool {
        self.errors == 0
    }
}
