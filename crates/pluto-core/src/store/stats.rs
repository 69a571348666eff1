//! Store access counters.
//!
//! Every read the store issues against its driver is counted here, which is
//! what lets callers (and tests) observe deferred execution and compare the
//! resolution passes of eager and lazy loading.

use std::sync::atomic::{AtomicU64, Ordering};

/// Live counters owned by the store.
#[derive(Debug, Default)]
pub struct StoreStats {
    scans: AtomicU64,
    gets: AtomicU64,
    resolutions: AtomicU64,
    writes: AtomicU64,
}

/// Point-in-time copy of [`StoreStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Table scans started.
    pub scans: u64,
    /// Keyed lookups.
    pub gets: u64,
    /// Relationship resolution passes (one per batch, however many parents).
    pub resolutions: u64,
    /// Inserts, replaces and deletes.
    pub writes: u64,
}

impl StatsSnapshot {
    /// Total reads of any kind.
    pub fn reads(&self) -> u64 {
        self.scans + self.gets
    }
}

impl StoreStats {
    /// Create zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_scan(&self) {
        self.scans.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_get(&self) {
        self.gets.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_resolution(&self) {
        self.resolutions.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_write(&self) {
        self.writes.fetch_add(1, Ordering::Relaxed);
    }

    /// Copy the current values.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            scans: self.scans.load(Ordering::Relaxed),
            gets: self.gets.load(Ordering::Relaxed),
            resolutions: self.resolutions.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
        }
    }

    /// Reset all counters to zero.
    pub fn reset(&self) {
        self.scans.store(0, Ordering::Relaxed);
        self.gets.store(0, Ordering::Relaxed);
        self.resolutions.store(0, Ordering::Relaxed);
        self.writes.store(0, Ordering::Relaxed);
    }
}
