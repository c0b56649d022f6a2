//! Cache usage counters.

use std::sync::atomic::{AtomicU64, Ordering};

/// Statistics about cache usage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Reads answered from a fresh entry.
    pub hits: u64,
    /// Reads that had to go to the source.
    pub misses: u64,
    /// Source calls that failed.
    pub source_failures: u64,
    /// Failed source calls answered with the default.
    pub default_fallbacks: u64,
}

impl CacheStats {
    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct CacheCounters {
    hits: AtomicU64,
    misses: AtomicU64,
    source_failures: AtomicU64,
    default_fallbacks: AtomicU64,
}

impl CacheCounters {
    pub(crate) fn hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn source_failure(&self, fell_back: bool) {
        self.source_failures.fetch_add(1, Ordering::Relaxed);
        if fell_back {
            self.default_fallbacks.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn snapshot(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            source_failures: self.source_failures.load(Ordering::Relaxed),
            default_fallbacks: self.default_fallbacks.load(Ordering::Relaxed),
        }
    }
}
