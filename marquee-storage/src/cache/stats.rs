//! Cache counters.

use std::sync::atomic::{AtomicU64, Ordering};

/// Point-in-time copy of the cache counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Reads answered from a populated cache.
    pub hits: u64,
    /// Reads that found the cache empty.
    pub misses: u64,
    /// Store reads started by a hydrate.
    pub hydrations: u64,
    pub hydrate_failures: u64,
    /// Snapshots installed by a push.
    pub replacements: u64,
    pub resets: u64,
    /// Sections in the current snapshot.
    pub section_count: u64,
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
pub(crate) struct AtomicCacheStats {
    pub(crate) hits: AtomicU64,
    pub(crate) misses: AtomicU64,
    pub(crate) hydrations: AtomicU64,
    pub(crate) hydrate_failures: AtomicU64,
    pub(crate) replacements: AtomicU64,
    pub(crate) resets: AtomicU64,
}

impl AtomicCacheStats {
    pub(crate) fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self, section_count: u64) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            hydrations: self.hydrations.load(Ordering::Relaxed),
            hydrate_failures: self.hydrate_failures.load(Ordering::Relaxed),
            replacements: self.replacements.load(Ordering::Relaxed),
            resets: self.resets.load(Ordering::Relaxed),
            section_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_stats_hit_rate() {
        let stats = CacheStats {
            hits: 80,
            misses: 20,
            ..Default::default()
        };
        assert!((stats.hit_rate() - 0.8).abs() < 0.001);
        assert!((CacheStats::default().hit_rate() - 0.0).abs() < 0.001);
    }

    #[test]
    fn test_atomic_snapshot() {
        let stats = AtomicCacheStats::default();
        AtomicCacheStats::bump(&stats.hits);
        AtomicCacheStats::bump(&stats.hits);
        AtomicCacheStats::bump(&stats.resets);
        let copy = stats.snapshot(3);
        assert_eq!(copy.hits, 2);
        assert_eq!(copy.resets, 1);
        assert_eq!(copy.section_count, 3);
    }
}
