//! Cache Statistics Module
//!
//! Tracks local store metrics including hits, misses, evictions and memory.

use serde::Serialize;

// == Cache Stats ==
/// Tracks local store metrics.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    /// Number of successful retrievals
    pub hits: u64,
    /// Number of failed retrievals (key not found or expired)
    pub misses: u64,
    /// Number of entries evicted to satisfy the size ceiling
    pub evictions: u64,
    /// Number of entries dropped because their TTL elapsed
    pub expired: u64,
    /// Current number of entries
    pub total_entries: usize,
    /// Estimated resident bytes
    pub memory_bytes: usize,
    /// Configured size ceiling in bytes
    pub max_memory_bytes: usize,
}

impl CacheStats {
    // == Constructor ==
    /// Creates a new CacheStats with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    // == Hit Rate ==
    /// Calculates the cache hit rate.
    ///
    /// Returns hits / (hits + misses), or 0.0 if no requests have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    pub fn record_eviction(&mut self) {
        self.evictions += 1;
    }

    /// Adds `count` entries to the expired counter.
    pub fn record_expired(&mut self, count: usize) {
        self.expired += count as u64;
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_new() {
        let stats = CacheStats::new();
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.misses, 0);
        assert_eq!(stats.evictions, 0);
        assert_eq!(stats.expired, 0);
        assert_eq!(stats.total_entries, 0);
    }

    #[test]
    fn test_hit_rate_no_requests() {
        let stats = CacheStats::new();
        assert_eq!(stats.hit_rate(), 0.0);
    }

    #[test]
    fn test_hit_rate_mixed() {
        let mut stats = CacheStats::new();
        stats.record_hit();
        stats.record_hit();
        stats.record_hit();
        stats.record_miss();
        assert_eq!(stats.hit_rate(), 0.75);
    }

    #[test]
    fn test_record_eviction_and_expired() {
        let mut stats = CacheStats::new();
        stats.record_eviction();
        stats.record_eviction();
        stats.record_expired(3);
        assert_eq!(stats.evictions, 2);
        assert_eq!(stats.expired, 3);
    }

    #[test]
    fn test_serializes_camel_case() {
        let json = serde_json::to_value(CacheStats::new()).unwrap();
        assert!(json.get("totalEntries").is_some());
        assert!(json.get("memoryBytes").is_some());
    }
}
