//! Cache Store Module
//!
//! Local expiring store: HashMap storage with lazy TTL expiration and
//! soonest-expiry eviction under a byte ceiling.

use std::collections::HashMap;

use serde_json::Value;
use tracing::debug;

use crate::cache::clock::SharedClock;
use crate::cache::{CacheEntry, CacheStats, ExpiryIndex};

// == Local Store ==
/// In-process store with TTL and a size-bounded evictor.
///
/// `memory_bytes` always equals the sum of resident entry sizes once a public
/// method returns.
#[derive(Debug)]
pub struct LocalStore {
    /// Key-value storage
    entries: HashMap<String, CacheEntry>,
    /// Eviction order
    expiry: ExpiryIndex,
    /// Performance statistics
    stats: CacheStats,
    /// Sum of resident entry sizes
    memory_bytes: usize,
    /// Size ceiling in bytes
    max_memory_bytes: usize,
    clock: SharedClock,
}

impl LocalStore {
    // == Constructor ==
    /// Creates a new store.
    ///
    /// # Arguments
    /// * `max_memory_bytes` - Aggregate estimated size ceiling
    /// * `clock` - Time source for expiry decisions
    pub fn new(max_memory_bytes: usize, clock: SharedClock) -> Self {
        Self {
            entries: HashMap::new(),
            expiry: ExpiryIndex::new(),
            stats: CacheStats::new(),
            memory_bytes: 0,
            max_memory_bytes,
            clock,
        }
    }

    // == Set ==
    /// Stores a value, replacing any previous entry for `key`.
    ///
    /// Entries with the soonest expiry are evicted until the new entry fits.
    /// An entry larger than the ceiling on its own is still admitted once the
    /// store has been emptied.
    ///
    /// # Arguments
    /// * `key` - The key to store
    /// * `value` - The value to store
    /// * `ttl_seconds` - TTL in seconds; zero or negative means no expiration
    pub fn set(&mut self, key: &str, value: Value, ttl_seconds: i64) {
        let now = self.clock.now_ms();
        let entry = CacheEntry::new(key, value, ttl_seconds, now);

        self.remove_entry(key);
        self.make_room(entry.size);

        self.expiry.insert(key, entry.expires_at);
        self.memory_bytes += entry.size;
        self.entries.insert(key.to_string(), entry);
    }

    // == Get ==
    /// Retrieves a value by key.
    ///
    /// Expired entries are removed on discovery and counted as misses.
    pub fn get(&mut self, key: &str) -> Option<Value> {
        let now = self.clock.now_ms();

        let expired = match self.entries.get(key) {
            Some(entry) if entry.is_expired_at(now) => true,
            Some(entry) => {
                let value = entry.value.clone();
                self.stats.record_hit();
                return Some(value);
            }
            None => false,
        };

        if expired {
            self.remove_entry(key);
            self.stats.record_expired(1);
            debug!(key, "Local entry expired on read");
        }
        self.stats.record_miss();
        None
    }

    // == Delete ==
    /// Removes an entry by key. Returns whether an entry was present.
    pub fn delete(&mut self, key: &str) -> bool {
        self.remove_entry(key).is_some()
    }

    // == Clear ==
    /// Removes every entry and resets size accounting.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.expiry.clear();
        self.memory_bytes = 0;
    }

    // == Cleanup Expired ==
    /// Removes all expired entries from the store.
    ///
    /// Returns the number of entries removed.
    pub fn cleanup_expired(&mut self) -> usize {
        let now = self.clock.now_ms();
        let expired_keys: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired_at(now))
            .map(|(key, _)| key.clone())
            .collect();

        let count = expired_keys.len();

        for key in expired_keys {
            self.remove_entry(&key);
        }

        self.stats.record_expired(count);
        count
    }

    // == Stats ==
    /// Returns current store statistics.
    pub fn stats(&self) -> CacheStats {
        let mut stats = self.stats.clone();
        stats.total_entries = self.entries.len();
        stats.memory_bytes = self.memory_bytes;
        stats.max_memory_bytes = self.max_memory_bytes;
        stats
    }

    /// Returns the estimated resident size in bytes.
    pub fn memory_bytes(&self) -> usize {
        self.memory_bytes
    }

    /// Returns the configured size ceiling.
    pub fn max_memory_bytes(&self) -> usize {
        self.max_memory_bytes
    }

    /// Returns true if `key` is resident, expired or not.
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    // == Length ==
    /// Returns the current number of resident entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn make_room(&mut self, incoming: usize) {
        while self.memory_bytes + incoming > self.max_memory_bytes {
            let Some(victim) = self.expiry.pop_soonest() else {
                break;
            };
            if let Some(entry) = self.entries.remove(&victim) {
                self.memory_bytes -= entry.size;
                self.stats.record_eviction();
                debug!(key = %victim, size = entry.size, "Evicted local entry");
            }
        }
    }

    fn remove_entry(&mut self, key: &str) -> Option<CacheEntry> {
        let entry = self.entries.remove(key)?;
        self.expiry.remove(key, entry.expires_at);
        self.memory_bytes -= entry.size;
        Some(entry)
    }

    #[cfg(test)]
    pub(crate) fn accounted_size(&self) -> usize {
        self.entries.values().map(|e| e.size).sum()
    }

    #[cfg(test)]
    pub(crate) fn index_len(&self) -> usize {
        self.expiry.len()
    }
}
