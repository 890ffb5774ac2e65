//! Expiry Index Module
//!
//! Orders resident keys by expiration time for size-driven eviction.

use std::collections::BTreeSet;

// == Expiry Index ==
/// Tracks keys ordered by soonest expiry.
///
/// Entries without expiration sort after every expiring entry, so they are
/// only evicted once nothing that expires is left. Ties are broken by key.
#[derive(Debug, Default)]
pub struct ExpiryIndex {
    order: BTreeSet<(u64, String)>,
}

impl ExpiryIndex {
    // == Constructor ==
    /// Creates a new empty index.
    pub fn new() -> Self {
        Self {
            order: BTreeSet::new(),
        }
    }

    // == Insert ==
    /// Records `key` with its expiry. Callers remove any previous record first.
    pub fn insert(&mut self, key: &str, expires_at: Option<u64>) {
        self.order.insert((sort_key(expires_at), key.to_string()));
    }

    // == Remove ==
    /// Removes the record for `key` with the given expiry.
    pub fn remove(&mut self, key: &str, expires_at: Option<u64>) {
        self.order.remove(&(sort_key(expires_at), key.to_string()));
    }

    // == Pop Soonest ==
    /// Returns and removes the key that expires soonest.
    pub fn pop_soonest(&mut self) -> Option<String> {
        self.order.pop_first().map(|(_, key)| key)
    }

    // == Clear ==
    pub fn clear(&mut self) {
        self.order.clear();
    }

    // == Length ==
    /// Returns the number of tracked keys.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    // == Is Empty ==
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

fn sort_key(expires_at: Option<u64>) -> u64 {
    expires_at.unwrap_or(u64::MAX)
}
