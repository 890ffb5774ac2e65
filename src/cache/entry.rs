//! Cache Entry Module
//!
//! Defines the structure for individual cache entries with TTL support.

use serde_json::Value;

// == Cache Entry ==
/// Represents a single cache entry with value and metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    /// The stored value
    pub value: Value,
    /// Expiration timestamp (Unix milliseconds), None = no expiration
    pub expires_at: Option<u64>,
    /// Estimated footprint in bytes (key + serialized value)
    pub size: usize,
}

impl CacheEntry {
    // == Constructor ==
    /// Creates a new cache entry.
    ///
    /// # Arguments
    /// * `key` - The key the entry will be stored under (counted in `size`)
    /// * `value` - The value to store
    /// * `ttl_seconds` - TTL in seconds; zero or negative means no expiration
    /// * `now_ms` - Current time in Unix milliseconds
    pub fn new(key: &str, value: Value, ttl_seconds: i64, now_ms: u64) -> Self {
        let expires_at = expiry_from_ttl(ttl_seconds, now_ms);
        let size = estimate_size(key, &value);

        Self {
            value,
            expires_at,
            size,
        }
    }

    // == Is Expired ==
    /// Checks if the entry has expired at `now_ms`.
    ///
    /// An entry is expired once the current time reaches its expiration time,
    /// so it is only readable while `expires_at > now`.
    pub fn is_expired_at(&self, now_ms: u64) -> bool {
        match self.expires_at {
            Some(expires) => now_ms >= expires,
            None => false,
        }
    }
}

// == Utility Functions ==
/// Converts a TTL in seconds into an absolute expiry.
///
/// Zero or negative TTLs mean the entry never expires.
pub fn expiry_from_ttl(ttl_seconds: i64, now_ms: u64) -> Option<u64> {
    if ttl_seconds > 0 {
        Some(now_ms.saturating_add((ttl_seconds as u64).saturating_mul(1000)))
    } else {
        None
    }
}

/// Estimates the resident size of an entry: key bytes plus serialized value bytes.
pub fn estimate_size(key: &str, value: &Value) -> usize {
    let value_len = serde_json::to_vec(value).map(|v| v.len()).unwrap_or(0);
    key.len() + value_len
}
