//! Request DTOs for the cache server API
//!
//! Defines the structure of incoming HTTP request bodies.

use serde::Deserialize;
use serde_json::Value;

/// Maximum accepted key length in bytes
pub const MAX_KEY_LEN: usize = 512;

/// Request body for the SET operation (PUT /set)
///
/// # Fields
/// - `key`: The cache key, e.g. `stock:quote:AAPL`
/// - `value`: Any JSON value
/// - `ttl`: Optional TTL in seconds; zero or negative never expires
#[derive(Debug, Clone, Deserialize)]
pub struct SetRequest {
    /// The cache key
    pub key: String,
    /// The value to store
    pub value: Value,
    /// Optional TTL in seconds
    #[serde(default)]
    pub ttl: Option<i64>,
}

impl SetRequest {
    /// Validates the request data
    ///
    /// Returns an error message if validation fails, None if valid.
    pub fn validate(&self) -> Option<String> {
        if self.key.is_empty() {
            return Some("Key cannot be empty".to_string());
        }
        if self.key.len() > MAX_KEY_LEN {
            return Some(format!(
                "Key exceeds maximum length of {} bytes",
                MAX_KEY_LEN
            ));
        }
        None
    }
}
