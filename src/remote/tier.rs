//! Remote Tier Trait
//!
//! Capability interface for a networked key-value store used as the
//! preferred cache tier.

use async_trait::async_trait;

use crate::error::Result;

/// Operations the cache needs from a remote key-value store.
///
/// Keys passed here are already namespaced. Payloads are opaque strings.
#[async_trait]
pub trait RemoteTier: Send + Sync {
    /// A name for logs, e.g. "redis".
    fn name(&self) -> &'static str;

    /// Establishes (or re-establishes) the connection.
    async fn connect(&self) -> Result<()>;

    /// Round-trips a liveness check.
    async fn ping(&self) -> Result<()>;

    /// Returns the raw payload stored under `key`.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Stores `payload`, with a native TTL in milliseconds when given.
    async fn set(&self, key: &str, payload: String, ttl_ms: Option<u64>) -> Result<()>;

    /// Removes `key`. Absent keys are not an error.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Enumerates keys matching a glob `pattern` without blocking the server.
    async fn scan_keys(&self, pattern: &str) -> Result<Vec<String>>;

    /// Removes the given keys, returning how many existed.
    async fn delete_keys(&self, keys: &[String]) -> Result<usize>;

    /// Human-readable memory usage reported by the store, if any.
    async fn memory_usage(&self) -> Result<Option<String>>;
}
