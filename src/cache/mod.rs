//! Cache Module
//!
//! Local in-memory store with TTL expiration and size-bounded,
//! soonest-expiry eviction.

pub mod clock;
mod entry;
mod expiry;
mod stats;
mod store;

#[cfg(test)]
mod property_tests;

// Re-export public types
pub use clock::{Clock, ManualClock, SharedClock, SystemClock};
pub use entry::{estimate_size, expiry_from_ttl, CacheEntry};
pub use expiry::ExpiryIndex;
pub use stats::CacheStats;
pub use store::LocalStore;

// == Public Constants ==
/// Default local size ceiling in bytes
pub const DEFAULT_MAX_MEMORY_BYTES: usize = 30 * 1024 * 1024; // 30 MiB
