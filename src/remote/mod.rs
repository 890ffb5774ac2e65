//! Remote Tier Module
//!
//! Optional networked key-value tier preferred by the cache when reachable.
//!
//! ```text
//! CacheService
//!   └── RemoteAdapter        <- availability breaker + {value, expiry} envelope
//!         └── dyn RemoteTier
//!               └── RedisTier  <- ConnectionManager, SCAN for enumeration
//! ```

mod adapter;
mod redis_tier;
mod tier;

#[cfg(test)]
pub(crate) mod testing;

pub use adapter::{Availability, Outcome, RemoteAdapter, RemoteEnvelope};
pub use redis_tier::{ConnectOptions, RedisTier};
pub use tier::RemoteTier;
