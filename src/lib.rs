//! Stock Cache - A two-tier cache for market data
//!
//! Prefers a shared Redis tier and falls back to an in-process expiring store
//! with soonest-expiry eviction under a byte ceiling. Remote contents are
//! snapshotted on a schedule and restored on start.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod remote;
pub mod service;
pub mod snapshot;
pub mod tasks;

pub use api::{create_router, AppState};
pub use config::Config;
pub use error::{CacheError, Result};
pub use service::{CacheService, ServiceOptions, StatsReport};
