//! Configuration Module
//!
//! Handles loading and managing server configuration from environment variables.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use cron::Schedule;

use crate::cache::DEFAULT_MAX_MEMORY_BYTES;
use crate::error::{CacheError, Result};
use crate::remote::ConnectOptions;
use crate::snapshot::{RestoreTtl, S3Location};

pub const DEFAULT_KEY_PREFIX: &str = "stock-cache:";
pub const DEFAULT_SNAPSHOT_SCHEDULE: &str = "0 0 3 * * *";
pub const DEFAULT_SNAPSHOT_PREFIX: &str = "snapshots/";
pub const DEFAULT_SNAPSHOT_REGION: &str = "us-east-1";

/// Where snapshots are written, if anywhere.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnapshotTarget {
    Disabled,
    Local { dir: PathBuf },
    S3(S3Location),
}

/// Server configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Remote tier URL; `None` runs local-only
    pub redis_url: Option<String>,
    /// Namespace for keys written to the remote tier
    pub key_prefix: String,
    /// Default TTL in seconds for entries without explicit TTL
    pub default_ttl: i64,
    /// Byte ceiling of the local store
    pub max_memory_bytes: usize,
    pub connect_timeout_ms: u64,
    pub connect_retries: u32,
    pub max_backoff_ms: u64,
    /// Health probe interval in seconds
    pub probe_interval: u64,
    /// Local expiry sweep interval in seconds
    pub cleanup_interval: u64,
    /// Cron expression (with seconds field) for scheduled snapshots
    pub snapshot_schedule: String,
    pub snapshot_target: SnapshotTarget,
    /// Timestamped snapshots kept; 0 keeps all
    pub snapshot_retain: usize,
    pub restore_on_start: bool,
    pub restore_ttl: RestoreTtl,
    /// HTTP server port
    pub server_port: u16,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds a Config from any variable source. Unparseable values use defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let text = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let snapshot_target = if let Some(bucket) = text("SNAPSHOT_BUCKET") {
            SnapshotTarget::S3(S3Location {
                bucket,
                prefix: text("SNAPSHOT_PREFIX").unwrap_or_else(|| DEFAULT_SNAPSHOT_PREFIX.into()),
                region: text("SNAPSHOT_REGION").unwrap_or_else(|| DEFAULT_SNAPSHOT_REGION.into()),
                endpoint: text("SNAPSHOT_ENDPOINT"),
            })
        } else if let Some(dir) = text("SNAPSHOT_DIR") {
            SnapshotTarget::Local {
                dir: PathBuf::from(dir),
            }
        } else {
            SnapshotTarget::Disabled
        };

        Self {
            redis_url: text("REDIS_URL"),
            key_prefix: lookup("REMOTE_KEY_PREFIX").unwrap_or(defaults.key_prefix),
            default_ttl: parsed(text("DEFAULT_TTL")).unwrap_or(defaults.default_ttl),
            max_memory_bytes: parsed(text("MAX_MEMORY_BYTES")).unwrap_or(defaults.max_memory_bytes),
            connect_timeout_ms: parsed(text("REMOTE_CONNECT_TIMEOUT_MS"))
                .unwrap_or(defaults.connect_timeout_ms),
            connect_retries: parsed(text("REMOTE_CONNECT_RETRIES"))
                .unwrap_or(defaults.connect_retries),
            max_backoff_ms: parsed(text("REMOTE_MAX_BACKOFF_MS"))
                .unwrap_or(defaults.max_backoff_ms),
            probe_interval: parsed(text("REMOTE_PROBE_INTERVAL"))
                .unwrap_or(defaults.probe_interval),
            cleanup_interval: parsed(text("CLEANUP_INTERVAL")).unwrap_or(defaults.cleanup_interval),
            snapshot_schedule: text("SNAPSHOT_SCHEDULE").unwrap_or(defaults.snapshot_schedule),
            snapshot_target,
            snapshot_retain: parsed(text("SNAPSHOT_RETAIN")).unwrap_or(defaults.snapshot_retain),
            restore_on_start: text("SNAPSHOT_RESTORE_ON_START")
                .and_then(|v| parse_flag(&v))
                .unwrap_or(defaults.restore_on_start),
            restore_ttl: parsed(text("SNAPSHOT_RESTORE_TTL")).unwrap_or(defaults.restore_ttl),
            server_port: parsed(text("SERVER_PORT")).unwrap_or(defaults.server_port),
        }
    }

    /// Rejects settings that cannot be defaulted away.
    pub fn validate(&self) -> Result<()> {
        self.snapshot_schedule()?;
        if self.max_memory_bytes == 0 {
            return Err(CacheError::Config(
                "MAX_MEMORY_BYTES must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn snapshot_schedule(&self) -> Result<Schedule> {
        Schedule::from_str(&self.snapshot_schedule).map_err(|e| {
            CacheError::Config(format!(
                "Invalid SNAPSHOT_SCHEDULE '{}': {}",
                self.snapshot_schedule, e
            ))
        })
    }

    pub fn connect_options(&self) -> ConnectOptions {
        ConnectOptions {
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
            retries: self.connect_retries,
            max_backoff: Duration::from_millis(self.max_backoff_ms),
        }
    }

    pub fn snapshots_enabled(&self) -> bool {
        self.redis_url.is_some() && self.snapshot_target != SnapshotTarget::Disabled
    }
}

/// Parses a present value, treating malformed input as absent.
fn parsed<T: FromStr>(raw: Option<String>) -> Option<T> {
    raw.and_then(|v| v.trim().parse().ok())
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            redis_url: None,
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
            default_ttl: 3600,
            max_memory_bytes: DEFAULT_MAX_MEMORY_BYTES,
            connect_timeout_ms: 5000,
            connect_retries: 3,
            max_backoff_ms: 2000,
            probe_interval: 30,
            cleanup_interval: 60,
            snapshot_schedule: DEFAULT_SNAPSHOT_SCHEDULE.to_string(),
            snapshot_target: SnapshotTarget::Disabled,
            snapshot_retain: 7,
            restore_on_start: true,
            restore_ttl: RestoreTtl::Fresh,
            server_port: 3000,
        }
    }
}
