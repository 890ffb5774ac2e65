//! Redis remote tier
//!
//! Connects lazily through a `ConnectionManager` with a per-attempt timeout
//! and capped exponential backoff between attempts.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::error::{CacheError, Result};
use crate::remote::RemoteTier;

/// Keys requested per SCAN round-trip
const SCAN_BATCH: usize = 500;

/// Initial delay between connection attempts
const BASE_BACKOFF: Duration = Duration::from_millis(100);

// == Connect Options ==
/// Connection policy for the remote tier.
#[derive(Debug, Clone)]
pub struct ConnectOptions {
    /// Upper bound for a single connection attempt
    pub connect_timeout: Duration,
    /// Extra attempts after the first one fails
    pub retries: u32,
    /// Cap for the delay between attempts
    pub max_backoff: Duration,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            retries: 3,
            max_backoff: Duration::from_secs(2),
        }
    }
}

impl ConnectOptions {
    /// Delay before retry number `attempt` (zero-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        BASE_BACKOFF.saturating_mul(factor).min(self.max_backoff)
    }
}

// == Redis Tier ==
/// Redis-backed remote tier.
pub struct RedisTier {
    client: Client,
    connection: RwLock<Option<ConnectionManager>>,
    options: ConnectOptions,
    url: String,
}

impl fmt::Debug for RedisTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisTier")
            .field("url", &self.url)
            .field("options", &self.options)
            .field("connection", &"<ConnectionManager>")
            .finish()
    }
}

impl RedisTier {
    /// Creates a tier for `url`. No connection is made until `connect`.
    pub fn new(url: &str, options: ConnectOptions) -> Result<Self> {
        let client = Client::open(url)?;
        Ok(Self {
            client,
            connection: RwLock::new(None),
            options,
            url: url.to_string(),
        })
    }

    async fn conn(&self) -> Result<ConnectionManager> {
        self.connection
            .read()
            .await
            .clone()
            .ok_or(CacheError::RemoteUnavailable)
    }

    async fn open_with_retries(&self) -> Result<ConnectionManager> {
        let mut last_error = CacheError::RemoteUnavailable;

        for attempt in 0..=self.options.retries {
            if attempt > 0 {
                let delay = self.options.backoff(attempt - 1);
                debug!(attempt, delay_ms = delay.as_millis() as u64, "Retrying Redis connection");
                tokio::time::sleep(delay).await;
            }

            let pending = ConnectionManager::new(self.client.clone());
            match tokio::time::timeout(self.options.connect_timeout, pending).await {
                Ok(Ok(manager)) => return Ok(manager),
                Ok(Err(e)) => {
                    warn!(attempt, error = %e, "Redis connection attempt failed");
                    last_error = e.into();
                }
                Err(_) => {
                    warn!(
                        attempt,
                        timeout_ms = self.options.connect_timeout.as_millis() as u64,
                        "Redis connection attempt timed out"
                    );
                    last_error = CacheError::Remote("connection timed out".to_string());
                }
            }
        }

        Err(last_error)
    }
}

#[async_trait]
impl RemoteTier for RedisTier {
    fn name(&self) -> &'static str {
        "redis"
    }

    async fn connect(&self) -> Result<()> {
        if self.connection.read().await.is_some() {
            return self.ping().await;
        }

        let manager = self.open_with_retries().await?;
        *self.connection.write().await = Some(manager);
        info!(url = %self.url, "Connected to Redis");
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        let mut conn = self.conn().await?;
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.conn().await?;
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, payload: String, ttl_ms: Option<u64>) -> Result<()> {
        let mut conn = self.conn().await?;
        match ttl_ms {
            Some(ms) => {
                let _: () = conn.pset_ex(key, payload, ms.max(1)).await?;
            }
            None => {
                let _: () = conn.set(key, payload).await?;
            }
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut conn = self.conn().await?;
        let _: i64 = conn.del(key).await?;
        Ok(())
    }

    async fn scan_keys(&self, pattern: &str) -> Result<Vec<String>> {
        let mut conn = self.conn().await?;
        let mut keys = Vec::new();
        let mut cursor: u64 = 0;

        loop {
            let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(&mut conn)
                .await?;
            keys.extend(batch);
            if next == 0 {
                break;
            }
            cursor = next;
        }

        // SCAN may return a key more than once
        keys.sort_unstable();
        keys.dedup();
        Ok(keys)
    }

    async fn delete_keys(&self, keys: &[String]) -> Result<usize> {
        let mut conn = self.conn().await?;
        let mut removed = 0usize;
        for chunk in keys.chunks(SCAN_BATCH) {
            let count: usize = conn.del(chunk.to_vec()).await?;
            removed += count;
        }
        Ok(removed)
    }

    async fn memory_usage(&self) -> Result<Option<String>> {
        let mut conn = self.conn().await?;
        let info: String = redis::cmd("INFO").arg("memory").query_async(&mut conn).await?;
        Ok(parse_used_memory_human(&info))
    }
}

/// Extracts `used_memory_human` from an `INFO memory` reply.
fn parse_used_memory_human(info: &str) -> Option<String> {
    info.lines()
        .find_map(|line| line.strip_prefix("used_memory_human:"))
        .map(|v| v.trim().to_string())
}
