//! Remote-Tier Adapter
//!
//! Wraps a `RemoteTier` with an availability circuit breaker and the
//! `{value, expiry}` envelope. Remote failures are logged, trip the breaker
//! and are reported to the caller as `Outcome::Bypassed`, never as errors.

use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::cache::{expiry_from_ttl, SharedClock};
use crate::error::{CacheError, Result};
use crate::remote::RemoteTier;

// == Availability ==
/// Circuit-breaker state of the remote tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Availability {
    /// No connection attempted yet
    Unknown,
    /// Last connection or operation succeeded
    Available,
    /// An operation failed; remote calls are skipped until a probe succeeds
    Failed,
}

impl Availability {
    fn as_u8(self) -> u8 {
        match self {
            Availability::Unknown => 0,
            Availability::Available => 1,
            Availability::Failed => 2,
        }
    }

    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => Availability::Available,
            2 => Availability::Failed,
            _ => Availability::Unknown,
        }
    }
}

// == Outcome ==
/// Result of a remote operation as seen by the cache facade.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    /// The remote tier handled the call
    Served(T),
    /// The remote tier was skipped or failed; use the local store
    Bypassed,
}

// == Remote Envelope ==
/// Self-describing form in which values are written to the remote tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteEnvelope {
    pub value: Value,
    /// Absolute expiry in Unix milliseconds; `None` never expires
    pub expiry: Option<u64>,
}

impl RemoteEnvelope {
    pub fn is_expired_at(&self, now_ms: u64) -> bool {
        matches!(self.expiry, Some(expiry) if now_ms >= expiry)
    }
}

/// Borrowed form of `RemoteEnvelope` used when writing.
#[derive(Serialize)]
struct EnvelopeRef<'a> {
    value: &'a Value,
    expiry: Option<u64>,
}

// == Remote Adapter ==
pub struct RemoteAdapter {
    tier: Arc<dyn RemoteTier>,
    state: AtomicU8,
    last_checked_ms: AtomicU64,
    key_prefix: String,
    clock: SharedClock,
}

impl std::fmt::Debug for RemoteAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteAdapter")
            .field("tier", &self.tier.name())
            .field("state", &self.availability())
            .field("key_prefix", &self.key_prefix)
            .finish()
    }
}

impl RemoteAdapter {
    /// Creates an adapter in the `Unknown` state.
    pub fn new(
        tier: Arc<dyn RemoteTier>,
        key_prefix: impl Into<String>,
        clock: SharedClock,
    ) -> Self {
        Self {
            tier,
            state: AtomicU8::new(Availability::Unknown.as_u8()),
            last_checked_ms: AtomicU64::new(0),
            key_prefix: key_prefix.into(),
            clock,
        }
    }

    pub fn availability(&self) -> Availability {
        Availability::from_u8(self.state.load(Ordering::SeqCst))
    }

    pub fn is_available(&self) -> bool {
        self.availability() == Availability::Available
    }

    /// Unix milliseconds of the last state transition or probe.
    pub fn last_checked_ms(&self) -> u64 {
        self.last_checked_ms.load(Ordering::SeqCst)
    }

    pub fn key_prefix(&self) -> &str {
        &self.key_prefix
    }

    fn transition(&self, next: Availability) -> Availability {
        self.last_checked_ms.store(self.clock.now_ms(), Ordering::SeqCst);
        Availability::from_u8(self.state.swap(next.as_u8(), Ordering::SeqCst))
    }

    fn mark_failed(&self, operation: &str, err: &CacheError) {
        let previous = self.transition(Availability::Failed);
        if previous != Availability::Failed {
            warn!(
                tier = self.tier.name(),
                operation,
                error = %err,
                "Remote tier failed, falling back to local store"
            );
        }
    }

    async fn try_connect(&self) -> Availability {
        let attempt = match self.tier.connect().await {
            Ok(()) => self.tier.ping().await,
            Err(e) => Err(e),
        };

        match attempt {
            Ok(()) => {
                let previous = self.transition(Availability::Available);
                if previous != Availability::Available {
                    info!(tier = self.tier.name(), "Remote tier available");
                }
                Availability::Available
            }
            Err(e) => {
                self.mark_failed("connect", &e);
                Availability::Failed
            }
        }
    }

    /// Connects on first use. `Failed` stays failed until `probe` succeeds.
    async fn ready(&self) -> bool {
        match self.availability() {
            Availability::Available => true,
            Availability::Failed => false,
            Availability::Unknown => self.try_connect().await == Availability::Available,
        }
    }

    // == Probe ==
    /// Reconnect policy: while not `Available`, attempts connect + ping.
    ///
    /// This is the only path from `Failed` back to `Available`.
    pub async fn probe(&self) -> Availability {
        match self.availability() {
            Availability::Available => {
                self.last_checked_ms.store(self.clock.now_ms(), Ordering::SeqCst);
                Availability::Available
            }
            Availability::Unknown | Availability::Failed => self.try_connect().await,
        }
    }

    fn namespaced(&self, key: &str) -> String {
        format!("{}{}", self.key_prefix, key)
    }

    fn match_all_pattern(&self) -> String {
        format!("{}*", glob_escape(&self.key_prefix))
    }

    // == Get ==
    /// Reads `key`, verifying the envelope expiry against the clock.
    pub async fn get(&self, key: &str) -> Outcome<Option<Value>> {
        if !self.ready().await {
            return Outcome::Bypassed;
        }

        let full_key = self.namespaced(key);
        let raw = match self.tier.get(&full_key).await {
            Ok(raw) => raw,
            Err(e) => {
                self.mark_failed("get", &e);
                return Outcome::Bypassed;
            }
        };

        let Some(raw) = raw else {
            debug!(key, "Remote miss");
            return Outcome::Served(None);
        };

        let envelope: RemoteEnvelope = match serde_json::from_str(&raw) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(key, error = %e, "Undecodable remote entry, treating as miss");
                return Outcome::Served(None);
            }
        };

        if envelope.is_expired_at(self.clock.now_ms()) {
            debug!(key, "Remote entry past logical expiry");
            if let Err(e) = self.tier.delete(&full_key).await {
                self.mark_failed("delete", &e);
            }
            return Outcome::Served(None);
        }

        Outcome::Served(Some(envelope.value))
    }

    // == Set ==
    /// Writes `value` with a TTL in seconds; zero or negative never expires.
    pub async fn set(&self, key: &str, value: &Value, ttl_seconds: i64) -> Outcome<()> {
        let expiry = expiry_from_ttl(ttl_seconds, self.clock.now_ms());
        self.set_until(key, value, expiry).await
    }

    /// Writes `value` with an absolute expiry.
    pub async fn set_until(&self, key: &str, value: &Value, expiry: Option<u64>) -> Outcome<()> {
        if !self.ready().await {
            return Outcome::Bypassed;
        }

        let ttl_ms = expiry.map(|at| at.saturating_sub(self.clock.now_ms()));
        let payload = match serde_json::to_string(&EnvelopeRef { value, expiry }) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(key, error = %e, "Failed to encode remote envelope");
                return Outcome::Served(());
            }
        };

        match self.tier.set(&self.namespaced(key), payload, ttl_ms).await {
            Ok(()) => Outcome::Served(()),
            Err(e) => {
                self.mark_failed("set", &e);
                Outcome::Bypassed
            }
        }
    }

    // == Delete ==
    pub async fn delete(&self, key: &str) -> Outcome<()> {
        if !self.ready().await {
            return Outcome::Bypassed;
        }

        match self.tier.delete(&self.namespaced(key)).await {
            Ok(()) => Outcome::Served(()),
            Err(e) => {
                self.mark_failed("delete", &e);
                Outcome::Bypassed
            }
        }
    }

    // == Clear ==
    /// Removes every key under this cache's prefix.
    pub async fn clear(&self) -> Outcome<usize> {
        if !self.ready().await {
            return Outcome::Bypassed;
        }

        let cleared = async {
            let keys = self.tier.scan_keys(&self.match_all_pattern()).await?;
            self.tier.delete_keys(&keys).await
        };

        match cleared.await {
            Ok(count) => {
                info!(count, "Cleared remote cache keys");
                Outcome::Served(count)
            }
            Err(e) => {
                self.mark_failed("clear", &e);
                Outcome::Bypassed
            }
        }
    }

    // == Key Count ==
    pub async fn key_count(&self) -> Outcome<usize> {
        match self.keys().await {
            Ok(keys) => Outcome::Served(keys.len()),
            Err(_) => Outcome::Bypassed,
        }
    }

    /// Human-readable memory usage of the remote store.
    pub async fn memory_usage(&self) -> Outcome<Option<String>> {
        if !self.ready().await {
            return Outcome::Bypassed;
        }

        match self.tier.memory_usage().await {
            Ok(usage) => Outcome::Served(usage),
            Err(e) => {
                self.mark_failed("memory_usage", &e);
                Outcome::Bypassed
            }
        }
    }

    // == Keyspace Access ==
    /// Lists every cache key (without prefix). Trips the breaker on failure.
    pub async fn keys(&self) -> Result<Vec<String>> {
        if !self.ready().await {
            return Err(CacheError::RemoteUnavailable);
        }

        match self.tier.scan_keys(&self.match_all_pattern()).await {
            Ok(keys) => Ok(keys
                .into_iter()
                .filter_map(|k| k.strip_prefix(&self.key_prefix).map(str::to_string))
                .collect()),
            Err(e) => {
                self.mark_failed("scan", &e);
                Err(e)
            }
        }
    }

    /// Reads the envelope for `key` without touching the breaker.
    ///
    /// Logically expired entries are reported as absent.
    pub async fn fetch_envelope(&self, key: &str) -> Result<Option<RemoteEnvelope>> {
        let Some(raw) = self.tier.get(&self.namespaced(key)).await? else {
            return Ok(None);
        };
        let envelope: RemoteEnvelope = serde_json::from_str(&raw)?;
        if envelope.is_expired_at(self.clock.now_ms()) {
            return Ok(None);
        }
        Ok(Some(envelope))
    }
}

/// Escapes glob metacharacters so a prefix matches literally in SCAN MATCH.
fn glob_escape(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
