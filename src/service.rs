//! Cache Service
//!
//! The facade callers use. Every operation prefers the remote tier and falls
//! back to the local expiring store when the remote tier is absent or failed.
//! Remote trouble is logged and never surfaced to `get`/`set` callers.

use std::sync::Arc;
use std::time::Duration;

use cron::Schedule;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cache::{CacheStats, LocalStore, SharedClock, SystemClock};
use crate::config::{Config, SnapshotTarget};
use crate::error::{CacheError, Result};
use crate::remote::{Availability, Outcome, RedisTier, RemoteAdapter};
use crate::snapshot::{
    LocalSnapshotStorage, S3SnapshotStorage, SnapshotManager, SnapshotPolicy, SnapshotStorage,
};
use crate::tasks::{spawn_cleanup_task, spawn_probe_task, spawn_snapshot_task};

// == Stats Report ==
/// Which tier answered a stats request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    Remote,
    Local,
}

/// Approximate memory in use: exact bytes locally, the remote's own summary otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum MemoryUsage {
    Bytes(usize),
    Human(String),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsReport {
    pub backend: Backend,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approx_memory: Option<MemoryUsage>,
    pub remote_available: bool,
    pub local: CacheStats,
}

// == Service Options ==
#[derive(Debug, Clone)]
pub struct ServiceOptions {
    /// TTL in seconds used when a caller passes none
    pub default_ttl: i64,
    pub cleanup_interval: Duration,
    pub probe_interval: Duration,
    /// `None` disables scheduled snapshots
    pub snapshot_schedule: Option<Schedule>,
    pub restore_on_start: bool,
}

impl Default for ServiceOptions {
    fn default() -> Self {
        Self {
            default_ttl: 3600,
            cleanup_interval: Duration::from_secs(60),
            probe_interval: Duration::from_secs(30),
            snapshot_schedule: None,
            restore_on_start: true,
        }
    }
}

// == Cache Service ==
#[derive(Debug)]
pub struct CacheService {
    local: Arc<RwLock<LocalStore>>,
    remote: Option<Arc<RemoteAdapter>>,
    snapshots: Option<Arc<SnapshotManager>>,
    options: ServiceOptions,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl CacheService {
    /// Creates a local-only service.
    pub fn new(local: LocalStore, options: ServiceOptions) -> Self {
        Self {
            local: Arc::new(RwLock::new(local)),
            remote: None,
            snapshots: None,
            options,
            tasks: Mutex::new(Vec::new()),
        }
    }

    pub fn with_remote(mut self, remote: Arc<RemoteAdapter>) -> Self {
        self.remote = Some(remote);
        self
    }

    pub fn with_snapshots(mut self, snapshots: Arc<SnapshotManager>) -> Self {
        self.snapshots = Some(snapshots);
        self
    }

    /// Wires the local store, remote tier and snapshot destination from config.
    ///
    /// Does not connect; call `init` to connect, restore and start background tasks.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let clock: SharedClock = Arc::new(SystemClock);
        let options = ServiceOptions {
            default_ttl: config.default_ttl,
            cleanup_interval: Duration::from_secs(config.cleanup_interval),
            probe_interval: Duration::from_secs(config.probe_interval),
            snapshot_schedule: Some(config.snapshot_schedule()?),
            restore_on_start: config.restore_on_start,
        };

        let local = LocalStore::new(config.max_memory_bytes, clock.clone());
        let mut service = Self::new(local, options);

        let Some(url) = &config.redis_url else {
            info!("No REDIS_URL configured, running with local store only");
            return Ok(service);
        };

        let tier = Arc::new(RedisTier::new(url, config.connect_options())?);
        let remote = Arc::new(RemoteAdapter::new(
            tier,
            config.key_prefix.clone(),
            clock.clone(),
        ));
        service = service.with_remote(remote.clone());

        let storage: Arc<dyn SnapshotStorage> = match &config.snapshot_target {
            SnapshotTarget::Disabled => {
                info!("No snapshot destination configured");
                return Ok(service);
            }
            SnapshotTarget::Local { dir } => Arc::new(LocalSnapshotStorage::new(dir.clone())),
            SnapshotTarget::S3(location) => {
                Arc::new(S3SnapshotStorage::connect(location.clone()).await)
            }
        };

        let policy = SnapshotPolicy {
            restore_ttl: config.restore_ttl,
            default_ttl: config.default_ttl,
            retain: config.snapshot_retain,
        };
        let manager = SnapshotManager::new(remote, storage, policy, clock);
        Ok(service.with_snapshots(Arc::new(manager)))
    }

    // == Set ==
    /// Stores `value` under `key`. `ttl` in seconds; `None` uses the default,
    /// zero or negative never expires.
    ///
    /// Never fails: an unserializable value is logged and dropped.
    pub async fn set<T>(&self, key: &str, value: &T, ttl: Option<i64>)
    where
        T: Serialize + ?Sized,
    {
        let value = match serde_json::to_value(value) {
            Ok(value) => value,
            Err(e) => {
                warn!(key, error = %e, "Failed to serialize cache value, skipping set");
                return;
            }
        };
        self.set_value(key, value, ttl).await;
    }

    pub async fn set_value(&self, key: &str, value: Value, ttl: Option<i64>) {
        let ttl = ttl.unwrap_or(self.options.default_ttl);

        if let Some(remote) = &self.remote {
            if let Outcome::Served(()) = remote.set(key, &value, ttl).await {
                // A copy written during an earlier outage is now stale
                self.local.write().await.delete(key);
                debug!(key, ttl, "Cached in remote tier");
                return;
            }
        }

        self.local.write().await.set(key, value, ttl);
        debug!(key, ttl, "Cached in local store");
    }

    // == Get ==
    /// Reads `key` as `T`. Misses, expired entries and undecodable values are `None`.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.get_value(key).await?;
        match serde_json::from_value(value) {
            Ok(typed) => Some(typed),
            Err(e) => {
                warn!(key, error = %e, "Cached value has unexpected shape, treating as miss");
                None
            }
        }
    }

    pub async fn get_value(&self, key: &str) -> Option<Value> {
        if let Some(remote) = &self.remote {
            if let Outcome::Served(value) = remote.get(key).await {
                debug!(key, hit = value.is_some(), "Remote lookup");
                return value;
            }
        }

        let value = self.local.write().await.get(key);
        debug!(key, hit = value.is_some(), "Local lookup");
        value
    }

    // == Delete ==
    /// Removes `key` from both tiers. Deleting a missing key is a no-op.
    pub async fn delete(&self, key: &str) {
        if let Some(remote) = &self.remote {
            remote.delete(key).await;
        }
        self.local.write().await.delete(key);
    }

    // == Clear ==
    /// Removes every cache key from both tiers.
    pub async fn clear(&self) {
        if let Some(remote) = &self.remote {
            remote.clear().await;
        }
        self.local.write().await.clear();
        info!("Cache cleared");
    }

    // == Stats ==
    pub async fn stats(&self) -> StatsReport {
        let local = self.local.read().await.stats();

        if let Some(remote) = &self.remote {
            if let Outcome::Served(key_count) = remote.key_count().await {
                let approx_memory = match remote.memory_usage().await {
                    Outcome::Served(Some(human)) => Some(MemoryUsage::Human(human)),
                    _ => None,
                };
                return StatsReport {
                    backend: Backend::Remote,
                    key_count: Some(key_count),
                    approx_memory,
                    remote_available: remote.is_available(),
                    local,
                };
            }
        }

        StatsReport {
            backend: Backend::Local,
            key_count: Some(local.total_entries),
            approx_memory: Some(MemoryUsage::Bytes(local.memory_bytes)),
            remote_available: false,
            local,
        }
    }

    pub fn remote_available(&self) -> bool {
        self.remote.as_ref().is_some_and(|r| r.is_available())
    }

    /// `None` when no remote tier is configured.
    pub fn remote_availability(&self) -> Option<Availability> {
        self.remote.as_ref().map(|r| r.availability())
    }

    pub fn snapshots_enabled(&self) -> bool {
        self.snapshots.is_some()
    }

    // == Snapshots ==
    /// Takes a snapshot immediately. Returns the number of keys written.
    pub async fn snapshot_now(&self) -> Result<usize> {
        let snapshots = self.snapshots.as_ref().ok_or(CacheError::SnapshotDisabled)?;
        snapshots.save_snapshot().await
    }

    // == Lifecycle ==
    /// Connects the remote tier, restores the latest snapshot and starts
    /// background tasks. Calling it again is a no-op.
    pub async fn init(&self) {
        let mut tasks = self.tasks.lock().await;
        if !tasks.is_empty() {
            return;
        }

        if let Some(remote) = &self.remote {
            let state = remote.probe().await;
            info!(availability = ?state, prefix = remote.key_prefix(), "Remote tier initialized");
        }

        if let Some(snapshots) = &self.snapshots {
            if self.options.restore_on_start {
                if self.remote_available() {
                    if let Err(e) = snapshots.load_snapshot().await {
                        warn!(error = %e, "Snapshot restore failed, starting empty");
                    }
                } else {
                    warn!("Remote tier unavailable, skipping snapshot restore");
                }
            }
        }

        if !self.options.cleanup_interval.is_zero() {
            tasks.push(spawn_cleanup_task(
                self.local.clone(),
                self.options.cleanup_interval,
            ));
        }

        if let Some(remote) = &self.remote {
            if !self.options.probe_interval.is_zero() {
                tasks.push(spawn_probe_task(remote.clone(), self.options.probe_interval));
            }
        }

        if let (Some(snapshots), Some(schedule)) = (&self.snapshots, &self.options.snapshot_schedule)
        {
            tasks.push(spawn_snapshot_task(snapshots.clone(), schedule.clone()));
        }

        info!(tasks = tasks.len(), "Cache service started");
    }

    /// Stops background tasks. The service stays usable afterwards.
    pub async fn shutdown(&self) {
        let mut tasks = self.tasks.lock().await;
        let count = tasks.len();
        for handle in tasks.drain(..) {
            handle.abort();
        }
        info!(tasks = count, "Cache service stopped");
    }

    /// Number of running background tasks.
    pub async fn task_count(&self) -> usize {
        self.tasks
            .lock()
            .await
            .iter()
            .filter(|handle| !handle.is_finished())
            .count()
    }
}
