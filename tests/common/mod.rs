//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use serde_json::Value;

use stock_cache::cache::{LocalStore, ManualClock};
use stock_cache::error::{CacheError, Result};
use stock_cache::remote::{RemoteAdapter, RemoteTier};
use stock_cache::{CacheService, ServiceOptions};

pub const START_MS: u64 = 1_735_700_400_000;
pub const PREFIX: &str = "it:";

// == In-Memory Remote Tier ==
/// Remote tier kept in a map, with a switch to simulate an outage.
#[derive(Debug, Default)]
pub struct MemoryTier {
    data: Mutex<BTreeMap<String, (String, Option<u64>)>>,
    down: AtomicBool,
}

impl MemoryTier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.data.lock().unwrap().len()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.data.lock().unwrap().contains_key(key)
    }

    /// Drops everything, like a remote restart without persistence.
    pub fn wipe(&self) {
        self.data.lock().unwrap().clear();
    }

    fn check(&self) -> Result<()> {
        if self.down.load(Ordering::SeqCst) {
            Err(CacheError::Remote("connection refused".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl RemoteTier for MemoryTier {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn connect(&self) -> Result<()> {
        self.check()
    }

    async fn ping(&self) -> Result<()> {
        self.check()
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.check()?;
        Ok(self.data.lock().unwrap().get(key).map(|(v, _)| v.clone()))
    }

    async fn set(&self, key: &str, payload: String, ttl_ms: Option<u64>) -> Result<()> {
        self.check()?;
        self.data
            .lock()
            .unwrap()
            .insert(key.to_string(), (payload, ttl_ms));
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.check()?;
        self.data.lock().unwrap().remove(key);
        Ok(())
    }

    async fn scan_keys(&self, pattern: &str) -> Result<Vec<String>> {
        self.check()?;
        let prefix = pattern.trim_end_matches('*').replace('\\', "");
        Ok(self
            .data
            .lock()
            .unwrap()
            .keys()
            .filter(|k| k.starts_with(&prefix))
            .cloned()
            .collect())
    }

    async fn delete_keys(&self, keys: &[String]) -> Result<usize> {
        self.check()?;
        let mut data = self.data.lock().unwrap();
        Ok(keys.iter().filter(|k| data.remove(*k).is_some()).count())
    }

    async fn memory_usage(&self) -> Result<Option<String>> {
        self.check()?;
        Ok(Some("1.50M".to_string()))
    }
}

// == Builders ==
pub fn clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::new(START_MS))
}

pub fn adapter(tier: Arc<MemoryTier>, clock: Arc<ManualClock>) -> Arc<RemoteAdapter> {
    Arc::new(RemoteAdapter::new(tier, PREFIX, clock))
}

pub fn local_service(clock: Arc<ManualClock>) -> CacheService {
    CacheService::new(
        LocalStore::new(1024 * 1024, clock),
        ServiceOptions::default(),
    )
}

pub fn remote_service(
    tier: Arc<MemoryTier>,
    clock: Arc<ManualClock>,
) -> (CacheService, Arc<RemoteAdapter>) {
    let remote = adapter(tier, clock.clone());
    let service = local_service(clock).with_remote(remote.clone());
    (service, remote)
}

pub async fn body_to_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
