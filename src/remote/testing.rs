//! In-process remote tier with failure injection, for unit tests.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::{CacheError, Result};
use crate::remote::RemoteTier;

#[derive(Debug, Default)]
pub(crate) struct FakeTier {
    data: Mutex<BTreeMap<String, (String, Option<u64>)>>,
    failing: AtomicBool,
    calls: AtomicUsize,
    connects: AtomicUsize,
    /// Keys whose reads fail even when the tier is healthy
    poisoned: Mutex<Vec<String>>,
}

impl FakeTier {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub(crate) fn raw(&self, key: &str) -> Option<(String, Option<u64>)> {
        self.data.lock().unwrap().get(key).cloned()
    }

    pub(crate) fn insert_raw(&self, key: &str, payload: &str) {
        self.data
            .lock()
            .unwrap()
            .insert(key.to_string(), (payload.to_string(), None));
    }

    pub(crate) fn poison(&self, key: &str) {
        self.poisoned.lock().unwrap().push(key.to_string());
    }

    pub(crate) fn len(&self) -> usize {
        self.data.lock().unwrap().len()
    }

    fn enter(&self) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            Err(CacheError::Remote("injected failure".to_string()))
        } else {
            Ok(())
        }
    }
}

/// Supports the `<literal prefix>*` patterns the adapter issues.
fn matches_pattern(pattern: &str, key: &str) -> bool {
    let literal = pattern.strip_suffix('*').unwrap_or(pattern).replace('\\', "");
    key.starts_with(&literal)
}

#[async_trait]
impl RemoteTier for FakeTier {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn connect(&self) -> Result<()> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        self.enter()
    }

    async fn ping(&self) -> Result<()> {
        self.enter()
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.enter()?;
        if self.poisoned.lock().unwrap().iter().any(|k| k == key) {
            return Err(CacheError::Remote(format!("read failed for {key}")));
        }
        Ok(self.data.lock().unwrap().get(key).map(|(v, _)| v.clone()))
    }

    async fn set(&self, key: &str, payload: String, ttl_ms: Option<u64>) -> Result<()> {
        self.enter()?;
        self.data
            .lock()
            .unwrap()
            .insert(key.to_string(), (payload, ttl_ms));
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.enter()?;
        self.data.lock().unwrap().remove(key);
        Ok(())
    }

    async fn scan_keys(&self, pattern: &str) -> Result<Vec<String>> {
        self.enter()?;
        Ok(self
            .data
            .lock()
            .unwrap()
            .keys()
            .filter(|k| matches_pattern(pattern, k))
            .cloned()
            .collect())
    }

    async fn delete_keys(&self, keys: &[String]) -> Result<usize> {
        self.enter()?;
        let mut data = self.data.lock().unwrap();
        Ok(keys.iter().filter(|k| data.remove(*k).is_some()).count())
    }

    async fn memory_usage(&self) -> Result<Option<String>> {
        self.enter()?;
        Ok(Some("1.00K".to_string()))
    }
}
