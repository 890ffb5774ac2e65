//! Property-Based Tests for Cache Module
//!
//! Uses proptest to check TTL, accounting and eviction behavior of the local store.

use proptest::prelude::*;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

use crate::cache::{estimate_size, LocalStore, ManualClock};

// == Test Configuration ==
const TEST_MAX_MEMORY: usize = 64 * 1024;
const START_MS: u64 = 1_700_000_000_000;

fn new_store(max: usize) -> (LocalStore, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(START_MS));
    (LocalStore::new(max, clock.clone()), clock)
}

// == Strategies ==
/// Generates namespaced cache keys
fn valid_key_strategy() -> impl Strategy<Value = String> {
    "stock:[a-z]{1,8}:[A-Z]{1,5}"
}

/// Generates JSON payloads of varying size
fn value_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        "[a-zA-Z0-9 ]{0,256}".prop_map(Value::String),
        prop::collection::vec(any::<i32>(), 0..64).prop_map(|v| json!(v)),
        any::<f64>()
            .prop_filter("finite", |f| f.is_finite())
            .prop_map(|f| json!({ "close": f })),
    ]
}

#[derive(Debug, Clone)]
enum CacheOp {
    Set { key: String, value: Value, ttl: i64 },
    Get { key: String },
    Delete { key: String },
    Advance { secs: u64 },
    Cleanup,
}

fn cache_op_strategy() -> impl Strategy<Value = CacheOp> {
    prop_oneof![
        4 => (valid_key_strategy(), value_strategy(), -5i64..120)
            .prop_map(|(key, value, ttl)| CacheOp::Set { key, value, ttl }),
        2 => valid_key_strategy().prop_map(|key| CacheOp::Get { key }),
        1 => valid_key_strategy().prop_map(|key| CacheOp::Delete { key }),
        1 => (0u64..60).prop_map(|secs| CacheOp::Advance { secs }),
        1 => Just(CacheOp::Cleanup),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    // Size accounting: after every operation the running total equals the sum
    // of resident entry sizes, and the ceiling holds unless the only resident
    // entry is itself larger than the ceiling.
    #[test]
    fn prop_size_accounting_and_ceiling(
        ops in prop::collection::vec(cache_op_strategy(), 1..80),
        max in 256usize..4096,
    ) {
        let (mut store, clock) = new_store(max);

        for op in ops {
            match op {
                CacheOp::Set { key, value, ttl } => store.set(&key, value, ttl),
                CacheOp::Get { key } => { store.get(&key); }
                CacheOp::Delete { key } => { store.delete(&key); }
                CacheOp::Advance { secs } => clock.advance(Duration::from_secs(secs)),
                CacheOp::Cleanup => { store.cleanup_expired(); }
            }

            prop_assert_eq!(store.memory_bytes(), store.accounted_size());
            prop_assert_eq!(store.index_len(), store.len());
            prop_assert!(
                store.memory_bytes() <= max || store.len() == 1,
                "size {} exceeds ceiling {} with {} entries",
                store.memory_bytes(),
                max,
                store.len()
            );
        }
    }

    // Round-trip: a value read back before expiry equals the value stored.
    #[test]
    fn prop_roundtrip_storage(key in valid_key_strategy(), value in value_strategy()) {
        let (mut store, _) = new_store(TEST_MAX_MEMORY);

        store.set(&key, value.clone(), 60);

        prop_assert_eq!(store.get(&key), Some(value));
    }

    // Overwrite: the latest write wins and only one entry remains.
    #[test]
    fn prop_overwrite_semantics(
        key in valid_key_strategy(),
        value1 in value_strategy(),
        value2 in value_strategy()
    ) {
        let (mut store, _) = new_store(TEST_MAX_MEMORY);

        store.set(&key, value1, 60);
        store.set(&key, value2.clone(), 60);

        prop_assert_eq!(store.get(&key), Some(value2.clone()));
        prop_assert_eq!(store.len(), 1);
        prop_assert_eq!(store.memory_bytes(), estimate_size(&key, &value2));
    }

    // TTL: readable strictly before the expiry instant, gone from the
    // store and its accounting once the instant has passed.
    #[test]
    fn prop_ttl_expiration_behavior(
        key in valid_key_strategy(),
        value in value_strategy(),
        ttl in 1i64..100_000
    ) {
        let (mut store, clock) = new_store(TEST_MAX_MEMORY);

        store.set(&key, value.clone(), ttl);
        clock.advance(Duration::from_millis(ttl as u64 * 1000 - 1));
        prop_assert_eq!(store.get(&key), Some(value));

        clock.advance(Duration::from_millis(2));
        prop_assert_eq!(store.get(&key), None);
        prop_assert!(store.is_empty());
        prop_assert_eq!(store.memory_bytes(), 0);
    }

    // Eviction order: with two equally sized residents filling the store,
    // the one expiring sooner is evicted by the next insert.
    #[test]
    fn prop_eviction_prefers_soonest_expiry(
        soon_ttl in 1i64..1_000,
        extra in 1i64..1_000,
        payload in "[a-z]{8,32}",
    ) {
        let value = json!(payload);
        // Keys of equal length keep entry sizes equal
        let size = estimate_size("k:a", &value);
        let (mut store, _) = new_store(size * 2);

        store.set("k:b", value.clone(), soon_ttl + extra);
        store.set("k:a", value.clone(), soon_ttl);
        store.set("k:c", value.clone(), soon_ttl + extra);

        prop_assert!(!store.contains_key("k:a"));
        prop_assert!(store.contains_key("k:b"));
        prop_assert!(store.contains_key("k:c"));
        prop_assert_eq!(store.stats().evictions, 1);
    }

    // Delete removes the entry and its accounted size.
    #[test]
    fn prop_delete_removes_entry(key in valid_key_strategy(), value in value_strategy()) {
        let (mut store, _) = new_store(TEST_MAX_MEMORY);

        store.set(&key, value, 60);
        prop_assert!(store.delete(&key));
        prop_assert_eq!(store.get(&key), None);
        prop_assert_eq!(store.memory_bytes(), 0);
    }
}
