//! Multi-threaded write path tests
//!
//! Validates that the store-wide write lock keeps per-key history
//! linearizable while many threads write, read and poll at once.

use docstore_core::{apply_ops, JsonValue, Version};
use docstore_engine::{DocStore, PollOptions};
use parking_lot::Mutex;
use serde_json::json;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

// ============================================================================
// Write serialization
// ============================================================================

/// Test: N threads incrementing one counter lose no increments
#[test]
fn test_concurrent_updates_same_key_lose_nothing() {
    let store = Arc::new(DocStore::in_memory());
    let threads = 8;
    let per_thread = 50;
    let barrier = Arc::new(Barrier::new(threads));

    let handles: Vec<_> = (0..threads)
        .map(|_| {
            let store = Arc::clone(&store);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                for _ in 0..per_thread {
                    store
                        .update("counter", |prev| {
                            let n = prev.and_then(|v| v.as_i64()).unwrap_or(0);
                            JsonValue::from(n + 1)
                        })
                        .unwrap();
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    let env = store.get_with_meta("counter").unwrap().unwrap();
    let total = (threads * per_thread) as i64;
    assert_eq!(env.value, Some(total.into()));
    assert_eq!(env.version.revision, total as u64);
}

/// Test: only one of many racing creates wins
#[test]
fn test_racing_creates_single_winner() {
    let store = Arc::new(DocStore::in_memory());
    let threads = 10;
    let barrier = Arc::new(Barrier::new(threads));
    let winners = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..threads)
        .map(|i| {
            let store = Arc::clone(&store);
            let barrier = Arc::clone(&barrier);
            let winners = Arc::clone(&winners);
            thread::spawn(move || {
                barrier.wait();
                if store.create("only", json!({"by": i})).unwrap() {
                    winners.fetch_add(1, Ordering::SeqCst);
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    assert_eq!(winners.load(Ordering::SeqCst), 1);
    assert_eq!(store.get_with_meta("only").unwrap().unwrap().version.revision, 1);
}

/// Test: writes to different keys each get their own dense revisions
#[test]
fn test_concurrent_writes_different_keys() {
    let store = Arc::new(DocStore::in_memory());
    let barrier = Arc::new(Barrier::new(4));

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let store = Arc::clone(&store);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let key = format!("key-{}", t);
                barrier.wait();
                for i in 0..25i64 {
                    store.update(&key, move |_| i.into()).unwrap();
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    let mut created_at = HashSet::new();
    for t in 0..4 {
        let env = store.get_with_meta(&format!("key-{}", t)).unwrap().unwrap();
        assert_eq!(env.version.revision, 25);
        assert_eq!(env.value, Some(24i64.into()));
        created_at.insert(env.version.created_at_ns);
    }
    assert_eq!(created_at.len(), 4, "created_at_ns must be unique per key");
}

// ============================================================================
// Readers and pollers alongside writers
// ============================================================================

/// Test: readers never observe a version going backwards
#[test]
fn test_reader_sees_monotonic_versions() {
    let store = Arc::new(DocStore::in_memory());
    store.create("k", json!(0)).unwrap();
    let done = Arc::new(std::sync::atomic::AtomicBool::new(false));

    let reader = {
        let store = Arc::clone(&store);
        let done = Arc::clone(&done);
        thread::spawn(move || {
            let mut last = Version::default();
            while !done.load(Ordering::Acquire) {
                let env = store.get_with_meta("k").unwrap().unwrap();
                assert!(env.version >= last);
                assert_eq!(env.patches.last().unwrap().version, env.version);
                last = env.version;
            }
        })
    };

    for i in 1..=200i64 {
        store.update("k", move |_| i.into()).unwrap();
    }
    done.store(true, Ordering::Release);
    reader.join().unwrap();
}

/// Test: a client following one key by polling reconstructs every value
#[test]
fn test_poll_loop_follows_every_write() {
    let store = Arc::new(DocStore::in_memory());
    store.create("doc", json!({"n": 0})).unwrap();
    let start = store.get_with_meta("doc").unwrap().unwrap();
    let writes = 100i64;

    let follower = {
        let store = Arc::clone(&store);
        thread::spawn(move || {
            let mut value = start.value;
            let mut known = start.version;
            let mut observed = Vec::new();
            while observed.last() != Some(&writes) {
                let result = store
                    .poll(
                        &[("doc".to_string(), known)],
                        &PollOptions::with_timeout(Duration::from_secs(10)),
                    )
                    .unwrap();
                assert!(!result.is_empty(), "poll timed out");
                for patch in &result[0].1 {
                    assert!(patch.version.is_newer_than(&known));
                    value = apply_ops(value, &patch.ops).unwrap();
                    known = patch.version;
                }
                let n = value.as_ref().and_then(|v| v["n"].as_i64()).unwrap();
                observed.push(n);
            }
            observed
        })
    };

    for i in 1..=writes {
        store.update("doc", move |_| json!({"n": i}).into()).unwrap();
    }

    let observed = follower.join().unwrap();
    assert!(observed.windows(2).all(|w| w[0] < w[1]));
    assert_eq!(store.subscriber_count(), 0);
}

/// Test: queries run while writers mutate without errors or torn values
#[test]
fn test_find_during_writes() {
    use docstore_engine::query::{Filter, Query};

    let store = Arc::new(DocStore::in_memory());
    let barrier = Arc::new(Barrier::new(2));
    let seen = Arc::new(Mutex::new(Vec::new()));

    let writer = {
        let store = Arc::clone(&store);
        let barrier = Arc::clone(&barrier);
        thread::spawn(move || {
            barrier.wait();
            for i in 0..100 {
                store
                    .create(&format!("d{:03}", i), json!({"even": i % 2 == 0, "i": i}))
                    .unwrap();
            }
        })
    };

    let reader = {
        let store = Arc::clone(&store);
        let barrier = Arc::clone(&barrier);
        let seen = Arc::clone(&seen);
        thread::spawn(move || {
            barrier.wait();
            for _ in 0..20 {
                let docs = store
                    .find(&Query::new().filter(Filter::eq("even", true)))
                    .unwrap();
                for doc in &docs {
                    assert_eq!(doc.value["i"].as_i64().unwrap() % 2, 0);
                }
                seen.lock().push(docs.len());
            }
        })
    };

    writer.join().unwrap();
    reader.join().unwrap();

    let counts = seen.lock();
    assert!(counts.windows(2).all(|w| w[0] <= w[1]));
    let final_count = store
        .find(&Query::new().filter(Filter::eq("even", true)))
        .unwrap()
        .len();
    assert_eq!(final_count, 50);
}
