//! End-to-end tests through the `docstore` facade
//!
//! Exercises the public API the way an embedding application would: a
//! durable store, a poll loop on another thread, and queries.

use docstore::{
    apply_ops, DocStore, Error, Filter, JsonValue, Order, PollOptions, Query, Version,
    WriteOptions,
};
use parking_lot::Mutex;
use serde_json::json;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tempfile::TempDir;

#[test]
fn test_never_created_keys_are_absent() {
    let store = DocStore::in_memory();
    for key in ["", "a", "ключ", "with/slash"] {
        assert!(store.get(key).unwrap().is_none());
        assert!(store.get_with_meta(key).unwrap().is_none());
    }
}

#[test]
fn test_poll_timeout_is_empty_success() {
    let store = DocStore::in_memory();
    store.create("a", json!(1)).unwrap();
    let known = store.get_with_meta("a").unwrap().unwrap().version;

    let start = Instant::now();
    let result = store
        .poll(&[("a".to_string(), known)], &PollOptions::with_timeout(Duration::from_millis(50)))
        .unwrap();
    let elapsed = start.elapsed();
    assert!(result.is_empty());
    assert!(elapsed >= Duration::from_millis(50));
    assert!(elapsed < Duration::from_secs(2));
}

#[test]
fn test_optimistic_client_round_trip() {
    let temp_dir = TempDir::new().unwrap();
    let store = Arc::new(DocStore::open(temp_dir.path()).unwrap());
    store.create("board", json!({"cards": []})).unwrap();
    let start = store.get_with_meta("board").unwrap().unwrap();

    // A second client follows the board through the change feed
    let mirror = Arc::new(Mutex::new(start.value.clone()));
    let follower = {
        let store = Arc::clone(&store);
        let mirror = Arc::clone(&mirror);
        thread::spawn(move || {
            let mut known = start.version;
            let mut op_ids = Vec::new();
            while op_ids.len() < 3 {
                let result = store
                    .poll(
                        &[("board".to_string(), known)],
                        &PollOptions::with_timeout(Duration::from_secs(10)),
                    )
                    .unwrap();
                assert!(!result.is_empty());
                for patch in &result[0].1 {
                    let mut value = mirror.lock();
                    *value = apply_ops(value.take(), &patch.ops).unwrap();
                    known = patch.version;
                    op_ids.extend(patch.operation_id.clone());
                }
            }
            op_ids
        })
    };

    for (i, title) in ["draft plan", "build it", "ship it"].iter().enumerate() {
        let op = format!("op-{}", i);
        store
            .update_with("board", &WriteOptions::operation(op), |prev| {
                let mut next = prev.cloned().unwrap_or_else(JsonValue::object);
                if let Some(cards) = next["cards"].as_array_mut() {
                    cards.push(json!({"title": title}));
                }
                next
            })
            .unwrap();
    }

    let op_ids = follower.join().unwrap();
    assert_eq!(op_ids, ["op-0", "op-1", "op-2"]);
    assert_eq!(*mirror.lock(), store.get("board").unwrap());
}

#[test]
fn test_query_after_reopen() {
    let temp_dir = TempDir::new().unwrap();
    {
        let store = DocStore::open(temp_dir.path()).unwrap();
        store.create("apple", json!({"kind": "fruit", "name": "Apple"})).unwrap();
        store.create("banana", json!({"kind": "fruit", "name": "banana"})).unwrap();
        store.create("carrot", json!({"kind": "veg", "name": "Carrot"})).unwrap();
    }

    let store = DocStore::open(temp_dir.path()).unwrap();
    let query = Query::new()
        .filter(Filter::and([
            Filter::eq("kind", "fruit"),
            Filter::matches("name", "^a", true),
        ]))
        .order_by(Order::asc("name"));
    let docs = store.find(&query).unwrap();
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].key, "apple");
}

#[test]
fn test_versions_compare_numerically() {
    let low = Version::new(1, 2);
    let high = Version::new(1, 10);
    assert!(high.is_newer_than(&low));
    assert!(Version::new(10_000_000_000_000_000_000, 1) > Version::new(9_999_999_999_999_999_999, 99));
}

#[test]
fn test_malformed_query_is_error_not_empty() {
    let store = DocStore::in_memory();
    store.create("a", json!(1)).unwrap();
    let err = Query::from_json(r#"{"filter": {"operator": "regex", "path": ["a"]}}"#).unwrap_err();
    assert!(matches!(err, Error::InvalidQuery(_)));
}
