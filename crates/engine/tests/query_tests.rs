//! Query engine tests
//!
//! Runs `find` over a fixed fixture of tickets.

use docstore_core::{Error, FieldPath};
use docstore_engine::query::{Filter, Order, Query};
use docstore_engine::{DocStore, Document};
use serde_json::json;

fn fixture() -> DocStore {
    let store = DocStore::in_memory();
    let docs = [
        ("t1", json!({"status": "open", "priority": 3, "title": "Apple pie", "owner": {"name": "ann"}})),
        ("t2", json!({"status": "open", "priority": 1, "title": "banana split"})),
        ("t3", json!({"status": "closed", "priority": 5, "title": "apricot"})),
        ("t4", json!({"status": "open", "priority": 2, "title": "avocado", "owner": null})),
        ("t5", json!({"status": "open", "priority": "high", "title": "Cherry"})),
        ("t6", json!({"status": "open", "priority": 4, "title": "almond", "owner": {"name": "bob"}})),
        ("t7", json!({"status": "open", "priority": 2.5, "title": "Date"})),
    ];
    for (key, value) in docs {
        assert!(store.create(key, value).unwrap());
    }
    // A removed document is never returned
    store.create("t8", json!({"status": "open", "priority": 9})).unwrap();
    store.remove("t8").unwrap();
    store
}

fn keys(docs: &[Document]) -> Vec<&str> {
    docs.iter().map(|d| d.key.as_str()).collect()
}

fn open_and_important() -> Filter {
    Filter::and([Filter::eq("status", "open"), Filter::gte("priority", 2)])
}

// ============================================================================
// Filters
// ============================================================================

#[test]
fn test_no_filter_returns_all_live_in_key_order() {
    let store = fixture();
    let docs = store.find(&Query::new()).unwrap();
    assert_eq!(keys(&docs), ["t1", "t2", "t3", "t4", "t5", "t6", "t7"]);
}

#[test]
fn test_and_filter_expected_keys() {
    let store = fixture();
    let docs = store.find(&Query::new().filter(open_and_important())).unwrap();
    // t5 has a string priority and is skipped, not an error
    assert_eq!(keys(&docs), ["t1", "t4", "t6", "t7"]);
}

#[test]
fn test_and_filter_sorted_and_paginated() {
    let store = fixture();
    let query = Query::new()
        .filter(open_and_important())
        .order_by(Order::desc("priority"))
        .skip(1)
        .limit(2);
    let docs = store.find(&query).unwrap();
    assert_eq!(keys(&docs), ["t1", "t7"]);
}

#[test]
fn test_json_query_matches_builder() {
    let store = fixture();
    let query = Query::from_json(
        r#"{
            "filter": {"operator": "and", "filters": [
                {"path": ["status"], "operator": "eq", "value": "open"},
                {"path": ["priority"], "operator": "gte", "value": 2}
            ]},
            "orderBy": [[["priority"], "asc"]]
        }"#,
    )
    .unwrap();
    let docs = store.find(&query).unwrap();
    assert_eq!(keys(&docs), ["t4", "t7", "t1", "t6"]);
}

#[test]
fn test_or_and_not() {
    let store = fixture();
    let query = Query::new().filter(Filter::or([
        Filter::eq("status", "closed"),
        Filter::not(Filter::exists("owner")),
    ]));
    assert_eq!(keys(&store.find(&query).unwrap()), ["t2", "t3", "t5", "t7"]);
}

#[test]
fn test_matches_case_insensitive() {
    let store = fixture();
    let query = Query::new().filter(Filter::matches("title", "^a", true));
    assert_eq!(keys(&store.find(&query).unwrap()), ["t1", "t3", "t4", "t6"]);

    let strict = Query::new().filter(Filter::matches("title", "^a", false));
    assert_eq!(keys(&store.find(&strict).unwrap()), ["t3", "t4", "t6"]);
}

#[test]
fn test_starts_with_and_nested_path() {
    let store = fixture();
    let query = Query::new().filter(Filter::starts_with(["owner", "name"], "b"));
    assert_eq!(keys(&store.find(&query).unwrap()), ["t6"]);
}

#[test]
fn test_exists_vs_is_null() {
    let store = fixture();
    let exists = Query::new().filter(Filter::exists("owner"));
    assert_eq!(keys(&store.find(&exists).unwrap()), ["t1", "t4", "t6"]);
    let null = Query::new().filter(Filter::is_null("owner"));
    assert_eq!(keys(&store.find(&null).unwrap()), ["t4"]);
}

#[test]
fn test_filter_on_document_key() {
    let store = fixture();
    let query = Query::new()
        .filter(Filter::gt(FieldPath::document_key(), "t5"))
        .order_by(Order::desc(FieldPath::document_key()));
    assert_eq!(keys(&store.find(&query).unwrap()), ["t7", "t6"]);
}

// ============================================================================
// Sorting
// ============================================================================

#[test]
fn test_sort_mixed_kinds() {
    let store = fixture();
    let query = Query::new().order_by(Order::asc("priority"));
    // numbers ascending, then the string
    assert_eq!(
        keys(&store.find(&query).unwrap()),
        ["t2", "t4", "t7", "t1", "t6", "t3", "t5"]
    );
}

#[test]
fn test_multi_key_sort_is_stable() {
    let store = fixture();
    let query = Query::new()
        .order_by(Order::asc("status"))
        .order_by(Order::desc("owner"));
    // closed first; within open: objects > null > missing (desc), ties keep key order
    assert_eq!(
        keys(&store.find(&query).unwrap()),
        ["t3", "t1", "t6", "t4", "t2", "t5", "t7"]
    );
}

#[test]
fn test_limit_without_skip_and_skip_past_end() {
    let store = fixture();
    let first_two = Query::new().limit(2);
    assert_eq!(keys(&store.find(&first_two).unwrap()), ["t1", "t2"]);
    let none = Query::new().skip(100);
    assert!(store.find(&none).unwrap().is_empty());
    let zero = Query::new().limit(0);
    assert!(store.find(&zero).unwrap().is_empty());
}

// ============================================================================
// Errors
// ============================================================================

#[test]
fn test_unknown_operator_is_hard_error() {
    let err = Query::from_json(r#"{"filter": {"operator": "near", "path": ["x"], "value": 1}}"#)
        .unwrap_err();
    assert!(matches!(err, Error::InvalidQuery(_)));
}

#[test]
fn test_bad_regex_fails_find() {
    let store = fixture();
    let err = store
        .find(&Query::new().filter(Filter::matches("title", "*", false)))
        .unwrap_err();
    assert!(matches!(err, Error::InvalidQuery(_)));
    assert!(err.is_caller_error());
}

#[test]
fn test_query_sees_only_committed_values() {
    let store = fixture();
    store.update("t2", |_| json!({"status": "closed"}).into()).unwrap();
    let closed = Query::new().filter(Filter::eq("status", "closed"));
    assert_eq!(keys(&store.find(&closed).unwrap()), ["t2", "t3"]);
}
