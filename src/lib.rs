//! docstore - embedded versioned document store
//!
//! Every document carries a version `(created_at_ns, revision)` and a
//! bounded window of recent patches. Writers are serialized store-wide;
//! clients follow changes with a long-poll, and an in-process query engine
//! filters, sorts and paginates over all documents.
//!
//! # Quick Start
//!
//! ```
//! use docstore::{DocStore, Filter, Order, PollOptions, Query};
//! use serde_json::json;
//! use std::time::Duration;
//!
//! let store = DocStore::in_memory();
//! store.create("t1", json!({"status": "open", "priority": 3})).unwrap();
//! store.create("t2", json!({"status": "open", "priority": 1})).unwrap();
//!
//! let urgent = store
//!     .find(
//!         &Query::new()
//!             .filter(Filter::gte("priority", 2))
//!             .order_by(Order::desc("priority")),
//!     )
//!     .unwrap();
//! assert_eq!(urgent[0].key, "t1");
//!
//! let seen = store.get_with_meta("t2").unwrap().unwrap().version;
//! store.update("t2", |_| json!({"status": "done"}).into()).unwrap();
//! let changes = store
//!     .poll(&[("t2".to_string(), seen)], &PollOptions::with_timeout(Duration::ZERO))
//!     .unwrap();
//! assert_eq!(changes[0].1.len(), 1);
//! ```
//!
//! # Architecture
//!
//! - `docstore-core`: versions, JSON values and paths, patches, envelopes,
//!   errors
//! - `docstore-storage`: the backend trait, an in-memory backend and a
//!   durable log backend
//! - `docstore-engine`: the store, its change feed, queries and config

pub use docstore_core::{
    apply_ops, diff, Envelope, Error, FieldPath, JsonValue, Patch, PatchError, PatchOp, Result,
    Version,
};
pub use docstore_engine::query::{Direction, Document, Filter, Order, Query};
pub use docstore_engine::{DocStore, PollOptions, StoreConfig, WriteOptions};
pub use docstore_storage::{Backend, LogBackend, MemoryBackend, SyncMode};
