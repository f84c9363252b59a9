//! Document store engine
//!
//! This crate ties the core types to a storage backend:
//! - DocStore: write path (create / remove / update), reads, poll, find
//! - ChangeFeed: in-process subscriptions behind `poll`
//! - Query: filter, sort and pagination over all documents
//! - StoreConfig: `docstore.toml` settings
//!
//! ```
//! use docstore_engine::{DocStore, PollOptions};
//! use docstore_engine::query::{Filter, Query};
//! use std::time::Duration;
//!
//! let store = DocStore::in_memory();
//! assert!(store.create("todo-1", serde_json::json!({"status": "open"})).unwrap());
//!
//! let open = store.find(&Query::new().filter(Filter::eq("status", "open"))).unwrap();
//! assert_eq!(open.len(), 1);
//!
//! let version = store.get_with_meta("todo-1").unwrap().unwrap().version;
//! let none = store
//!     .poll(&[("todo-1".to_string(), version)], &PollOptions::with_timeout(Duration::ZERO))
//!     .unwrap();
//! assert!(none.is_empty());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod feed;
pub mod query;
pub mod store;

pub use config::{StoreConfig, CONFIG_FILE_NAME, DEFAULT_POLL_TIMEOUT_MS};
pub use feed::{ChangeFeed, Subscription};
pub use query::{Direction, Document, Filter, Order, Query};
pub use store::{DocStore, KeyedPatches, PollOptions, WriteOptions, LOG_FILE_NAME};
