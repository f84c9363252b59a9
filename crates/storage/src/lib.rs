//! Storage backends for the document store
//!
//! This crate implements the backend adapter the store persists envelopes
//! through:
//! - Backend: ordered key-value trait (get / put / delete / scan)
//! - MemoryBackend: BTreeMap + RwLock, for tests and ephemeral stores
//! - LogBackend: append-only checksummed log file with an in-memory index

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod backend;
pub mod log;
pub mod memory;

pub use backend::{Backend, ScanIter};
pub use log::{LogBackend, SyncMode, LOG_MAGIC, RECORD_HEADER_SIZE};
pub use memory::MemoryBackend;
