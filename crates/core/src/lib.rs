//! Core types for the document store
//!
//! This crate defines the foundational types used throughout the system:
//! - Version: `(created_at_ns, revision)` pair, compared as a numeric tuple
//! - NanoClock: strictly increasing nanosecond clock
//! - JsonValue / FieldPath: document values and paths into them
//! - Patch / PatchOp: recorded changes, with diff and replay
//! - Envelope: the stored record for one key
//! - Error: Error type hierarchy

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod contract;
pub mod envelope;
pub mod error;
pub mod json;
pub mod patch;

pub use contract::{wall_clock_ns, NanoClock, Version};
pub use envelope::{Envelope, DEFAULT_MAX_PATCHES};
pub use error::{Error, Result};
pub use json::{
    json_eq, number_cmp, FieldPath, JsonValue, LimitError, PathParseError, PathSegment, KEY_FIELD,
    MAX_DOCUMENT_SIZE, MAX_NESTING_DEPTH, MAX_PATH_LENGTH,
};
pub use patch::{apply_ops, diff, Patch, PatchError, PatchOp};
