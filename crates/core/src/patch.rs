//! Patches: recorded transitions between consecutive values of a document
//!
//! A [`Patch`] carries the version it produced and a list of [`PatchOp`]s in
//! the style of RFC 6902 (`add`, `remove`, `replace`). Paths are RFC 6901
//! JSON Pointers relative to the document value; the empty pointer `""`
//! addresses the whole value, so creating a document is `add ""` and
//! deleting it is `remove ""`.
//!
//! [`diff`] computes the ops between two (possibly absent) values and
//! [`apply_ops`] replays them. A client that knows a value at version `v`
//! can follow the document from polled patches alone.

use crate::contract::Version;
use crate::json::{json_eq, JsonValue};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Error replaying ops onto a value
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PatchError {
    /// Pointer is not empty and does not start with `/`
    #[error("invalid JSON pointer: {0:?}")]
    InvalidPointer(String),

    /// Pointer does not address an existing location
    #[error("path not found: {0}")]
    PathNotFound(String),

    /// Operation targets a document that does not exist
    #[error("document is absent, cannot apply {0} at {1:?}")]
    AbsentDocument(&'static str, String),
}

/// One JSON-patch-style operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum PatchOp {
    /// Insert a value (object member or array element)
    Add {
        /// JSON Pointer
        path: String,
        /// Inserted value
        value: JsonValue,
    },
    /// Remove the value at path
    Remove {
        /// JSON Pointer
        path: String,
    },
    /// Replace the value at path
    Replace {
        /// JSON Pointer
        path: String,
        /// New value
        value: JsonValue,
    },
}

impl PatchOp {
    /// Operation name as it appears in JSON
    pub fn name(&self) -> &'static str {
        match self {
            PatchOp::Add { .. } => "add",
            PatchOp::Remove { .. } => "remove",
            PatchOp::Replace { .. } => "replace",
        }
    }

    /// JSON Pointer this operation targets
    pub fn path(&self) -> &str {
        match self {
            PatchOp::Add { path, .. } | PatchOp::Remove { path } | PatchOp::Replace { path, .. } => {
                path
            }
        }
    }
}

/// A recorded change to one document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Patch {
    /// Version this patch produced
    pub version: Version,
    /// Client-supplied correlation id, for matching optimistic updates
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation_id: Option<String>,
    /// Ops transforming the previous value into the value at `version`
    pub ops: Vec<PatchOp>,
}

// =============================================================================
// Pointer helpers
// =============================================================================

fn escape_token(token: &str) -> String {
    token.replace('~', "~0").replace('/', "~1")
}

fn unescape_token(token: &str) -> String {
    token.replace("~1", "/").replace("~0", "~")
}

fn child_pointer(parent: &str, token: &str) -> String {
    format!("{}/{}", parent, escape_token(token))
}

fn split_pointer(pointer: &str) -> Result<Vec<String>, PatchError> {
    if pointer.is_empty() {
        return Ok(Vec::new());
    }
    match pointer.strip_prefix('/') {
        Some(rest) => Ok(rest.split('/').map(unescape_token).collect()),
        None => Err(PatchError::InvalidPointer(pointer.to_string())),
    }
}

// =============================================================================
// Diff
// =============================================================================

/// Compute the ops transforming `prev` into `next`
///
/// `None` stands for an absent (never created or deleted) document.
/// Returns an empty list when the two are structurally equal, numbers
/// compared by value.
pub fn diff(prev: Option<&Value>, next: Option<&Value>) -> Vec<PatchOp> {
    let mut ops = Vec::new();
    match (prev, next) {
        (None, None) => {}
        (None, Some(v)) => ops.push(PatchOp::Add {
            path: String::new(),
            value: JsonValue::from_value(v.clone()),
        }),
        (Some(_), None) => ops.push(PatchOp::Remove {
            path: String::new(),
        }),
        (Some(a), Some(b)) => diff_at(&mut ops, "", a, b),
    }
    ops
}

fn diff_at(ops: &mut Vec<PatchOp>, path: &str, src: &Value, dst: &Value) {
    if json_eq(src, dst) {
        return;
    }
    match (src, dst) {
        (Value::Object(s), Value::Object(d)) => diff_object(ops, path, s, d),
        (Value::Array(s), Value::Array(d)) => diff_array(ops, path, s, d),
        _ => ops.push(PatchOp::Replace {
            path: path.to_string(),
            value: JsonValue::from_value(dst.clone()),
        }),
    }
}

fn diff_object(ops: &mut Vec<PatchOp>, path: &str, src: &Map<String, Value>, dst: &Map<String, Value>) {
    for (key, src_val) in src {
        let child = child_pointer(path, key);
        match dst.get(key) {
            Some(dst_val) => diff_at(ops, &child, src_val, dst_val),
            None => ops.push(PatchOp::Remove { path: child }),
        }
    }
    for (key, dst_val) in dst {
        if !src.contains_key(key) {
            ops.push(PatchOp::Add {
                path: child_pointer(path, key),
                value: JsonValue::from_value(dst_val.clone()),
            });
        }
    }
}

// Element-wise over the common prefix, then trailing removals (from the end,
// so indices stay valid) or trailing appends.
fn diff_array(ops: &mut Vec<PatchOp>, path: &str, src: &[Value], dst: &[Value]) {
    let common = src.len().min(dst.len());
    for i in 0..common {
        diff_at(ops, &child_pointer(path, &i.to_string()), &src[i], &dst[i]);
    }
    for i in (common..src.len()).rev() {
        ops.push(PatchOp::Remove {
            path: child_pointer(path, &i.to_string()),
        });
    }
    for (i, v) in dst.iter().enumerate().skip(common) {
        ops.push(PatchOp::Add {
            path: child_pointer(path, &i.to_string()),
            value: JsonValue::from_value(v.clone()),
        });
    }
}

// =============================================================================
// Apply
// =============================================================================

/// Replay `ops` onto `value`
///
/// `None` is an absent document: only `add ""` may be applied to it, and
/// `remove ""` produces it.
pub fn apply_ops(value: Option<JsonValue>, ops: &[PatchOp]) -> Result<Option<JsonValue>, PatchError> {
    let mut current = value.map(JsonValue::into_inner);
    for op in ops {
        current = apply_op(current, op)?;
    }
    Ok(current.map(JsonValue::from_value))
}

fn apply_op(current: Option<Value>, op: &PatchOp) -> Result<Option<Value>, PatchError> {
    let tokens = split_pointer(op.path())?;
    let Some((last, parents)) = tokens.split_last() else {
        // Whole-document operation
        return Ok(match op {
            PatchOp::Add { value, .. } | PatchOp::Replace { value, .. } => {
                Some(value.as_inner().clone())
            }
            PatchOp::Remove { .. } => None,
        });
    };

    let mut root = current
        .ok_or_else(|| PatchError::AbsentDocument(op.name(), op.path().to_string()))?;
    let not_found = || PatchError::PathNotFound(op.path().to_string());

    let mut target = &mut root;
    for token in parents {
        target = match target {
            Value::Object(obj) => obj.get_mut(token).ok_or_else(not_found)?,
            Value::Array(arr) => {
                let idx = token.parse::<usize>().map_err(|_| not_found())?;
                arr.get_mut(idx).ok_or_else(not_found)?
            }
            _ => return Err(not_found()),
        };
    }

    match (target, op) {
        (Value::Object(obj), PatchOp::Add { value, .. }) => {
            obj.insert(last.clone(), value.as_inner().clone());
        }
        (Value::Object(obj), PatchOp::Replace { value, .. }) => {
            let slot = obj.get_mut(last).ok_or_else(not_found)?;
            *slot = value.as_inner().clone();
        }
        (Value::Object(obj), PatchOp::Remove { .. }) => {
            obj.remove(last).ok_or_else(not_found)?;
        }
        (Value::Array(arr), PatchOp::Add { value, .. }) => {
            let idx = if last == "-" {
                arr.len()
            } else {
                last.parse::<usize>().map_err(|_| not_found())?
            };
            if idx > arr.len() {
                return Err(not_found());
            }
            arr.insert(idx, value.as_inner().clone());
        }
        (Value::Array(arr), PatchOp::Replace { value, .. }) => {
            let idx = last.parse::<usize>().map_err(|_| not_found())?;
            let slot = arr.get_mut(idx).ok_or_else(not_found)?;
            *slot = value.as_inner().clone();
        }
        (Value::Array(arr), PatchOp::Remove { .. }) => {
            let idx = last.parse::<usize>().map_err(|_| not_found())?;
            if idx >= arr.len() {
                return Err(not_found());
            }
            arr.remove(idx);
        }
        _ => return Err(not_found()),
    }
    Ok(Some(root))
}
