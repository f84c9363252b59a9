//! JSON types for stored documents
//!
//! This module defines:
//! - JsonValue: Newtype wrapper around serde_json::Value
//! - PathSegment: Individual path component (Key or Index)
//! - FieldPath: Path into a document, used by query filters and sort criteria
//!
//! # Document Size Limits
//!
//! | Limit | Value | Constant |
//! |-------|-------|----------|
//! | Max document size | 16 MB | [`MAX_DOCUMENT_SIZE`] |
//! | Max nesting depth | 100 levels | [`MAX_NESTING_DEPTH`] |
//! | Max path length | 256 segments | [`MAX_PATH_LENGTH`] |

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::str::FromStr;
use thiserror::Error;

// =============================================================================
// Document Size Limits
// =============================================================================

/// Maximum document size in bytes (16 MB)
///
/// Checked on create and update, before any state is touched.
pub const MAX_DOCUMENT_SIZE: usize = 16 * 1024 * 1024;

/// Maximum nesting depth in a JSON document (100 levels)
///
/// Also bounds the depth of query filter trees.
pub const MAX_NESTING_DEPTH: usize = 100;

/// Maximum path length in segments (256 segments)
pub const MAX_PATH_LENGTH: usize = 256;

/// Error type for document limit violations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LimitError {
    /// Document exceeds maximum size
    #[error("document size {size} exceeds maximum of {max} bytes")]
    DocumentTooLarge {
        /// Actual document size
        size: usize,
        /// Maximum allowed size
        max: usize,
    },

    /// Document nesting exceeds maximum depth
    #[error("document nesting depth {depth} exceeds maximum of {max} levels")]
    NestingTooDeep {
        /// Actual nesting depth
        depth: usize,
        /// Maximum allowed depth
        max: usize,
    },

    /// Path exceeds maximum length
    #[error("path length {length} exceeds maximum of {max} segments")]
    PathTooLong {
        /// Actual path length
        length: usize,
        /// Maximum allowed length
        max: usize,
    },
}

// =============================================================================
// JsonValue
// =============================================================================

/// JSON value wrapper
///
/// Newtype around serde_json::Value providing:
/// - Direct access to underlying serde_json::Value via Deref/DerefMut
/// - Easy construction from common types
/// - Limit validation
///
/// A stored document value is always a `JsonValue`. A deleted document is
/// represented by the *absence* of a value (`Option::None`), never by a
/// special `JsonValue`; JSON `null` is an ordinary, storable value.
///
/// # Examples
///
/// ```
/// use docstore_core::JsonValue;
///
/// let obj = JsonValue::object();
/// let s = JsonValue::from("hello");
/// let n = JsonValue::from(42i64);
///
/// assert!(obj.is_object());
/// assert_eq!(s.as_str(), Some("hello"));
/// assert_eq!(n.as_i64(), Some(42));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JsonValue(serde_json::Value);

impl JsonValue {
    /// Create a null JSON value
    pub fn null() -> Self {
        JsonValue(serde_json::Value::Null)
    }

    /// Create an empty JSON object
    pub fn object() -> Self {
        JsonValue(serde_json::Value::Object(serde_json::Map::new()))
    }

    /// Create an empty JSON array
    pub fn array() -> Self {
        JsonValue(serde_json::Value::Array(Vec::new()))
    }

    /// Wrap a serde_json::Value
    pub fn from_value(value: serde_json::Value) -> Self {
        JsonValue(value)
    }

    /// Unwrap into the underlying serde_json::Value
    pub fn into_inner(self) -> serde_json::Value {
        self.0
    }

    /// Borrow the underlying serde_json::Value
    pub fn as_inner(&self) -> &serde_json::Value {
        &self.0
    }

    /// Serialize to compact JSON string
    pub fn to_json_string(&self) -> String {
        self.0.to_string()
    }

    /// Size of the compact JSON representation, in bytes
    pub fn size_bytes(&self) -> usize {
        self.to_json_string().len()
    }

    /// Maximum nesting depth of this value
    ///
    /// Returns 0 for primitives (null, bool, number, string),
    /// and counts nested objects/arrays.
    pub fn nesting_depth(&self) -> usize {
        fn depth_of(value: &serde_json::Value) -> usize {
            match value {
                serde_json::Value::Array(arr) => 1 + arr.iter().map(depth_of).max().unwrap_or(0),
                serde_json::Value::Object(obj) => 1 + obj.values().map(depth_of).max().unwrap_or(0),
                _ => 0,
            }
        }
        depth_of(&self.0)
    }

    /// Validate size and nesting limits
    ///
    /// Depth is checked first so that pathological inputs are rejected
    /// before being serialized for the size check.
    pub fn validate(&self) -> Result<(), LimitError> {
        let depth = self.nesting_depth();
        if depth > MAX_NESTING_DEPTH {
            return Err(LimitError::NestingTooDeep {
                depth,
                max: MAX_NESTING_DEPTH,
            });
        }
        let size = self.size_bytes();
        if size > MAX_DOCUMENT_SIZE {
            return Err(LimitError::DocumentTooLarge {
                size,
                max: MAX_DOCUMENT_SIZE,
            });
        }
        Ok(())
    }
}

impl FromStr for JsonValue {
    type Err = serde_json::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        serde_json::from_str(s).map(JsonValue)
    }
}

impl Deref for JsonValue {
    type Target = serde_json::Value;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for JsonValue {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl fmt::Display for JsonValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Default for JsonValue {
    fn default() -> Self {
        JsonValue::null()
    }
}

impl From<serde_json::Value> for JsonValue {
    fn from(v: serde_json::Value) -> Self {
        JsonValue(v)
    }
}

impl From<JsonValue> for serde_json::Value {
    fn from(v: JsonValue) -> Self {
        v.0
    }
}

impl From<bool> for JsonValue {
    fn from(v: bool) -> Self {
        JsonValue(serde_json::Value::Bool(v))
    }
}

impl From<i64> for JsonValue {
    fn from(v: i64) -> Self {
        JsonValue(serde_json::Value::from(v))
    }
}

impl From<i32> for JsonValue {
    fn from(v: i32) -> Self {
        JsonValue(serde_json::Value::from(v))
    }
}

impl From<u64> for JsonValue {
    fn from(v: u64) -> Self {
        JsonValue(serde_json::Value::from(v))
    }
}

impl From<f64> for JsonValue {
    /// Non-finite floats become null, as in JSON
    fn from(v: f64) -> Self {
        JsonValue(serde_json::Value::from(v))
    }
}

impl From<&str> for JsonValue {
    fn from(v: &str) -> Self {
        JsonValue(serde_json::Value::String(v.to_string()))
    }
}

impl From<String> for JsonValue {
    fn from(v: String) -> Self {
        JsonValue(serde_json::Value::String(v))
    }
}

// =============================================================================
// Comparison
// =============================================================================

/// Structural equality with numbers compared by value (`1 == 1.0`)
pub fn json_eq(a: &serde_json::Value, b: &serde_json::Value) -> bool {
    use serde_json::Value;
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => number_cmp(x, y) == Some(Ordering::Equal),
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(a, b)| json_eq(a, b))
        }
        (Value::Object(x), Value::Object(y)) => {
            x.len() == y.len()
                && x
                    .iter()
                    .all(|(k, a)| y.get(k).map_or(false, |b| json_eq(a, b)))
        }
        _ => a == b,
    }
}

/// Exact numeric ordering across integer and float representations
///
/// Integers are compared as `i128`. An integer against a float compares the
/// integer with the float's integral part, then with its fractional part, so
/// no value is rounded and the order is total over finite numbers.
pub fn number_cmp(a: &serde_json::Number, b: &serde_json::Number) -> Option<Ordering> {
    match (as_integer(a), as_integer(b)) {
        (Some(x), Some(y)) => Some(x.cmp(&y)),
        (Some(x), None) => int_float_cmp(x, b.as_f64()?),
        (None, Some(y)) => int_float_cmp(y, a.as_f64()?).map(Ordering::reverse),
        (None, None) => a.as_f64()?.partial_cmp(&b.as_f64()?),
    }
}

fn as_integer(n: &serde_json::Number) -> Option<i128> {
    n.as_i64()
        .map(i128::from)
        .or_else(|| n.as_u64().map(i128::from))
}

// 2^64, above every u64
const INT_UPPER: f64 = 18_446_744_073_709_551_616.0;
// -2^63, the smallest i64
const INT_LOWER: f64 = -9_223_372_036_854_775_808.0;

fn int_float_cmp(int: i128, float: f64) -> Option<Ordering> {
    if float.is_nan() {
        return None;
    }
    if float >= INT_UPPER {
        return Some(Ordering::Less);
    }
    if float < INT_LOWER {
        return Some(Ordering::Greater);
    }
    let whole = float.trunc();
    // |whole| <= 2^64, exact in i128
    match int.cmp(&(whole as i128)) {
        Ordering::Equal => 0.0f64.partial_cmp(&(float - whole)),
        other => Some(other),
    }
}

// =============================================================================
// FieldPath and PathSegment
// =============================================================================

/// Error type for field path parsing
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PathParseError {
    /// Empty key in path
    #[error("empty key in path at position {0}")]
    EmptyKey(usize),
    /// Unclosed bracket
    #[error("unclosed bracket starting at position {0}")]
    UnclosedBracket(usize),
    /// Invalid array index
    #[error("invalid array index at position {0}: {1}")]
    InvalidIndex(usize, String),
    /// Unexpected character
    #[error("unexpected character '{0}' at position {1}")]
    UnexpectedChar(char, usize),
}

/// A segment in a field path
///
/// In JSON a segment is a string (object key) or a non-negative integer
/// (array index): `["items", 0, "name"]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathSegment {
    /// Array index: `[0]`
    Index(usize),
    /// Object key: `.foo`
    Key(String),
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Key(k) => write!(f, ".{}", k),
            PathSegment::Index(i) => write!(f, "[{}]", i),
        }
    }
}

/// A path to a field inside a document
///
/// Resolution is lenient, like property access in a dynamic language: a
/// key segment addresses an array element when it spells an index, an index
/// segment addresses an object member named by its decimal form, and any
/// other mismatch resolves to nothing.
///
/// The single-segment path `["$key"]` ([`FieldPath::document_key`]) is
/// reserved: filters and sort criteria resolve it to the document key
/// instead of a field of the value.
///
/// # Examples
///
/// ```
/// use docstore_core::json::FieldPath;
/// use serde_json::json;
///
/// let path: FieldPath = "user.scores[1]".parse().unwrap();
/// let doc = json!({"user": {"scores": [100, 95]}});
/// assert_eq!(path.resolve(&doc), Some(&json!(95)));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct FieldPath {
    segments: Vec<PathSegment>,
}

/// Reserved segment naming the document key
pub const KEY_FIELD: &str = "$key";

impl FieldPath {
    /// The empty path, addressing the whole value
    pub fn root() -> Self {
        FieldPath {
            segments: Vec::new(),
        }
    }

    /// The reserved path addressing the document key
    pub fn document_key() -> Self {
        FieldPath::root().key(KEY_FIELD)
    }

    /// Create a path from a vector of segments
    pub fn from_segments(segments: Vec<PathSegment>) -> Self {
        FieldPath { segments }
    }

    /// Get the path segments
    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    /// Number of segments
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// True for the root path
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Append a key segment (builder style)
    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.segments.push(PathSegment::Key(key.into()));
        self
    }

    /// Append an index segment (builder style)
    pub fn index(mut self, idx: usize) -> Self {
        self.segments.push(PathSegment::Index(idx));
        self
    }

    /// True if this is the reserved document-key path
    pub fn is_document_key(&self) -> bool {
        matches!(self.segments.as_slice(), [PathSegment::Key(k)] if k == KEY_FIELD)
    }

    /// Validate path length limit
    pub fn validate(&self) -> Result<(), LimitError> {
        if self.segments.len() > MAX_PATH_LENGTH {
            Err(LimitError::PathTooLong {
                length: self.segments.len(),
                max: MAX_PATH_LENGTH,
            })
        } else {
            Ok(())
        }
    }

    /// Resolve the path inside `value`
    ///
    /// Returns `None` when the path does not exist. An explicit JSON null
    /// at the path resolves to `Some(&Value::Null)`.
    pub fn resolve<'a>(&self, value: &'a serde_json::Value) -> Option<&'a serde_json::Value> {
        let mut current = value;
        for segment in &self.segments {
            current = match (segment, current) {
                (PathSegment::Key(key), serde_json::Value::Object(obj)) => obj.get(key)?,
                (PathSegment::Key(key), serde_json::Value::Array(arr)) => {
                    arr.get(key.parse::<usize>().ok()?)?
                }
                (PathSegment::Index(idx), serde_json::Value::Array(arr)) => arr.get(*idx)?,
                (PathSegment::Index(idx), serde_json::Value::Object(obj)) => {
                    obj.get(&idx.to_string())?
                }
                _ => return None,
            };
        }
        Some(current)
    }
}

impl From<&str> for FieldPath {
    /// A single top-level key; use `parse()` for dotted paths
    fn from(key: &str) -> Self {
        FieldPath::root().key(key)
    }
}

impl From<String> for FieldPath {
    fn from(key: String) -> Self {
        FieldPath::root().key(key)
    }
}

impl<const N: usize> From<[&str; N]> for FieldPath {
    fn from(keys: [&str; N]) -> Self {
        FieldPath::from_segments(
            keys.iter()
                .map(|k| PathSegment::Key((*k).to_string()))
                .collect(),
        )
    }
}

impl From<Vec<PathSegment>> for FieldPath {
    fn from(segments: Vec<PathSegment>) -> Self {
        FieldPath::from_segments(segments)
    }
}

impl FromStr for FieldPath {
    type Err = PathParseError;

    /// Parse a dotted path
    ///
    /// Supported syntax:
    /// - `foo` or `.foo` - object key
    /// - `[0]` - array index
    /// - `foo.bar` - nested keys
    /// - `foo[0].bar` - mixed
    /// - `$key` - the document key
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Ok(FieldPath::root());
        }

        let is_key_char = |c: char| c.is_alphanumeric() || c == '_' || c == '-' || c == '$';
        let mut segments = Vec::new();
        let chars: Vec<char> = s.chars().collect();
        let mut i = 0;

        if chars[i] == '.' {
            i += 1;
        }

        while i < chars.len() {
            if chars[i] == '.' {
                i += 1;
                if i >= chars.len() {
                    return Err(PathParseError::EmptyKey(i));
                }
            }

            if chars[i] == '[' {
                let start = i;
                i += 1;
                let idx_start = i;
                while i < chars.len() && chars[i] != ']' {
                    i += 1;
                }
                if i >= chars.len() {
                    return Err(PathParseError::UnclosedBracket(start));
                }
                let idx_str: String = chars[idx_start..i].iter().collect();
                let idx = idx_str
                    .parse::<usize>()
                    .map_err(|_| PathParseError::InvalidIndex(idx_start, idx_str))?;
                segments.push(PathSegment::Index(idx));
                i += 1;
            } else if is_key_char(chars[i]) {
                let key_start = i;
                while i < chars.len() && is_key_char(chars[i]) {
                    i += 1;
                }
                let key: String = chars[key_start..i].iter().collect();
                segments.push(PathSegment::Key(key));
            } else if chars[i] == '.' {
                return Err(PathParseError::EmptyKey(i));
            } else {
                return Err(PathParseError::UnexpectedChar(chars[i], i));
            }
        }

        Ok(FieldPath { segments })
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::new();
        for seg in &self.segments {
            out.push_str(&seg.to_string());
        }
        write!(f, "{}", out.strip_prefix('.').unwrap_or(&out))
    }
}
