//! Filter predicates
//!
//! [`Filter`] is the declarative tree a caller builds or sends as JSON.
//! Before a scan it is compiled into a [`Matcher`]: regexes are built once,
//! paths are checked, and nesting depth is bounded, so a malformed query
//! fails before any document is read.
//!
//! ## JSON form
//!
//! ```json
//! {"operator": "and", "filters": [
//!     {"operator": "eq", "path": ["status"], "value": "open"},
//!     {"operator": "matches", "path": ["title"], "pattern": "^a", "caseInsensitive": true}
//! ]}
//! ```

use std::borrow::Cow;
use std::cmp::Ordering;

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use docstore_core::{json_eq, number_cmp, Error, FieldPath, JsonValue, Result, MAX_NESTING_DEPTH};

/// A predicate over one document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "operator", rename_all = "camelCase")]
pub enum Filter {
    /// Every sub-filter matches (true when empty)
    And {
        /// Sub-filters
        filters: Vec<Filter>,
    },
    /// At least one sub-filter matches (false when empty)
    Or {
        /// Sub-filters
        filters: Vec<Filter>,
    },
    /// The sub-filter does not match
    Not {
        /// Negated filter
        filter: Box<Filter>,
    },
    /// Value at path equals the literal
    Eq {
        /// Field path
        path: FieldPath,
        /// Literal
        value: JsonValue,
    },
    /// Value at path is missing or differs from the literal
    Ne {
        /// Field path
        path: FieldPath,
        /// Literal
        value: JsonValue,
    },
    /// Same kind as the literal and greater
    Gt {
        /// Field path
        path: FieldPath,
        /// Literal
        value: JsonValue,
    },
    /// Same kind as the literal and greater or equal
    Gte {
        /// Field path
        path: FieldPath,
        /// Literal
        value: JsonValue,
    },
    /// Same kind as the literal and less
    Lt {
        /// Field path
        path: FieldPath,
        /// Literal
        value: JsonValue,
    },
    /// Same kind as the literal and less or equal
    Lte {
        /// Field path
        path: FieldPath,
        /// Literal
        value: JsonValue,
    },
    /// Path resolves to something, `null` included
    Exists {
        /// Field path
        path: FieldPath,
    },
    /// Path resolves to an explicit `null`
    IsNull {
        /// Field path
        path: FieldPath,
    },
    /// String at path matches a regular expression
    Matches {
        /// Field path
        path: FieldPath,
        /// Pattern in `regex` crate syntax
        pattern: String,
        /// Match without regard to case
        #[serde(default, rename = "caseInsensitive")]
        case_insensitive: bool,
    },
    /// String at path starts with a prefix
    StartsWith {
        /// Field path
        path: FieldPath,
        /// Prefix
        value: String,
    },
}

// ============================================================================
// Builders
// ============================================================================

impl Filter {
    /// All of `filters`
    pub fn and(filters: impl IntoIterator<Item = Filter>) -> Self {
        Filter::And {
            filters: filters.into_iter().collect(),
        }
    }

    /// Any of `filters`
    pub fn or(filters: impl IntoIterator<Item = Filter>) -> Self {
        Filter::Or {
            filters: filters.into_iter().collect(),
        }
    }

    /// Negation of `filter`
    #[allow(clippy::should_implement_trait)]
    pub fn not(filter: Filter) -> Self {
        Filter::Not {
            filter: Box::new(filter),
        }
    }

    /// `path == value`
    pub fn eq(path: impl Into<FieldPath>, value: impl Into<JsonValue>) -> Self {
        Filter::Eq {
            path: path.into(),
            value: value.into(),
        }
    }

    /// `path != value`
    pub fn ne(path: impl Into<FieldPath>, value: impl Into<JsonValue>) -> Self {
        Filter::Ne {
            path: path.into(),
            value: value.into(),
        }
    }

    /// `path > value`
    pub fn gt(path: impl Into<FieldPath>, value: impl Into<JsonValue>) -> Self {
        Filter::Gt {
            path: path.into(),
            value: value.into(),
        }
    }

    /// `path >= value`
    pub fn gte(path: impl Into<FieldPath>, value: impl Into<JsonValue>) -> Self {
        Filter::Gte {
            path: path.into(),
            value: value.into(),
        }
    }

    /// `path < value`
    pub fn lt(path: impl Into<FieldPath>, value: impl Into<JsonValue>) -> Self {
        Filter::Lt {
            path: path.into(),
            value: value.into(),
        }
    }

    /// `path <= value`
    pub fn lte(path: impl Into<FieldPath>, value: impl Into<JsonValue>) -> Self {
        Filter::Lte {
            path: path.into(),
            value: value.into(),
        }
    }

    /// Path resolves
    pub fn exists(path: impl Into<FieldPath>) -> Self {
        Filter::Exists { path: path.into() }
    }

    /// Path resolves to `null`
    pub fn is_null(path: impl Into<FieldPath>) -> Self {
        Filter::IsNull { path: path.into() }
    }

    /// String at path matches `pattern`
    pub fn matches(
        path: impl Into<FieldPath>,
        pattern: impl Into<String>,
        case_insensitive: bool,
    ) -> Self {
        Filter::Matches {
            path: path.into(),
            pattern: pattern.into(),
            case_insensitive,
        }
    }

    /// String at path starts with `prefix`
    pub fn starts_with(path: impl Into<FieldPath>, prefix: impl Into<String>) -> Self {
        Filter::StartsWith {
            path: path.into(),
            value: prefix.into(),
        }
    }

    /// Operator name as it appears in JSON
    pub fn operator(&self) -> &'static str {
        match self {
            Filter::And { .. } => "and",
            Filter::Or { .. } => "or",
            Filter::Not { .. } => "not",
            Filter::Eq { .. } => "eq",
            Filter::Ne { .. } => "ne",
            Filter::Gt { .. } => "gt",
            Filter::Gte { .. } => "gte",
            Filter::Lt { .. } => "lt",
            Filter::Lte { .. } => "lte",
            Filter::Exists { .. } => "exists",
            Filter::IsNull { .. } => "isNull",
            Filter::Matches { .. } => "matches",
            Filter::StartsWith { .. } => "startsWith",
        }
    }

    /// Compile into an evaluable matcher
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidQuery` for a pattern that does not compile, a
    /// path over the length limit, or nesting deeper than
    /// [`MAX_NESTING_DEPTH`].
    pub fn compile(&self) -> Result<Matcher> {
        self.compile_at(1)
    }

    fn compile_at(&self, depth: usize) -> Result<Matcher> {
        if depth > MAX_NESTING_DEPTH {
            return Err(Error::InvalidQuery(format!(
                "filter nesting exceeds {} levels",
                MAX_NESTING_DEPTH
            )));
        }
        let all = |filters: &[Filter]| -> Result<Vec<Matcher>> {
            filters.iter().map(|f| f.compile_at(depth + 1)).collect()
        };

        Ok(match self {
            Filter::And { filters } => Matcher::And(all(filters)?),
            Filter::Or { filters } => Matcher::Or(all(filters)?),
            Filter::Not { filter } => Matcher::Not(Box::new(filter.compile_at(depth + 1)?)),
            Filter::Eq { path, value } => compare(path, CompareOp::Eq, value)?,
            Filter::Ne { path, value } => compare(path, CompareOp::Ne, value)?,
            Filter::Gt { path, value } => compare(path, CompareOp::Gt, value)?,
            Filter::Gte { path, value } => compare(path, CompareOp::Gte, value)?,
            Filter::Lt { path, value } => compare(path, CompareOp::Lt, value)?,
            Filter::Lte { path, value } => compare(path, CompareOp::Lte, value)?,
            Filter::Exists { path } => Matcher::Exists(checked(path)?),
            Filter::IsNull { path } => Matcher::IsNull(checked(path)?),
            Filter::Matches {
                path,
                pattern,
                case_insensitive,
            } => {
                let regex = RegexBuilder::new(pattern)
                    .case_insensitive(*case_insensitive)
                    .build()
                    .map_err(|e| Error::InvalidQuery(format!("bad pattern '{}': {}", pattern, e)))?;
                Matcher::Matches {
                    path: checked(path)?,
                    regex,
                }
            }
            Filter::StartsWith { path, value } => Matcher::StartsWith {
                path: checked(path)?,
                prefix: value.clone(),
            },
        })
    }
}

fn checked(path: &FieldPath) -> Result<FieldPath> {
    path.validate()
        .map_err(|e| Error::InvalidQuery(e.to_string()))?;
    Ok(path.clone())
}

fn compare(path: &FieldPath, op: CompareOp, value: &JsonValue) -> Result<Matcher> {
    Ok(Matcher::Compare {
        path: checked(path)?,
        op,
        value: value.as_inner().clone(),
    })
}

// ============================================================================
// Compiled form
// ============================================================================

/// Comparison leaf operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    /// Structural equality
    Eq,
    /// Structural inequality
    Ne,
    /// Greater than
    Gt,
    /// Greater than or equal
    Gte,
    /// Less than
    Lt,
    /// Less than or equal
    Lte,
}

/// A compiled filter, ready to evaluate
#[derive(Debug, Clone)]
pub enum Matcher {
    /// All match
    And(Vec<Matcher>),
    /// Any matches
    Or(Vec<Matcher>),
    /// Negation
    Not(Box<Matcher>),
    /// Comparison against a literal
    Compare {
        /// Field path
        path: FieldPath,
        /// Operator
        op: CompareOp,
        /// Literal
        value: Value,
    },
    /// Path resolves
    Exists(FieldPath),
    /// Path resolves to `null`
    IsNull(FieldPath),
    /// Regex match on a string
    Matches {
        /// Field path
        path: FieldPath,
        /// Compiled pattern
        regex: Regex,
    },
    /// Prefix match on a string
    StartsWith {
        /// Field path
        path: FieldPath,
        /// Prefix
        prefix: String,
    },
}

impl Matcher {
    /// Evaluate against the document `key` with value `value`
    pub fn matches(&self, key: &str, value: &Value) -> bool {
        match self {
            Matcher::And(all) => all.iter().all(|m| m.matches(key, value)),
            Matcher::Or(any) => any.iter().any(|m| m.matches(key, value)),
            Matcher::Not(inner) => !inner.matches(key, value),
            Matcher::Compare {
                path,
                op,
                value: literal,
            } => {
                let actual = resolve(path, key, value);
                match op {
                    CompareOp::Eq => actual.map_or(false, |a| json_eq(&a, literal)),
                    CompareOp::Ne => actual.map_or(true, |a| !json_eq(&a, literal)),
                    CompareOp::Gt => ordered(actual, literal, |o| o == Ordering::Greater),
                    CompareOp::Gte => ordered(actual, literal, |o| o != Ordering::Less),
                    CompareOp::Lt => ordered(actual, literal, |o| o == Ordering::Less),
                    CompareOp::Lte => ordered(actual, literal, |o| o != Ordering::Greater),
                }
            }
            Matcher::Exists(path) => resolve(path, key, value).is_some(),
            Matcher::IsNull(path) => {
                matches!(resolve(path, key, value).as_deref(), Some(Value::Null))
            }
            Matcher::Matches { path, regex } => match resolve(path, key, value).as_deref() {
                Some(Value::String(s)) => regex.is_match(s),
                _ => false,
            },
            Matcher::StartsWith { path, prefix } => match resolve(path, key, value).as_deref() {
                Some(Value::String(s)) => s.starts_with(prefix.as_str()),
                _ => false,
            },
        }
    }
}

fn ordered(actual: Option<Cow<'_, Value>>, literal: &Value, pred: impl Fn(Ordering) -> bool) -> bool {
    actual
        .and_then(|a| same_kind_cmp(&a, literal))
        .map_or(false, pred)
}

// ============================================================================
// Value helpers
// ============================================================================

/// Resolve `path` against a document
///
/// The reserved [`FieldPath::document_key`] path yields the key itself.
pub fn resolve<'a>(path: &FieldPath, key: &str, value: &'a Value) -> Option<Cow<'a, Value>> {
    if path.is_document_key() {
        return Some(Cow::Owned(Value::String(key.to_string())));
    }
    path.resolve(value).map(Cow::Borrowed)
}

/// Ordering between two values of the same orderable kind
///
/// `None` when the kinds differ or the kind has no order (arrays, objects).
pub fn same_kind_cmp(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        (Value::Number(x), Value::Number(y)) => number_cmp(x, y),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        _ => None,
    }
}
