//! Sort criteria
//!
//! Sorting compares values under one total order so that documents whose
//! fields differ in kind (or are missing) still sort deterministically:
//!
//! ```text
//! missing < null < bool < number < string < array < object
//! ```
//!
//! Within a kind, values compare naturally; arrays and objects compare
//! equal to each other and keep their scan order.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use docstore_core::FieldPath;

use super::filter::{resolve, same_kind_cmp};
use super::Document;

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Ascending
    #[default]
    Asc,
    /// Descending
    Desc,
}

/// One sort criterion; JSON form `[path, "asc" | "desc"]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order(pub FieldPath, pub Direction);

impl Order {
    /// Ascending by `path`
    pub fn asc(path: impl Into<FieldPath>) -> Self {
        Order(path.into(), Direction::Asc)
    }

    /// Descending by `path`
    pub fn desc(path: impl Into<FieldPath>) -> Self {
        Order(path.into(), Direction::Desc)
    }

    /// Compare two documents by this criterion
    pub fn compare(&self, a: &Document, b: &Document) -> Ordering {
        let left = resolve(&self.0, &a.key, a.value.as_inner());
        let right = resolve(&self.0, &b.key, b.value.as_inner());
        let ord = total_cmp(left.as_deref(), right.as_deref());
        match self.1 {
            Direction::Asc => ord,
            Direction::Desc => ord.reverse(),
        }
    }
}

/// Compare documents by each criterion in turn
pub fn compare_by(orders: &[Order], a: &Document, b: &Document) -> Ordering {
    orders
        .iter()
        .map(|o| o.compare(a, b))
        .find(|o| *o != Ordering::Equal)
        .unwrap_or(Ordering::Equal)
}

fn rank(value: Option<&Value>) -> u8 {
    match value {
        None => 0,
        Some(Value::Null) => 1,
        Some(Value::Bool(_)) => 2,
        Some(Value::Number(_)) => 3,
        Some(Value::String(_)) => 4,
        Some(Value::Array(_)) => 5,
        Some(Value::Object(_)) => 6,
    }
}

fn total_cmp(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    rank(a).cmp(&rank(b)).then_with(|| match (a, b) {
        (Some(a), Some(b)) => same_kind_cmp(a, b).unwrap_or(Ordering::Equal),
        _ => Ordering::Equal,
    })
}
