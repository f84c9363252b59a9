//! Query engine
//!
//! A [`Query`] is an optional filter, sort criteria and a `skip`/`limit`
//! window. Evaluation is a full scan: every live document is tested, the
//! matches are stably sorted, then sliced.
//!
//! ```
//! use docstore_engine::query::{Filter, Order, Query};
//!
//! let query = Query::new()
//!     .filter(Filter::and([Filter::eq("status", "open"), Filter::gte("priority", 2)]))
//!     .order_by(Order::desc("priority"))
//!     .limit(10);
//! assert_eq!(query.limit, Some(10));
//! ```

mod filter;
mod order;

pub use docstore_core::json_eq;
pub use filter::{resolve, same_kind_cmp, CompareOp, Filter, Matcher};
pub use order::{compare_by, Direction, Order};

use serde::{Deserialize, Serialize};

use docstore_core::{Error, JsonValue, Result};

/// A live document as returned by `find`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Document key
    pub key: String,
    /// Current value
    pub value: JsonValue,
}

/// Filter, sort and pagination over all documents
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Query {
    /// Predicate; `None` matches every document
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<Filter>,
    /// Sort criteria, most significant first
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub order_by: Vec<Order>,
    /// Matches to drop after sorting
    #[serde(default)]
    pub skip: usize,
    /// Maximum matches to return after `skip`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

impl Query {
    /// Query matching every document
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the filter (builder style)
    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Append a sort criterion (builder style)
    pub fn order_by(mut self, order: Order) -> Self {
        self.order_by.push(order);
        self
    }

    /// Set `skip` (builder style)
    pub fn skip(mut self, skip: usize) -> Self {
        self.skip = skip;
        self
    }

    /// Set `limit` (builder style)
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Parse the JSON form and check that it compiles
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidQuery` for malformed JSON, an unknown
    /// operator, a bad pattern or excessive nesting.
    pub fn from_json(json: &str) -> Result<Query> {
        let query: Query =
            serde_json::from_str(json).map_err(|e| Error::InvalidQuery(e.to_string()))?;
        query.compile()?;
        Ok(query)
    }

    /// Serialize to the JSON form
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Compile the filter
    ///
    /// # Errors
    ///
    /// See [`Filter::compile`].
    pub fn compile(&self) -> Result<CompiledQuery<'_>> {
        let matcher = self.filter.as_ref().map(Filter::compile).transpose()?;
        Ok(CompiledQuery {
            query: self,
            matcher,
        })
    }
}

/// A query whose filter has been compiled
#[derive(Debug)]
pub struct CompiledQuery<'a> {
    query: &'a Query,
    matcher: Option<Matcher>,
}

impl CompiledQuery<'_> {
    /// True if the document passes the filter
    pub fn accepts(&self, key: &str, value: &JsonValue) -> bool {
        self.matcher
            .as_ref()
            .map_or(true, |m| m.matches(key, value.as_inner()))
    }

    /// Sort and slice the accepted documents
    pub fn finish(&self, mut docs: Vec<Document>) -> Vec<Document> {
        if !self.query.order_by.is_empty() {
            // Vec::sort_by is stable
            docs.sort_by(|a, b| compare_by(&self.query.order_by, a, b));
        }
        let take = self.query.limit.unwrap_or(usize::MAX);
        docs.into_iter().skip(self.query.skip).take(take).collect()
    }
}
