//! Search request and response types.

use serde_json::{json, Map, Value};

use super::query::QueryExpr;
use crate::format;

/// A sorted, filtered, paginated search over a set of indices.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    pub indices: Vec<String>,
    pub sort_field: String,
    pub ascending: bool,
    pub from: usize,
    pub size: usize,
    pub query: QueryExpr,
}

impl SearchRequest {
    /// Body line of a multi-search request.
    #[must_use]
    pub fn body_json(&self) -> Value {
        let order = if self.ascending { "asc" } else { "desc" };
        let mut sort = Map::new();
        sort.insert(self.sort_field.clone(), json!({ "order": order }));
        json!({
            "query": self.query.to_json(),
            "sort": [sort],
            "from": self.from,
            "size": self.size,
        })
    }
}

/// A single matching document.
#[derive(Debug, Clone, PartialEq)]
pub struct Hit {
    pub id: String,
    pub source: Value,
}

impl Hit {
    #[must_use]
    pub fn new(id: impl Into<String>, source: Value) -> Self {
        Self {
            id: id.into(),
            source,
        }
    }

    /// Value of the timestamp field, or `None` if the document lacks it.
    #[must_use]
    pub fn timestamp(&self, field: &str) -> Option<String> {
        format::evaluate(&self.source, field).ok()
    }
}

/// Hits returned by one search, in the backend's sort order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchResponse {
    pub hits: Vec<Hit>,
    pub total_hits: u64,
}

impl SearchResponse {
    #[must_use]
    pub fn new(hits: Vec<Hit>, total_hits: u64) -> Self {
        Self { hits, total_hits }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }
}
