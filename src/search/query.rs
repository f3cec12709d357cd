//! Query expression algebra understood by the search backend.

use serde_json::{json, Map, Value};

/// Range bounds on a single field: inclusive lower, exclusive upper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeQuery {
    pub field: String,
    pub gte: Option<String>,
    pub lt: Option<String>,
}

impl RangeQuery {
    #[must_use]
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            gte: None,
            lt: None,
        }
    }

    #[must_use]
    pub fn gte(mut self, value: impl Into<String>) -> Self {
        self.gte = Some(value.into());
        self
    }

    #[must_use]
    pub fn lt(mut self, value: impl Into<String>) -> Self {
        self.lt = Some(value.into());
        self
    }
}

/// Boolean combinator with non-scoring `filter` and `must_not` clauses.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BoolQuery {
    pub filter: Vec<QueryExpr>,
    pub must_not: Vec<QueryExpr>,
}

impl BoolQuery {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn filter(mut self, query: QueryExpr) -> Self {
        self.filter.push(query);
        self
    }

    #[must_use]
    pub fn must_not(mut self, query: QueryExpr) -> Self {
        self.must_not.push(query);
        self
    }
}

/// A structured search query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryExpr {
    MatchAll,
    QueryString(String),
    Range(RangeQuery),
    Bool(BoolQuery),
    Ids(Vec<String>),
}

impl From<RangeQuery> for QueryExpr {
    fn from(range: RangeQuery) -> Self {
        Self::Range(range)
    }
}

impl From<BoolQuery> for QueryExpr {
    fn from(query: BoolQuery) -> Self {
        Self::Bool(query)
    }
}

impl QueryExpr {
    /// Elasticsearch query DSL representation.
    #[must_use]
    pub fn to_json(&self) -> Value {
        match self {
            Self::MatchAll => json!({ "match_all": {} }),
            Self::QueryString(text) => json!({ "query_string": { "query": text } }),
            Self::Range(range) => {
                let mut bounds = Map::new();
                if let Some(gte) = &range.gte {
                    bounds.insert("gte".to_string(), Value::String(gte.clone()));
                }
                if let Some(lt) = &range.lt {
                    bounds.insert("lt".to_string(), Value::String(lt.clone()));
                }
                let mut field = Map::new();
                field.insert(range.field.clone(), Value::Object(bounds));
                json!({ "range": field })
            }
            Self::Bool(query) => {
                let mut clauses = Map::new();
                if !query.filter.is_empty() {
                    clauses.insert(
                        "filter".to_string(),
                        query.filter.iter().map(Self::to_json).collect(),
                    );
                }
                if !query.must_not.is_empty() {
                    clauses.insert(
                        "must_not".to_string(),
                        query.must_not.iter().map(Self::to_json).collect(),
                    );
                }
                json!({ "bool": clauses })
            }
            Self::Ids(ids) => json!({ "ids": { "values": ids } }),
        }
    }
}
