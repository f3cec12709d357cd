//! Construction of the initial and follow-up search queries.

use chrono::{DateTime, Utc};

use super::timestamp;
use super::window::tailing_time_window;
use crate::config::QueryDefinition;
use crate::search::{BoolQuery, QueryExpr, RangeQuery};

/// Builds queries for one [`QueryDefinition`].
#[derive(Debug, Clone, Copy)]
pub struct QueryBuilder<'a> {
    definition: &'a QueryDefinition,
}

impl<'a> QueryBuilder<'a> {
    #[must_use]
    pub fn new(definition: &'a QueryDefinition) -> Self {
        Self { definition }
    }

    /// Free-text (or match-all) query, filtered by the configured date range.
    #[must_use]
    pub fn search_query(&self) -> QueryExpr {
        let query = if self.definition.terms.is_empty() {
            tracing::trace!("Running match all query");
            QueryExpr::MatchAll
        } else {
            let text = self.definition.terms.join(" ");
            tracing::trace!(query = %text, "Running query string query");
            QueryExpr::QueryString(text)
        };

        match self.date_range() {
            Some(range) => BoolQuery::new().filter(query).filter(range.into()).into(),
            None => query,
        }
    }

    /// Range on the timestamp field: `after` inclusive, `before` exclusive.
    ///
    /// `None` when no date bound is configured.
    #[must_use]
    pub fn date_range(&self) -> Option<RangeQuery> {
        if !self.definition.is_date_time_filtered() {
            return None;
        }
        let mut range = RangeQuery::new(&self.definition.timestamp_field);
        if let Some(after) = &self.definition.after {
            tracing::trace!(after = %after, "Date range query lower bound");
            range = range.gte(after);
        }
        if let Some(before) = &self.definition.before {
            tracing::trace!(before = %before, "Date range query upper bound");
            range = range.lt(before);
        }
        Some(range)
    }

    /// Start of the follow-up window for a given last timestamp.
    #[must_use]
    pub fn window_start(last_timestamp: &str) -> DateTime<Utc> {
        timestamp::rewind(timestamp::parse(last_timestamp), tailing_time_window())
    }

    /// Follow-up query: documents at or after `last_timestamp` minus the
    /// tailing window, minus the ids already shown within it.
    #[must_use]
    pub fn timestamp_filtered_query(&self, last_timestamp: &str, seen_ids: Vec<String>) -> QueryExpr {
        let since = timestamp::format(Self::window_start(last_timestamp));
        let window = BoolQuery::new()
            .filter(RangeQuery::new(&self.definition.timestamp_field).gte(since).into())
            .must_not(QueryExpr::Ids(seen_ids));

        BoolQuery::new()
            .filter(self.search_query())
            .filter(window.into())
            .into()
    }
}
