//! Poll loop that tails a search index.
//!
//! The first poll runs the configured query and establishes the last seen
//! timestamp. Every later poll re-queries a short window before that timestamp
//! and excludes the ids already shown in it, so documents that arrive late
//! within the window are still shown exactly once.

use std::io::Write;

use chrono::NaiveDate;

use super::builder::QueryBuilder;
use super::delay::AdaptiveDelay;
use super::error::TailError;
use super::indices::IndexPattern;
use super::timestamp;
use super::window::{DedupWindow, DisplayedEntry};
use crate::config::{QueryDefinition, SearchTarget};
use crate::display;
use crate::format::Formatter;
use crate::search::{Hit, SearchBackend, SearchError, SearchRequest, SearchResponse};

/// Page size of follow-up searches.
// TODO: page with search_after; anything past this many documents per poll is lost.
pub const FOLLOW_UP_PAGE_SIZE: usize = 9000;

/// Result of one poll.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollOutcome {
    /// Documents the search returned.
    pub hits: usize,
    /// Rendered lines of documents not shown before, in chronological order.
    pub lines: Vec<String>,
}

/// Where a run is in its lifecycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TailState {
    /// No document seen yet; polls repeat the initial search.
    #[default]
    Initial,
    /// Polls use the windowed follow-up query.
    Following,
    /// The run has finished.
    Stopped,
}

/// Resolve the indices to tail, once, before polling starts.
///
/// If the backend cannot list its indices, the configured pattern is used as
/// the index name.
///
/// # Errors
///
/// Returns an error if the pattern is not a valid regex or a required date
/// cannot be extracted.
pub async fn resolve_indices<B: SearchBackend + ?Sized>(
    backend: &B,
    target: &SearchTarget,
    query: &QueryDefinition,
    today: NaiveDate,
) -> Result<Vec<String>, TailError> {
    let pattern = IndexPattern::new(&target.index_pattern, &target.index_date_separator)?;

    let indices = match backend.list_indices().await {
        Ok(available) => pattern.select(&available, query, today)?,
        Err(e) => {
            tracing::info!(error = %e, "Could not fetch available indices, using pattern instead");
            vec![target.index_pattern.clone()]
        }
    };

    tracing::info!(indices = ?indices, "Using indices");
    Ok(indices)
}

/// Tailing controller. Owns all mutable tailing state.
pub struct Tail<B> {
    backend: B,
    query: QueryDefinition,
    indices: Vec<String>,
    formatter: Formatter,
    initial_entries: usize,
    ascending: bool,
    last_timestamp: Option<String>,
    window: DedupWindow,
    state: TailState,
}

impl<B: SearchBackend> Tail<B> {
    /// Create a tail over a fixed set of indices.
    ///
    /// Results are sorted ascending when an `after` bound is configured and
    /// descending otherwise.
    #[must_use]
    pub fn new(
        backend: B,
        query: QueryDefinition,
        indices: Vec<String>,
        formatter: Formatter,
        initial_entries: usize,
    ) -> Self {
        let ascending = query.after.is_some();
        Self {
            backend,
            query,
            indices,
            formatter,
            initial_entries,
            ascending,
            last_timestamp: None,
            window: DedupWindow::new(),
            state: TailState::Initial,
        }
    }

    #[must_use]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    #[must_use]
    pub fn indices(&self) -> &[String] {
        &self.indices
    }

    #[must_use]
    pub fn is_ascending(&self) -> bool {
        self.ascending
    }

    #[must_use]
    pub fn state(&self) -> TailState {
        self.state
    }

    #[must_use]
    pub fn last_timestamp(&self) -> Option<&str> {
        self.last_timestamp.as_deref()
    }

    #[must_use]
    pub fn window(&self) -> &DedupWindow {
        &self.window
    }

    fn builder(&self) -> QueryBuilder<'_> {
        QueryBuilder::new(&self.query)
    }

    /// Request for the initial search, sorted in the run's order.
    #[must_use]
    pub fn initial_request(&self) -> SearchRequest {
        SearchRequest {
            indices: self.indices.clone(),
            sort_field: self.query.timestamp_field.clone(),
            ascending: self.ascending,
            from: 0,
            size: self.initial_entries,
            query: self.builder().search_query(),
        }
    }

    /// Request for a follow-up search. `None` until a timestamp is known.
    ///
    /// Always sorted newest first, independent of the run's order.
    #[must_use]
    pub fn follow_up_request(&self) -> Option<SearchRequest> {
        let last = self.last_timestamp.as_deref()?;
        Some(SearchRequest {
            indices: self.indices.clone(),
            sort_field: self.query.timestamp_field.clone(),
            ascending: false,
            from: 0,
            size: FOLLOW_UP_PAGE_SIZE,
            query: self.builder().timestamp_filtered_query(last, self.window.ids()),
        })
    }

    /// Run the initial search.
    ///
    /// # Errors
    ///
    /// Returns the backend's error unchanged.
    pub async fn initial_search(&self) -> Result<SearchResponse, SearchError> {
        self.backend.search(&self.initial_request()).await
    }

    /// Render a batch in chronological order and record it in the window.
    ///
    /// `ascending` is the sort order the batch was fetched with; descending
    /// batches are walked back to front. Documents whose id is already in the
    /// window are skipped. Documents without a timestamp are recorded at the
    /// zero time and never move an existing `last_timestamp`. Returns the
    /// rendered lines.
    pub fn process_results(&mut self, response: &SearchResponse, ascending: bool) -> Vec<String> {
        tracing::trace!(
            fetched = response.hits.len(),
            total = response.total_hits,
            "Fetched page of results"
        );

        let field = self.query.timestamp_field.clone();
        let mut lines = Vec::with_capacity(response.hits.len());

        let ordered: Box<dyn Iterator<Item = &Hit>> = if ascending {
            Box::new(response.hits.iter())
        } else {
            Box::new(response.hits.iter().rev())
        };

        for hit in ordered {
            if self.window.contains_id(&hit.id) {
                tracing::trace!(id = %hit.id, "Skipping already displayed document");
                continue;
            }
            lines.push(self.formatter.render(&hit.source));

            let timestamp = match hit.timestamp(&field) {
                Some(timestamp) => {
                    if self.last_timestamp.as_deref() != Some(timestamp.as_str()) {
                        self.last_timestamp = Some(timestamp.clone());
                    }
                    timestamp
                }
                None => {
                    tracing::warn!(id = %hit.id, field = %field, "Document has no timestamp field");
                    let zero = timestamp::format(timestamp::zero());
                    self.last_timestamp.get_or_insert_with(|| zero.clone());
                    zero
                }
            };
            self.window.push(DisplayedEntry::new(timestamp, hit.id.clone()));
        }

        if let Some(last) = self.last_timestamp.as_deref() {
            let cutoff = QueryBuilder::window_start(last);
            let evicted = self.window.evict_before(cutoff);
            tracing::trace!(evicted, remaining = self.window.len(), "Drained dedup window");
            self.state = TailState::Following;
        }

        lines
    }

    /// Run one poll: the initial search until a timestamp is known, the
    /// windowed follow-up after that.
    ///
    /// # Errors
    ///
    /// Returns an error if the search fails.
    pub async fn poll(&mut self) -> Result<PollOutcome, TailError> {
        let (response, ascending) = match self.follow_up_request() {
            Some(request) => {
                tracing::debug!(query = %request.query.to_json(), "Follow-up query");
                (self.backend.search(&request).await?, false)
            }
            None => (self.initial_search().await?, self.ascending),
        };
        let lines = self.process_results(&response, ascending);
        Ok(PollOutcome {
            hits: response.hits.len(),
            lines,
        })
    }

    /// Tail to stdout.
    ///
    /// # Errors
    ///
    /// Returns on the first failed search or failed write. Without `follow`,
    /// returns after the initial search.
    pub async fn run(&mut self, follow: bool) -> Result<(), TailError> {
        let mut stdout = std::io::stdout();
        self.run_with(follow, &mut stdout).await
    }

    /// Tail into `out`.
    ///
    /// # Errors
    ///
    /// Same as [`Self::run`].
    pub async fn run_with<W: Write + Send>(
        &mut self,
        follow: bool,
        out: &mut W,
    ) -> Result<(), TailError> {
        let outcome = self.poll().await?;
        display::write_lines(out, &outcome.lines)?;

        let mut delay = AdaptiveDelay::new();
        while follow {
            tokio::time::sleep(delay.current()).await;
            let outcome = self.poll().await?;
            display::write_lines(out, &outcome.lines)?;
            let next = delay.record(outcome.hits);
            tracing::trace!(hits = outcome.hits, delay = ?next, "Next poll");
        }

        self.state = TailState::Stopped;
        Ok(())
    }
}
