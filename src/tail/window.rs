//! Dedup window of recently displayed documents.

use std::collections::{HashSet, VecDeque};

use chrono::{DateTime, Duration, Utc};

use super::timestamp;

/// Width in milliseconds of the backward-looking slice re-queried on every follow-up poll.
pub const TAILING_TIME_WINDOW_MS: i64 = 500;

/// [`TAILING_TIME_WINDOW_MS`] as a duration.
#[must_use]
pub fn tailing_time_window() -> Duration {
    Duration::milliseconds(TAILING_TIME_WINDOW_MS)
}

/// A document that has already been shown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayedEntry {
    /// Timestamp exactly as the search engine returned it.
    pub timestamp: String,
    /// Document id.
    pub id: String,
    instant: DateTime<Utc>,
}

impl DisplayedEntry {
    #[must_use]
    pub fn new(timestamp: impl Into<String>, id: impl Into<String>) -> Self {
        let timestamp = timestamp.into();
        let instant = timestamp::parse(&timestamp);
        Self {
            timestamp,
            id: id.into(),
            instant,
        }
    }

    /// Parsed form of [`Self::timestamp`].
    #[must_use]
    pub fn instant(&self) -> DateTime<Utc> {
        self.instant
    }

    #[must_use]
    pub fn is_before(&self, cutoff: DateTime<Utc>) -> bool {
        self.instant < cutoff
    }
}

/// Chronologically ordered buffer of displayed entries.
///
/// Entries are appended in chronological order, so eviction is a single scan
/// from the front. The buffer is not capped: its size follows the number of
/// documents arriving within [`tailing_time_window`].
#[derive(Debug, Clone, Default)]
pub struct DedupWindow {
    entries: VecDeque<DisplayedEntry>,
    ids: HashSet<String>,
}

impl DedupWindow {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: DisplayedEntry) {
        self.ids.insert(entry.id.clone());
        self.entries.push_back(entry);
    }

    /// Drop entries older than `cutoff`, stopping at the first one that is not.
    ///
    /// The newest entry is always kept. Returns the number of entries removed.
    pub fn evict_before(&mut self, cutoff: DateTime<Utc>) -> usize {
        let mut removed = 0;
        while self.entries.len() > 1 {
            match self.entries.front() {
                Some(front) if front.is_before(cutoff) => {
                    if let Some(old) = self.entries.pop_front() {
                        self.ids.remove(&old.id);
                    }
                    removed += 1;
                }
                _ => break,
            }
        }
        removed
    }

    /// Ids to exclude from the next follow-up query.
    #[must_use]
    pub fn ids(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.id.clone()).collect()
    }

    #[must_use]
    pub fn contains_id(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &DisplayedEntry> {
        self.entries.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window_of(entries: &[(&str, &str)]) -> DedupWindow {
        let mut window = DedupWindow::new();
        for (ts, id) in entries {
            window.push(DisplayedEntry::new(*ts, *id));
        }
        window
    }

    #[test]
    fn test_evicts_only_entries_older_than_cutoff() {
        let mut window = window_of(&[
            ("2024-01-01T10:00:00.000Z", "a"),
            ("2024-01-01T10:00:00.400Z", "b"),
            ("2024-01-01T10:00:00.600Z", "c"),
            ("2024-01-01T10:00:01.000Z", "d"),
        ]);
        let cutoff = timestamp::parse("2024-01-01T10:00:00.500Z");

        assert_eq!(window.evict_before(cutoff), 2);
        assert_eq!(window.ids(), vec!["c", "d"]);
        assert!(!window.contains_id("a"));
        assert!(window.contains_id("d"));
    }

    #[test]
    fn test_entry_at_cutoff_is_kept() {
        let mut window = window_of(&[
            ("2024-01-01T10:00:00.500Z", "a"),
            ("2024-01-01T10:00:01.000Z", "b"),
        ]);
        let cutoff = timestamp::parse("2024-01-01T10:00:00.500Z");

        assert_eq!(window.evict_before(cutoff), 0);
        assert_eq!(window.len(), 2);
    }

    #[test]
    fn test_newest_entry_is_never_evicted() {
        let mut window = window_of(&[("2024-01-01T10:00:00.000Z", "only")]);
        let cutoff = timestamp::parse("2030-01-01T00:00:00Z");

        assert_eq!(window.evict_before(cutoff), 0);
        assert!(window.contains_id("only"));
    }

    #[test]
    fn test_empty_window_eviction() {
        let mut window = DedupWindow::new();
        assert_eq!(window.evict_before(timestamp::zero()), 0);
        assert!(window.is_empty());
    }

    #[test]
    fn test_mixed_precision_compares_chronologically() {
        // "…:00Z" sorts after "…:00.1Z" as text; the window must not care.
        let mut window = window_of(&[
            ("2024-01-01T10:00:00Z", "whole"),
            ("2024-01-01T10:00:00.100Z", "fraction"),
        ]);
        let cutoff = timestamp::parse("2024-01-01T10:00:00.050Z");

        assert_eq!(window.evict_before(cutoff), 1);
        assert_eq!(window.ids(), vec!["fraction"]);
    }
}
