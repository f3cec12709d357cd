//! Selection of date-partitioned indices.
//!
//! Index names embed a date at a sortable position (`logstash-2024.01.03`), so
//! the lexicographically greatest matching name is also the most recent one.

use chrono::NaiveDate;
use regex::Regex;

use crate::config::QueryDefinition;

/// Separator between year, month and day in after/before bounds.
pub const BOUND_DATE_SEPARATOR: &str = "-";

/// Errors that abort index selection.
#[derive(thiserror::Error, Debug)]
pub enum IndexError {
    /// No `YYYY<sep>MM<sep>DD` date found in the value.
    #[error("Failed to extract date from '{value}' (expected YYYY{separator}MM{separator}DD)")]
    DateNotFound { value: String, separator: String },

    /// The embedded date is not a valid calendar date.
    #[error("Failed to parse date '{value}': {source}")]
    InvalidDate {
        value: String,
        source: chrono::ParseError,
    },

    /// No matching index is dated within the requested range.
    #[error("No index matching '{pattern}' is dated between {start} and {end}")]
    NoIndicesInRange {
        pattern: String,
        start: NaiveDate,
        end: NaiveDate,
    },

    /// The index pattern is not a valid regular expression.
    #[error("Invalid index pattern '{pattern}': {source}")]
    InvalidPattern { pattern: String, source: regex::Error },
}

/// Extract the first year-month-day date embedded in `value`.
///
/// # Errors
///
/// Returns [`IndexError::DateNotFound`] if no date with the given separator is
/// present, or [`IndexError::InvalidDate`] if it is not a real calendar date.
pub fn extract_ymd_date(value: &str, separator: &str) -> Result<NaiveDate, IndexError> {
    let sep = regex::escape(separator);
    let date_regex = Regex::new(&format!(r"\d{{4}}{sep}\d{{2}}{sep}\d{{2}}")).map_err(|e| {
        IndexError::InvalidPattern {
            pattern: separator.to_string(),
            source: e,
        }
    })?;

    let found = date_regex
        .find(value)
        .ok_or_else(|| IndexError::DateNotFound {
            value: value.to_string(),
            separator: separator.to_string(),
        })?;

    let format = format!("%Y{separator}%m{separator}%d");
    NaiveDate::parse_from_str(found.as_str(), &format).map_err(|e| IndexError::InvalidDate {
        value: found.as_str().to_string(),
        source: e,
    })
}

/// Compiled index-name pattern together with the separator of its embedded date.
#[derive(Debug, Clone)]
pub struct IndexPattern {
    regex: Regex,
    date_separator: String,
}

impl IndexPattern {
    /// Compile an index pattern.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::InvalidPattern`] if `pattern` is not a valid regex.
    pub fn new(pattern: &str, date_separator: &str) -> Result<Self, IndexError> {
        let regex = Regex::new(pattern).map_err(|e| IndexError::InvalidPattern {
            pattern: pattern.to_string(),
            source: e,
        })?;
        Ok(Self {
            regex,
            date_separator: date_separator.to_string(),
        })
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }

    #[must_use]
    pub fn matches(&self, index: &str) -> bool {
        self.regex.is_match(index)
    }

    /// Lexicographically greatest matching index.
    #[must_use]
    pub fn find_last_index<'a>(&self, indices: &'a [String]) -> Option<&'a str> {
        indices
            .iter()
            .filter(|idx| self.matches(idx))
            .max()
            .map(String::as_str)
    }

    /// Every matching index whose embedded date lies in `[start, end]`.
    ///
    /// # Errors
    ///
    /// Returns an error if a matching index name carries no parseable date.
    pub fn find_indices_for_date_range(
        &self,
        indices: &[String],
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<String>, IndexError> {
        let mut selected = Vec::new();
        for idx in indices.iter().filter(|idx| self.matches(idx)) {
            let date = extract_ymd_date(idx, &self.date_separator)?;
            if date >= start && date <= end {
                selected.push(idx.clone());
            }
        }
        Ok(selected)
    }

    /// Resolve the indices a query should run against.
    ///
    /// Without date bounds this is the single latest index. With bounds it is
    /// every index dated within them: a missing end defaults to `today`, and a
    /// missing start defaults to the earlier of the latest index date and the
    /// end date. If nothing matches an undated query, the pattern itself is
    /// used as the index name.
    ///
    /// # Errors
    ///
    /// Returns an error if a bound or a matching index name carries no date,
    /// or if no index falls within the date range.
    pub fn select(
        &self,
        available: &[String],
        query: &QueryDefinition,
        today: NaiveDate,
    ) -> Result<Vec<String>, IndexError> {
        if !query.is_date_time_filtered() {
            return Ok(match self.find_last_index(available) {
                Some(last) => vec![last.to_string()],
                None => {
                    tracing::warn!(pattern = %self.as_str(), "No index matches pattern, using pattern as index");
                    vec![self.as_str().to_string()]
                }
            });
        }

        let end = match query.before.as_deref() {
            Some(before) => extract_ymd_date(before, BOUND_DATE_SEPARATOR)?,
            None => today,
        };

        let start = match query.after.as_deref() {
            Some(after) => extract_ymd_date(after, BOUND_DATE_SEPARATOR)?,
            None => match self.find_last_index(available) {
                Some(last) => extract_ymd_date(last, &self.date_separator)?.min(end),
                None => end,
            },
        };

        tracing::debug!(%start, %end, "Selecting indices for date range");
        let selected = self.find_indices_for_date_range(available, start, end)?;
        if selected.is_empty() {
            return Err(IndexError::NoIndicesInRange {
                pattern: self.as_str().to_string(),
                start,
                end,
            });
        }
        Ok(selected)
    }
}
