//! Tailing engine.
//!
//! Runs the initial search, then polls for newer documents with an
//! overlapping time window and an id exclusion list so that late-indexed
//! documents are picked up without being displayed twice.

mod builder;
mod delay;
mod error;
mod indices;
mod runner;
pub mod timestamp;
mod window;

pub use builder::QueryBuilder;
pub use delay::{AdaptiveDelay, DELAY_STEP, MAX_DELAY, MIN_DELAY};
pub use error::TailError;
pub use indices::{extract_ymd_date, IndexError, IndexPattern, BOUND_DATE_SEPARATOR};
pub use runner::{resolve_indices, PollOutcome, Tail, TailState, FOLLOW_UP_PAGE_SIZE};
pub use window::{tailing_time_window, DedupWindow, DisplayedEntry, TAILING_TIME_WINDOW_MS};
