//! Tailing engine error types.

use crate::search::SearchError;

use super::indices::IndexError;

/// Errors that end a tailing run.
#[derive(thiserror::Error, Debug)]
pub enum TailError {
    /// A search failed. Never retried.
    #[error("Error in executing search query: {0}")]
    Search(#[from] SearchError),

    /// Index selection failed before polling started.
    #[error("Failed to select indices: {0}")]
    Index(#[from] IndexError),

    /// Output could not be written.
    #[error("Failed to write output: {0}")]
    Output(#[from] std::io::Error),
}
