//! Search backend capability and its Elasticsearch implementation.

mod auth;
mod client;
mod error;
mod query;
mod types;

use async_trait::async_trait;

pub use auth::{authenticate, session_cookie, CookieStore, Credentials, SESSION_COOKIE};
pub use client::{normalize_url, parse_header, parse_msearch_response, ElasticClient};
pub use error::SearchError;
pub use query::{BoolQuery, QueryExpr, RangeQuery};
pub use types::{Hit, SearchRequest, SearchResponse};

/// Capability the tailing engine polls through.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    /// Run a sorted, filtered, paginated search.
    async fn search(&self, request: &SearchRequest) -> Result<SearchResponse, SearchError>;

    /// Names of all indices known to the backend.
    async fn list_indices(&self) -> Result<Vec<String>, SearchError>;
}
