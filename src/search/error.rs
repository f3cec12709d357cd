//! Search transport error types.

/// Errors from talking to the search backend.
#[derive(thiserror::Error, Debug)]
pub enum SearchError {
    /// The request could not be sent or the connection failed.
    #[error("Search request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The backend answered with a non-success status.
    #[error("Search backend returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The backend accepted the request but reported a query error.
    #[error("Search query failed: {0}")]
    Query(String),

    /// The response body could not be decoded.
    #[error("Failed to decode search response: {0}")]
    Decode(String),

    /// The gateway redirected to its login page.
    #[error("Failed to authenticate. Please run again. If the problem persists, pass valid credentials with -u user:password")]
    AuthenticationRequired,

    /// Login did not yield a session cookie.
    #[error("Authentication failed: bad credentials")]
    BadCredentials,

    /// The session cookie could not be persisted.
    #[error("Failed to store session cookie: {0}")]
    CookieStore(#[from] std::io::Error),
}
