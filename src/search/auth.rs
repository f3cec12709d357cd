//! Cookie-based session authentication against a Kibana gateway.

use std::path::{Path, PathBuf};

use reqwest::header::{HeaderMap, SET_COOKIE, USER_AGENT};
use reqwest::Client;

use super::error::SearchError;

/// Name of the gateway's session cookie.
pub const SESSION_COOKIE: &str = "sid-auth";

/// File name of the persisted session cookie.
const COOKIE_FILE: &str = "auth.cookie";

/// Username and password for the gateway login form or basic auth.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub user: String,
    pub password: String,
}

impl Credentials {
    /// Parse curl-style `user:password`. A missing password is empty.
    #[must_use]
    pub fn parse(value: &str) -> Self {
        let (user, password) = value.split_once(':').unwrap_or((value, ""));
        Self {
            user: user.to_string(),
            password: password.to_string(),
        }
    }
}

/// On-disk store for the session cookie.
#[derive(Debug, Clone)]
pub struct CookieStore {
    path: PathBuf,
}

impl CookieStore {
    #[must_use]
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Store located in the user's config directory.
    #[must_use]
    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join(COOKIE_FILE))
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stored token, if any.
    #[must_use]
    pub fn load(&self) -> Option<String> {
        std::fs::read_to_string(&self.path)
            .ok()
            .map(|token| token.trim().to_string())
            .filter(|token| !token.is_empty())
    }

    /// Persist a token, creating the parent directory if needed.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the directory or file cannot be written.
    pub fn save(&self, token: &str) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, token)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&self.path, std::fs::Permissions::from_mode(0o600))?;
        }
        Ok(())
    }
}

/// Extract the session cookie value from `Set-Cookie` headers.
#[must_use]
pub fn session_cookie(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .filter_map(|cookie| cookie.split(';').next())
        .filter_map(|pair| pair.split_once('='))
        .find(|(name, _)| name.trim() == SESSION_COOKIE)
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Log in through the gateway's form endpoint and return the session token.
///
/// # Errors
///
/// Returns [`SearchError::Transport`] if the request fails and
/// [`SearchError::BadCredentials`] if no session cookie is issued.
pub async fn authenticate(
    client: &Client,
    base_url: &str,
    credentials: &Credentials,
    kibana_version: &str,
) -> Result<String, SearchError> {
    let url = format!("{}/login", base_url.trim_end_matches('/'));
    tracing::info!(url = %url, user = %credentials.user, "Authenticating against gateway");

    let response = client
        .post(&url)
        .header("kbn-version", kibana_version)
        .header(USER_AGENT, "elktail")
        .form(&[
            ("username", credentials.user.as_str()),
            ("password", credentials.password.as_str()),
        ])
        .send()
        .await?;

    session_cookie(response.headers()).ok_or(SearchError::BadCredentials)
}
