//! Elasticsearch client over HTTP, optionally behind a Kibana proxy.

use std::sync::{Mutex, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE, COOKIE, LOCATION};
use reqwest::{redirect, Client, Identity, RequestBuilder, Response, StatusCode};
use serde_json::{json, Value};

use super::auth::{authenticate, CookieStore, Credentials, SESSION_COOKIE};
use super::error::SearchError;
use super::types::{Hit, SearchRequest, SearchResponse};
use super::SearchBackend;
use crate::config::{config_dir, ConfigError, Configuration};

/// Connection timeout for HTTP requests.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Overall request timeout for HTTP requests.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Port appended to bare host URLs.
const DEFAULT_PORT: u16 = 9200;

/// Multi-search path when talking to Elasticsearch directly.
const MSEARCH_PATH: &str = "/_msearch";

/// Multi-search path through the Kibana proxy.
const KIBANA_MSEARCH_PATH: &str = "/elasticsearch/_msearch";

/// Add a missing `http://` scheme and, for bare plain-http hosts, the default port.
#[must_use]
pub fn normalize_url(url: &str) -> String {
    static HAS_PORT: OnceLock<Regex> = OnceLock::new();
    static BARE_HOST: OnceLock<Regex> = OnceLock::new();

    let mut url = url.trim().to_string();
    if !url.starts_with("http") {
        url = format!("http://{url}");
        tracing::trace!(url = %url, "Added http:// prefix to url");
    }

    let has_port = HAS_PORT.get_or_init(|| Regex::new(r".*:\d+").expect("port regex is valid"));
    let bare_host =
        BARE_HOST.get_or_init(|| Regex::new(r"^http://[^/]+$").expect("host regex is valid"));
    if !has_port.is_match(&url) && bare_host.is_match(&url) {
        url = format!("{url}:{DEFAULT_PORT}");
        tracing::trace!(url = %url, "No port given, added default port");
    }
    url
}

/// Split a curl-style `Name: value` header at the first colon.
///
/// Returns `None` for blank entries.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidHeader`] if the entry has no colon or is not
/// a valid HTTP header.
pub fn parse_header(header: &str) -> Result<Option<(HeaderName, HeaderValue)>, ConfigError> {
    if header.trim().is_empty() {
        return Ok(None);
    }
    let invalid = || ConfigError::InvalidHeader(header.to_string());
    let (name, value) = header.split_once(':').ok_or_else(invalid)?;
    let name = HeaderName::from_bytes(name.trim().as_bytes()).map_err(|_| invalid())?;
    let value = HeaderValue::from_str(value.trim()).map_err(|_| invalid())?;
    Ok(Some((name, value)))
}

/// Decode the first response of a multi-search reply.
///
/// # Errors
///
/// Returns [`SearchError::Query`] if the response reports an error and
/// [`SearchError::Decode`] if it has an unexpected shape.
pub fn parse_msearch_response(body: &Value) -> Result<SearchResponse, SearchError> {
    let response = body
        .get("responses")
        .and_then(Value::as_array)
        .and_then(|responses| responses.first())
        .ok_or_else(|| SearchError::Decode("missing 'responses'".to_string()))?;

    if let Some(error) = response.get("error") {
        let reason = error
            .pointer("/root_cause/0/reason")
            .or_else(|| error.get("reason"))
            .map_or_else(|| error.to_string(), crate::format::render_value);
        return Err(SearchError::Query(reason));
    }

    let hits = response
        .get("hits")
        .ok_or_else(|| SearchError::Decode("missing 'hits'".to_string()))?;

    let total_hits = match hits.get("total") {
        Some(Value::Number(n)) => n.as_u64().unwrap_or(0),
        Some(total) => total.get("value").and_then(Value::as_u64).unwrap_or(0),
        None => 0,
    };

    let hits = hits
        .get("hits")
        .and_then(Value::as_array)
        .ok_or_else(|| SearchError::Decode("missing 'hits.hits'".to_string()))?
        .iter()
        .map(|hit| {
            let id = hit
                .get("_id")
                .and_then(Value::as_str)
                .ok_or_else(|| SearchError::Decode("hit without '_id'".to_string()))?;
            let source = hit.get("_source").cloned().unwrap_or_else(|| json!({}));
            Ok(Hit::new(id, source))
        })
        .collect::<Result<Vec<_>, SearchError>>()?;

    Ok(SearchResponse::new(hits, total_hits))
}

/// HTTP search backend.
#[derive(Debug)]
pub struct ElasticClient {
    http: Client,
    base_url: String,
    headers: HeaderMap,
    credentials: Option<Credentials>,
    kibana_version: Option<String>,
    cookie_store: Option<CookieStore>,
    session: Mutex<Option<String>>,
    trace_requests: bool,
}

impl ElasticClient {
    /// Plain client for `url` with no authentication or extra headers.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(url: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            http: Self::builder().build()?,
            base_url: normalize_url(url),
            headers: HeaderMap::new(),
            credentials: None,
            kibana_version: None,
            cookie_store: None,
            session: Mutex::new(None),
            trace_requests: false,
        })
    }

    /// Client for a run configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the TLS identity cannot be loaded, a header is
    /// malformed, or the HTTP client cannot be built.
    pub fn from_config(config: &Configuration) -> Result<Self, ConfigError> {
        let target = &config.search_target;

        let mut builder = Self::builder();
        if let (Some(cert), Some(key)) = (&target.cert, &target.key) {
            builder = builder.identity(load_identity(cert, key)?);
        }

        let mut headers = HeaderMap::new();
        for header in &target.extra_headers {
            if let Some((name, value)) = parse_header(header)? {
                headers.append(name, value);
            }
        }

        let credentials = config.user.as_ref().map(|user| Credentials {
            user: user.clone(),
            password: config.password.clone().unwrap_or_default(),
        });

        let (kibana_version, cookie_store) = if target.kibana {
            (
                Some(target.kibana_version.clone()),
                config_dir().map(|dir| CookieStore::in_dir(&dir)),
            )
        } else {
            (None, None)
        };

        Ok(Self {
            http: builder.build()?,
            base_url: normalize_url(config.effective_url()),
            headers,
            credentials,
            kibana_version,
            cookie_store,
            session: Mutex::new(None),
            trace_requests: config.trace_requests(),
        })
    }

    /// Route requests through a Kibana proxy with cookie sessions.
    #[must_use]
    pub fn with_kibana(mut self, version: &str, cookie_store: Option<CookieStore>) -> Self {
        self.kibana_version = Some(version.to_string());
        self.cookie_store = cookie_store;
        self
    }

    #[must_use]
    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    #[must_use]
    pub fn is_kibana(&self) -> bool {
        self.kibana_version.is_some()
    }

    fn builder() -> reqwest::ClientBuilder {
        Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .redirect(redirect::Policy::none())
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url.trim_end_matches('/'))
    }

    /// Session token: cached, else stored, else freshly obtained.
    async fn session_token(&self) -> Option<String> {
        if let Some(token) = self.cached_session() {
            return Some(token);
        }
        if let Some(token) = self.cookie_store.as_ref().and_then(CookieStore::load) {
            self.cache_session(Some(token.clone()));
            return Some(token);
        }
        if self.credentials.is_none() {
            return None;
        }
        match self.refresh_session().await {
            Ok(token) => Some(token),
            Err(e) => {
                tracing::info!(error = %e, "No session available");
                None
            }
        }
    }

    fn cached_session(&self) -> Option<String> {
        self.session.lock().ok().and_then(|guard| guard.clone())
    }

    fn cache_session(&self, token: Option<String>) {
        if let Ok(mut guard) = self.session.lock() {
            *guard = token;
        }
    }

    /// Log in again and persist the new session cookie.
    async fn refresh_session(&self) -> Result<String, SearchError> {
        let credentials = self
            .credentials
            .as_ref()
            .ok_or(SearchError::BadCredentials)?;
        let version = self.kibana_version.as_deref().unwrap_or_default();
        let token = authenticate(&self.http, &self.base_url, credentials, version).await?;
        if let Some(store) = &self.cookie_store {
            store.save(&token)?;
        }
        self.cache_session(Some(token.clone()));
        Ok(token)
    }

    async fn decorate(&self, mut request: RequestBuilder) -> RequestBuilder {
        request = request.headers(self.headers.clone());
        if let Some(version) = &self.kibana_version {
            request = request.header("kbn-version", version);
            if let Some(token) = self.session_token().await {
                request = request.header(COOKIE, format!("{SESSION_COOKIE}={token}"));
            }
        } else if let Some(credentials) = &self.credentials {
            request = request.basic_auth(&credentials.user, Some(&credentials.password));
        }
        request
    }

    async fn check_response(&self, response: Response) -> Result<Response, SearchError> {
        let status = response.status();
        if self.trace_requests {
            tracing::trace!(url = %response.url(), status = %status, "Received response");
        }

        let to_login = status == StatusCode::FOUND
            && response
                .headers()
                .get(LOCATION)
                .and_then(|v| v.to_str().ok())
                .is_some_and(|location| location.ends_with("/login"));
        if to_login {
            self.cache_session(None);
            if let Err(e) = self.refresh_session().await {
                tracing::warn!(error = %e, "Re-authentication failed");
            }
            return Err(SearchError::AuthenticationRequired);
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SearchError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }
}

fn load_identity(cert: &str, key: &str) -> Result<Identity, ConfigError> {
    let read = |path: &str| {
        std::fs::read(path).map_err(|e| ConfigError::ReadError {
            path: path.into(),
            source: e,
        })
    };
    let cert_pem = read(cert)?;
    let key_pem = read(key)?;
    Identity::from_pkcs8_pem(&cert_pem, &key_pem).map_err(|e| ConfigError::Tls(e.to_string()))
}

#[async_trait]
impl SearchBackend for ElasticClient {
    async fn search(&self, request: &SearchRequest) -> Result<SearchResponse, SearchError> {
        let path = if self.is_kibana() {
            KIBANA_MSEARCH_PATH
        } else {
            MSEARCH_PATH
        };
        let url = self.url(path);
        let header = json!({ "index": request.indices });
        let body = format!("{header}\n{}\n", request.body_json());

        if self.trace_requests {
            tracing::trace!(url = %url, body = %body, "Sending search request");
        }

        let builder = self
            .http
            .post(&url)
            .header(CONTENT_TYPE, "application/x-ndjson")
            .body(body);
        let response = self.decorate(builder).await.send().await?;
        let response = self.check_response(response).await?;

        let json: Value = response
            .json()
            .await
            .map_err(|e| SearchError::Decode(e.to_string()))?;
        parse_msearch_response(&json)
    }

    async fn list_indices(&self) -> Result<Vec<String>, SearchError> {
        let path = if self.is_kibana() {
            "/elasticsearch/_cat/indices?format=json"
        } else {
            "/_cat/indices?format=json"
        };
        let url = self.url(path);
        if self.trace_requests {
            tracing::trace!(url = %url, "Listing indices");
        }

        let response = self.decorate(self.http.get(&url)).await.send().await?;
        let response = self.check_response(response).await?;

        let json: Value = response
            .json()
            .await
            .map_err(|e| SearchError::Decode(e.to_string()))?;
        let entries = json
            .as_array()
            .ok_or_else(|| SearchError::Decode("expected an array of indices".to_string()))?;

        Ok(entries
            .iter()
            .filter_map(|entry| entry.get("index").and_then(Value::as_str))
            .map(String::from)
            .collect())
    }
}
