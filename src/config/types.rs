//! Configuration types.

use serde::{Deserialize, Serialize};

use crate::format::DEFAULT_FORMAT;

/// Default search endpoint.
pub const DEFAULT_URL: &str = "http://127.0.0.1:9200";

/// Default index-name pattern.
pub const DEFAULT_INDEX_PATTERN: &str = "logstash-[0-9].*";

/// Default separator of the date embedded in index names.
pub const DEFAULT_INDEX_DATE_SEPARATOR: &str = ".";

/// Default timestamp field.
pub const DEFAULT_TIMESTAMP_FIELD: &str = "@timestamp";

/// Default number of entries fetched by the initial search.
pub const DEFAULT_INITIAL_ENTRIES: usize = 50;

/// Kibana version announced in proxy mode.
pub const DEFAULT_KIBANA_VERSION: &str = "6.2.4";

/// Where and how to reach the search backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchTarget {
    /// Search endpoint URL.
    pub url: String,
    /// Local tunnel endpoint; set at runtime only.
    #[serde(skip)]
    pub tunnel_url: Option<String>,
    /// Regular expression selecting candidate indices.
    pub index_pattern: String,
    /// Separator of the date embedded in index names.
    pub index_date_separator: String,
    /// PEM client certificate for TLS.
    pub cert: Option<String>,
    /// PEM private key for TLS.
    pub key: Option<String>,
    /// Extra `Name: value` request headers.
    pub extra_headers: Vec<String>,
    /// Route searches through a Kibana proxy with cookie authentication.
    pub kibana: bool,
    /// Version sent in the `kbn-version` header.
    pub kibana_version: String,
}

impl Default for SearchTarget {
    fn default() -> Self {
        Self {
            url: DEFAULT_URL.to_string(),
            tunnel_url: None,
            index_pattern: DEFAULT_INDEX_PATTERN.to_string(),
            index_date_separator: DEFAULT_INDEX_DATE_SEPARATOR.to_string(),
            cert: None,
            key: None,
            extra_headers: Vec::new(),
            kibana: false,
            kibana_version: DEFAULT_KIBANA_VERSION.to_string(),
        }
    }
}

/// What to search for and how to display it. Immutable for a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryDefinition {
    /// Free-text terms, joined with spaces into a query string.
    pub terms: Vec<String>,
    /// Field holding each document's timestamp.
    pub timestamp_field: String,
    /// Inclusive lower bound.
    pub after: Option<String>,
    /// Exclusive upper bound.
    pub before: Option<String>,
    /// Display template.
    pub format: String,
}

impl Default for QueryDefinition {
    fn default() -> Self {
        Self {
            terms: Vec::new(),
            timestamp_field: DEFAULT_TIMESTAMP_FIELD.to_string(),
            after: None,
            before: None,
            format: DEFAULT_FORMAT.to_string(),
        }
    }
}

impl QueryDefinition {
    #[must_use]
    pub fn is_date_time_filtered(&self) -> bool {
        self.after.is_some() || self.before.is_some()
    }
}

/// Full configuration of one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Configuration {
    pub search_target: SearchTarget,
    pub query_definition: QueryDefinition,
    pub initial_entries: usize,
    pub follow: bool,
    pub raw: bool,
    pub user: Option<String>,
    pub password: Option<String>,
    /// `[localport:][user@]sshhost[:sshport]`.
    pub ssh_tunnel: Option<String>,
    pub save_query: bool,
    /// 0 = warn, 1 = info, 2 = debug, 3+ = trace with request tracing.
    pub verbosity: u8,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            search_target: SearchTarget::default(),
            query_definition: QueryDefinition::default(),
            initial_entries: DEFAULT_INITIAL_ENTRIES,
            follow: false,
            raw: false,
            user: None,
            password: None,
            ssh_tunnel: None,
            save_query: false,
            verbosity: 0,
        }
    }
}

impl Configuration {
    /// Runs once without following when not asked to follow, or when the
    /// query is bounded by dates.
    #[must_use]
    pub fn is_list_only(&self) -> bool {
        !self.follow || self.query_definition.is_date_time_filtered()
    }

    #[must_use]
    pub fn trace_requests(&self) -> bool {
        self.verbosity >= 3
    }

    /// Endpoint the client should connect to: the tunnel if one is up.
    #[must_use]
    pub fn effective_url(&self) -> &str {
        self.search_target
            .tunnel_url
            .as_deref()
            .unwrap_or(&self.search_target.url)
    }

    /// Settings that survive between invocations.
    #[must_use]
    pub fn saved_settings(&self) -> SavedSettings {
        SavedSettings {
            terms: self.query_definition.terms.clone(),
            timestamp_field: self.query_definition.timestamp_field.clone(),
            user: self.user.clone(),
            password: self.password.clone(),
            ssh_tunnel: self.ssh_tunnel.clone(),
            search_target: self.search_target.clone(),
        }
    }

    /// Overwrite connection settings with previously saved ones.
    pub fn apply_saved(&mut self, saved: SavedSettings) {
        self.search_target = saved.search_target;
        self.query_definition.terms = saved.terms;
        self.query_definition.timestamp_field = saved.timestamp_field;
        self.user = saved.user;
        self.password = saved.password;
        self.ssh_tunnel = saved.ssh_tunnel;
    }
}

/// Connection-relevant settings persisted between invocations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SavedSettings {
    pub terms: Vec<String>,
    pub timestamp_field: String,
    pub user: Option<String>,
    pub password: Option<String>,
    pub ssh_tunnel: Option<String>,
    pub search_target: SearchTarget,
}

impl Default for SavedSettings {
    fn default() -> Self {
        Configuration::default().saved_settings()
    }
}
