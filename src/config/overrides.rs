//! Merging of command-line values with saved defaults.

use super::types::{Configuration, SavedSettings};
use crate::search::Credentials;

/// Values given on the command line. `None` and empty mean "not given".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Overrides {
    pub url: Option<String>,
    pub index_pattern: Option<String>,
    pub timestamp_field: Option<String>,
    /// `user[:password]`.
    pub user: Option<String>,
    pub ssh_tunnel: Option<String>,
    pub index_date_separator: Option<String>,
    pub headers: Vec<String>,
    pub cert: Option<String>,
    pub key: Option<String>,
    pub kibana: bool,
    pub follow: bool,
    pub initial_entries: Option<usize>,
    pub after: Option<String>,
    pub before: Option<String>,
    pub format: Option<String>,
    pub raw: bool,
    pub save_query: bool,
    pub verbosity: u8,
    pub terms: Vec<String>,
}

impl Overrides {
    /// Whether any connection setting was given, in which case saved
    /// defaults are ignored.
    #[must_use]
    pub fn has_connection_settings(&self) -> bool {
        self.url.is_some()
            || self.index_pattern.is_some()
            || self.timestamp_field.is_some()
            || self.user.is_some()
            || self.ssh_tunnel.is_some()
    }
}

/// Configuration for this run plus the settings to persist for the next one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub config: Configuration,
    pub to_save: SavedSettings,
}

/// Build the run configuration.
///
/// Saved settings apply only when no connection setting was given. Query
/// terms given without `save_query` are AND-ed onto saved terms for this run
/// only; with `save_query` they replace the saved terms.
#[must_use]
pub fn resolve(overrides: Overrides, saved: Option<SavedSettings>) -> Resolved {
    let mut config = Configuration::default();

    if !overrides.has_connection_settings() {
        if let Some(saved) = saved {
            tracing::info!(url = %saved.search_target.url, "Using saved connection settings");
            config.apply_saved(saved);
        }
    }

    let target = &mut config.search_target;
    if let Some(url) = overrides.url {
        target.url = url;
    }
    if let Some(pattern) = overrides.index_pattern {
        target.index_pattern = pattern;
    }
    if let Some(separator) = overrides.index_date_separator {
        target.index_date_separator = separator;
    }
    if !overrides.headers.is_empty() {
        target.extra_headers = overrides.headers;
    }
    if overrides.cert.is_some() {
        target.cert = overrides.cert;
    }
    if overrides.key.is_some() {
        target.key = overrides.key;
    }
    if overrides.kibana {
        target.kibana = true;
    }

    let query = &mut config.query_definition;
    if let Some(field) = overrides.timestamp_field {
        query.timestamp_field = field;
    }
    query.after = overrides.after;
    query.before = overrides.before;
    if let Some(format) = overrides.format {
        query.format = format;
    }

    if let Some(user) = overrides.user {
        let credentials = Credentials::parse(&user);
        config.user = Some(credentials.user);
        config.password = Some(credentials.password).filter(|p| !p.is_empty());
    }
    if overrides.ssh_tunnel.is_some() {
        config.ssh_tunnel = overrides.ssh_tunnel;
    }
    if let Some(n) = overrides.initial_entries {
        config.initial_entries = n;
    }
    config.follow = overrides.follow;
    config.raw = overrides.raw;
    config.save_query = overrides.save_query;
    config.verbosity = overrides.verbosity;

    let to_save = if overrides.save_query {
        config.query_definition.terms = overrides.terms;
        tracing::debug!(terms = config.query_definition.terms.len(), "Saving query terms");
        config.saved_settings()
    } else {
        let to_save = config.saved_settings();
        if !overrides.terms.is_empty() {
            let terms = &mut config.query_definition.terms;
            if !terms.is_empty() {
                terms.push("AND".to_string());
            }
            terms.extend(overrides.terms);
        }
        to_save
    };

    Resolved { config, to_save }
}
