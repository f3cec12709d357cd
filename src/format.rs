//! Rendering of documents through `%field` display templates.
//!
//! A template such as `%@timestamp %user.name: %message` names document fields
//! with dot paths. Tokens that cannot be resolved render as an empty string.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

/// Template used when none is configured.
pub const DEFAULT_FORMAT: &str = "%message";

/// Errors from evaluating a field path against a document.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    /// No value at the given key.
    #[error("Field '{0}' not found")]
    FieldNotFound(String),
    /// Tried to descend into a value that is not an object.
    #[error("Cannot evaluate '{0}' on a non-object value")]
    NotAnObject(String),
}

fn token_regex() -> &'static Regex {
    static TOKEN: OnceLock<Regex> = OnceLock::new();
    TOKEN.get_or_init(|| Regex::new(r"%[A-Za-z0-9@_.\-]+").expect("token regex is valid"))
}

/// Render a value for display: strings without quotes, everything else as JSON.
#[must_use]
pub fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Evaluate a dot path such as `user.name` against a document.
///
/// At each level the whole remaining path is tried as a key first, so field
/// names that themselves contain dots resolve. An empty path renders the
/// document itself.
///
/// # Errors
///
/// Returns [`FormatError::FieldNotFound`] if a key is absent or null, and
/// [`FormatError::NotAnObject`] if the path descends into a scalar or array.
pub fn evaluate(document: &Value, path: &str) -> Result<String, FormatError> {
    let mut current = document;
    let mut remaining = path;

    while !remaining.is_empty() {
        let Value::Object(map) = current else {
            return Err(FormatError::NotAnObject(remaining.to_string()));
        };

        if let Some(value) = map.get(remaining).filter(|v| !v.is_null()) {
            current = value;
            remaining = "";
            continue;
        }

        let (head, rest) = remaining.split_once('.').unwrap_or((remaining, ""));
        match map.get(head).filter(|v| !v.is_null()) {
            Some(value) => {
                current = value;
                remaining = rest;
            }
            None => return Err(FormatError::FieldNotFound(remaining.to_string())),
        }
    }

    Ok(render_value(current))
}

/// How hits are turned into output lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Formatter {
    /// Print the document source as compact JSON.
    Raw,
    /// Substitute `%field` tokens in a template.
    Template(String),
}

impl Default for Formatter {
    fn default() -> Self {
        Self::Template(DEFAULT_FORMAT.to_string())
    }
}

impl Formatter {
    #[must_use]
    pub fn new(template: &str, raw: bool) -> Self {
        if raw {
            Self::Raw
        } else {
            Self::Template(template.to_string())
        }
    }

    #[must_use]
    pub fn render(&self, document: &Value) -> String {
        match self {
            Self::Raw => document.to_string(),
            Self::Template(template) => render_template(template, document),
        }
    }
}

/// Replace every `%field` token in `template` with its value in `document`.
#[must_use]
pub fn render_template(template: &str, document: &Value) -> String {
    token_regex()
        .replace_all(template, |caps: &regex::Captures<'_>| {
            let path = &caps[0][1..];
            match evaluate(document, path) {
                Ok(value) => value,
                Err(e) => {
                    tracing::trace!(token = %path, error = %e, "Unresolved format token");
                    String::new()
                }
            }
        })
        .into_owned()
}
