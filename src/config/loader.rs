//! Saved-defaults store.

use std::path::{Path, PathBuf};

use super::types::SavedSettings;

/// Application directory name under the user's config directory.
pub const APP_DIR: &str = "elktail";

/// File name of the saved defaults.
pub const DEFAULT_CONFIG_FILE: &str = "default.toml";

/// Directory holding saved defaults and the session cookie.
#[must_use]
pub fn config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_DIR))
}

/// Reads and writes the settings persisted between invocations.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    /// Store at `~/.config/elktail/default.toml` (platform equivalent).
    #[must_use]
    pub fn new() -> Option<Self> {
        config_dir().map(|dir| Self::with_path(dir.join(DEFAULT_CONFIG_FILE)))
    }

    /// Store at a specific path.
    #[must_use]
    pub fn with_path(path: PathBuf) -> Self {
        Self { path }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load saved settings.
    ///
    /// Returns `Ok(None)` if nothing has been saved yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(&self) -> Result<Option<SavedSettings>, ConfigError> {
        if !self.path.exists() {
            tracing::debug!(path = %self.path.display(), "No saved configuration");
            return Ok(None);
        }

        tracing::debug!(path = %self.path.display(), "Loading saved configuration");
        let content = std::fs::read_to_string(&self.path).map_err(|e| ConfigError::ReadError {
            path: self.path.clone(),
            source: e,
        })?;

        toml::from_str(&content)
            .map(Some)
            .map_err(|e| ConfigError::ParseError {
                path: self.path.clone(),
                source: e,
            })
    }

    /// Persist settings, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the settings cannot be serialized or written.
    pub fn save(&self, settings: &SavedSettings) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(settings)?;

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::WriteError {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        std::fs::write(&self.path, content).map_err(|e| ConfigError::WriteError {
            path: self.path.clone(),
            source: e,
        })?;

        // Holds credentials.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&self.path, std::fs::Permissions::from_mode(0o600)).map_err(
                |e| ConfigError::WriteError {
                    path: self.path.clone(),
                    source: e,
                },
            )?;
        }

        tracing::debug!(path = %self.path.display(), "Saved configuration");
        Ok(())
    }
}

/// Errors that can occur while loading configuration or building a client from it.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Failed to write config file {path}: {source}")]
    WriteError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to serialize configuration: {0}")]
    SerializeError(#[from] toml::ser::Error),

    #[error("Bad certificate and/or key: {0}")]
    Tls(String),

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("Invalid header '{0}' (expected 'Name: value')")]
    InvalidHeader(String),
}
