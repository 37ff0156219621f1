//! Configuration for the telemetry engine.
//!
//! Resolution order mirrors the usual precedence: values from the YAML config
//! file are overridden by environment variables. A missing config file is not
//! an error (all fields have defaults), but an engine constructed from a
//! config without both an API key and a backend URL runs in disabled no-op
//! mode rather than failing into the host runtime.
//!
//! # Environment Variables
//!
//! - `PLAYBEACON_CONF_FILE`: path to the YAML config file (default: "playbeacon.yml")
//! - `PLAYBEACON_API_KEY`: backend API credential
//! - `PLAYBEACON_URL`: backend base URL
//!
//! # Config File
//!
//! ```yaml
//! api_key: "0123456789abcdef"
//! url: "https://monitoring.example.com"
//! metric_namespace: "playbook"
//! source_type_name: "playbook"
//! ```

use std::env;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};

/// Environment variable naming the config file path.
pub const CONF_FILE_ENV: &str = "PLAYBEACON_CONF_FILE";
/// Environment variable overriding the API credential.
pub const API_KEY_ENV: &str = "PLAYBEACON_API_KEY";
/// Environment variable overriding the backend base URL.
pub const URL_ENV: &str = "PLAYBEACON_URL";

/// Default config file path, relative to the working directory.
const DEFAULT_CONF_FILE: &str = "playbeacon.yml";

/// Configuration for event and metric delivery.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Backend API credential. Absent or empty disables the engine.
    pub api_key: Option<String>,
    /// Backend base URL. Absent or empty disables the engine.
    pub url: Option<String>,
    /// Namespace prepended to metric names on the wire (`<namespace>.<name>`).
    pub metric_namespace: String,
    /// Source type attached to every delivered event.
    pub source_type_name: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            url: None,
            metric_namespace: "playbook".to_string(),
            source_type_name: "playbook".to_string(),
        }
    }
}

impl TelemetryConfig {
    /// Load configuration from a YAML file.
    ///
    /// A missing file yields the defaults; an unreadable or malformed file is
    /// an error.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            debug!(path = %path.display(), "config file not found, using defaults");
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path).map_err(|e| Error::ConfigRead {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: Self = serde_yaml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from environment variables only.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    /// Load configuration from the config file named by `PLAYBEACON_CONF_FILE`
    /// (default `playbeacon.yml`), then apply environment overrides.
    pub fn load() -> Result<Self> {
        let path = env::var(CONF_FILE_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONF_FILE));
        let mut config = Self::from_file(&path)?;
        config.apply_env();
        Ok(config)
    }

    /// Apply environment variable overrides to this configuration.
    pub fn apply_env(&mut self) {
        if let Ok(key) = env::var(API_KEY_ENV) {
            if !key.is_empty() {
                self.api_key = Some(key);
            }
        }
        if let Ok(url) = env::var(URL_ENV) {
            if !url.is_empty() {
                self.url = Some(url);
            }
        }
    }

    /// Set the API credential.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Set the backend base URL.
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Returns the API credential if present and non-empty.
    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref().filter(|k| !k.is_empty())
    }

    /// Returns the backend URL if present and non-empty.
    pub fn url(&self) -> Option<&str> {
        self.url.as_deref().filter(|u| !u.is_empty())
    }

    /// Returns true when delivery is possible: both credential and URL set.
    pub fn is_enabled(&self) -> bool {
        self.api_key().is_some() && self.url().is_some()
    }
}
