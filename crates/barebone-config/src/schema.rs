//! Configuration schema definitions.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Attribute that marks an element as a trackable product.
pub const DEFAULT_MARKER_ATTRIBUTE: &str = "barebone-analytics-data-product-id";

/// Tracker configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackerConfig {
    /// Client identifier. Tracking is disabled when absent or empty.
    #[serde(default)]
    pub client_id: Option<String>,

    #[serde(default = "default_environment")]
    pub environment: String,

    /// Collector endpoint receiving the JSON events.
    #[serde(default = "default_collector_url")]
    pub collector_url: String,

    #[serde(default = "default_marker_attribute")]
    pub marker_attribute: String,

    /// Visible fraction of an element that counts as an impression.
    #[serde(default = "default_visibility_threshold")]
    pub visibility_threshold: f64,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// File backing the user identifier. The CLI falls back to
    /// `~/.barebone/storage.json` when unset.
    #[serde(default)]
    pub storage_path: Option<String>,
}

fn default_environment() -> String {
    "production".to_string()
}

fn default_collector_url() -> String {
    "https://your-server/api/track".to_string()
}

fn default_marker_attribute() -> String {
    DEFAULT_MARKER_ATTRIBUTE.to_string()
}

fn default_visibility_threshold() -> f64 {
    0.5
}

fn default_request_timeout() -> u64 {
    10
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            environment: default_environment(),
            collector_url: default_collector_url(),
            marker_attribute: default_marker_attribute(),
            visibility_threshold: default_visibility_threshold(),
            request_timeout_secs: default_request_timeout(),
            storage_path: None,
        }
    }
}

impl TrackerConfig {
    /// Config with the given client id and every other field defaulted.
    pub fn with_client_id(client_id: impl Into<String>) -> Self {
        Self {
            client_id: Some(client_id.into()),
            ..Self::default()
        }
    }

    /// Client id, if set and non-empty.
    pub fn client_id(&self) -> Option<&str> {
        self.client_id.as_deref().filter(|id| !id.is_empty())
    }

    /// Whether tracking should start at all.
    pub fn is_enabled(&self) -> bool {
        self.client_id().is_some()
    }

    /// Storage path with `~` expanded.
    pub fn storage_path(&self) -> Option<PathBuf> {
        self.storage_path
            .as_deref()
            .filter(|p| !p.is_empty())
            .map(|p| PathBuf::from(shellexpand::tilde(p).to_string()))
    }

    /// Check value ranges. A missing client id is not a validation error.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let threshold = self.visibility_threshold;
        if !(threshold > 0.0 && threshold <= 1.0) {
            return Err(ConfigError::invalid(
                "visibility_threshold",
                format!("{} is outside (0, 1]", threshold),
            ));
        }

        if self.marker_attribute.trim().is_empty() {
            return Err(ConfigError::invalid("marker_attribute", "must not be empty"));
        }

        if self.environment.is_empty() {
            return Err(ConfigError::invalid("environment", "must not be empty"));
        }

        url::Url::parse(&self.collector_url)
            .map_err(|e| ConfigError::invalid("collector_url", e.to_string()))?;

        Ok(())
    }
}
