//! Process-lifetime tracker context.

use barebone_config::TrackerConfig;
use barebone_protocols::TrackerError;

/// Values fixed at startup and shared by every component.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackerContext {
    pub client_id: String,
    pub environment: String,
    pub marker_attribute: String,
    pub visibility_threshold: f64,
}

impl TrackerContext {
    /// Build the context, failing with `ConfigurationMissing` when there is
    /// no client id.
    pub fn from_config(config: &TrackerConfig) -> Result<Self, TrackerError> {
        let client_id = config
            .client_id()
            .ok_or(TrackerError::ConfigurationMissing)?;
        config
            .validate()
            .map_err(|e| TrackerError::InvalidConfig(e.to_string()))?;

        Ok(Self {
            client_id: client_id.to_string(),
            environment: config.environment.clone(),
            marker_attribute: config.marker_attribute.clone(),
            visibility_threshold: config.visibility_threshold,
        })
    }
}
