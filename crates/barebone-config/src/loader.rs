//! Configuration loader.

use std::fs;
use std::path::Path;

use url::Url;

use crate::error::ConfigError;
use crate::schema::TrackerConfig;

/// Configuration loader with environment variable substitution.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<TrackerConfig, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::load_str(&content)
    }

    /// Load configuration from a string.
    pub fn load_str(content: &str) -> Result<TrackerConfig, ConfigError> {
        let expanded = Self::expand_env_vars(content)?;
        let config: TrackerConfig = toml::from_str(&expanded)?;
        config.validate()?;
        Ok(config)
    }

    /// Read `client_id` and `environment` from the query string of the
    /// script URL that embeds the tracker, e.g.
    /// `https://cdn.example.com/bareboneanalytics-tracker.js?client_id=abc&environment=staging`.
    ///
    /// Fields not carried by the URL are taken from `base`.
    pub fn from_script_src(src: &str, base: TrackerConfig) -> Result<TrackerConfig, ConfigError> {
        let url = Url::parse(src).map_err(|e| ConfigError::InvalidScriptSource(e.to_string()))?;

        let mut config = base;
        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "client_id" => config.client_id = Some(value.into_owned()),
                "environment" if !value.is_empty() => config.environment = value.into_owned(),
                _ => {}
            }
        }

        config.validate()?;
        Ok(config)
    }

    /// Expand environment variables in the format `${VAR}`.
    fn expand_env_vars(content: &str) -> Result<String, ConfigError> {
        let mut result = content.to_string();
        let re = regex::Regex::new(r"\$\{([^}]+)\}")
            .map_err(|e| ConfigError::invalid("pattern", e.to_string()))?;

        for cap in re.captures_iter(content) {
            let var_name = &cap[1];
            let var_value = std::env::var(var_name)
                .map_err(|_| ConfigError::EnvVarNotSet(var_name.to_string()))?;
            result = result.replace(&cap[0], &var_value);
        }

        Ok(result)
    }
}
