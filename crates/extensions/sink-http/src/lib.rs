//! HTTP collector sink.
//!
//! Posts each event as a JSON body to the collector URL. One request per
//! event, no retries.

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use barebone_config::TrackerConfig;
use barebone_protocols::{EventSink, TrackingEvent, TransportError};

/// Sink posting events to a remote collector.
pub struct HttpSink {
    endpoint: String,
    client: reqwest::Client,
}

impl HttpSink {
    /// Create a sink with a per-request timeout.
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::RequestFailed(format!("HTTP client setup failed: {}", e)))?;

        Ok(Self {
            endpoint: endpoint.into(),
            client,
        })
    }

    pub fn from_config(config: &TrackerConfig) -> Result<Self, TransportError> {
        Self::new(
            config.collector_url.clone(),
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl EventSink for HttpSink {
    fn name(&self) -> &str {
        "http"
    }

    async fn send(&self, event: &TrackingEvent) -> Result<(), TransportError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(event)
            .send()
            .await
            .map_err(|e| TransportError::RequestFailed(e.to_string()))?;

        if response.status().is_success() {
            debug!("Collector accepted {} event", event.event_type());
            Ok(())
        } else {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            Err(TransportError::Status { status, body })
        }
    }
}
