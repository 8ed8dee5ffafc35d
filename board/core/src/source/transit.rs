//! Metro/Transit Source
//!
//! Client for the metro arrivals API. Arrivals are requested either for a
//! set of lines at a stop point or, with no lines configured, for every line
//! serving the stop.

use std::time::Duration;

use async_trait::async_trait;

use super::{FetchError, RawPayload, SourceClient};
use crate::config::TransitSettings;
use crate::model::{Station, TransportMode};

/// Transit arrivals client
#[derive(Clone)]
pub struct TransitClient {
    /// API base URL
    base_url: String,
    /// Application ID (optional for anonymous access)
    app_id: String,
    /// Application key (optional for anonymous access)
    app_key: String,
    /// Direction filter for line arrivals ("inbound", "outbound", "all")
    direction: String,
    /// Lines to query; empty means all lines at the stop
    lines: Vec<String>,
    /// Per-request timeout
    timeout: Duration,
    /// HTTP client
    http_client: reqwest::Client,
}

impl TransitClient {
    /// Create a client from settings
    #[must_use]
    pub fn new(settings: &TransitSettings) -> Self {
        Self {
            base_url: settings.endpoint.trim_end_matches('/').to_string(),
            app_id: settings.app_id.clone(),
            app_key: settings.app_key.clone(),
            direction: settings.direction.clone(),
            lines: settings.lines.clone(),
            timeout: settings.timeout,
            http_client: reqwest::Client::new(),
        }
    }

    /// Arrivals URL for a stop
    fn arrivals_url(&self, station: &Station) -> String {
        if self.lines.is_empty() {
            format!("{}/StopPoint/{}/Arrivals", self.base_url, station.code)
        } else {
            format!(
                "{}/Line/{}/Arrivals/{}",
                self.base_url,
                self.lines.join(","),
                station.code
            )
        }
    }

    /// Query parameters for the request
    fn query(&self) -> Vec<(&'static str, &str)> {
        let mut params = Vec::new();
        if !self.app_id.is_empty() {
            params.push(("app_id", self.app_id.as_str()));
        }
        if !self.app_key.is_empty() {
            params.push(("app_key", self.app_key.as_str()));
        }
        if !self.lines.is_empty() && !self.direction.is_empty() {
            params.push(("direction", self.direction.as_str()));
        }
        params
    }
}

#[async_trait]
impl SourceClient for TransitClient {
    fn name(&self) -> &'static str {
        "transit"
    }

    fn mode(&self) -> TransportMode {
        TransportMode::Transit
    }

    async fn fetch(&self, station: &Station) -> Result<RawPayload, FetchError> {
        let url = self.arrivals_url(station);
        tracing::debug!(station = %station.code, url = %url, "Requesting transit arrivals");

        let response = self
            .http_client
            .get(&url)
            .timeout(self.timeout)
            .query(&self.query())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::HttpError(status.as_u16()));
        }

        let body = response.text().await?;
        Ok(RawPayload::Transit(body))
    }
}
