//! Line Status Source
//!
//! Client for the metro line status endpoint. Like the arrivals client it
//! returns the body untouched; [`crate::normalize::status`] turns it into a
//! [`crate::model::LineStatus`].

use std::time::Duration;

use async_trait::async_trait;

use super::FetchError;
use crate::config::TransitSettings;

/// Feed of per-line status text
#[async_trait]
pub trait StatusSource: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &str;

    /// Fetch the raw status body for a line ID
    async fn fetch_status(&self, line: &str) -> Result<String, FetchError>;
}

#[async_trait]
impl<T: StatusSource + ?Sized> StatusSource for Box<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    async fn fetch_status(&self, line: &str) -> Result<String, FetchError> {
        (**self).fetch_status(line).await
    }
}

/// Line status client for the metro API
#[derive(Clone)]
pub struct LineStatusClient {
    base_url: String,
    app_id: String,
    app_key: String,
    timeout: Duration,
    http_client: reqwest::Client,
}

impl LineStatusClient {
    /// Create a client sharing the arrivals endpoint and credentials
    #[must_use]
    pub fn new(settings: &TransitSettings) -> Self {
        Self {
            base_url: settings.endpoint.trim_end_matches('/').to_string(),
            app_id: settings.app_id.clone(),
            app_key: settings.app_key.clone(),
            timeout: settings.timeout,
            http_client: reqwest::Client::new(),
        }
    }

    fn status_url(&self, line: &str) -> String {
        format!("{}/Line/{line}/Status", self.base_url)
    }

    fn query(&self) -> Vec<(&'static str, &str)> {
        [("app_id", self.app_id.as_str()), ("app_key", self.app_key.as_str())]
            .into_iter()
            .filter(|(_, value)| !value.is_empty())
            .collect()
    }
}

#[async_trait]
impl StatusSource for LineStatusClient {
    fn name(&self) -> &'static str {
        "line-status"
    }

    async fn fetch_status(&self, line: &str) -> Result<String, FetchError> {
        let url = self.status_url(line);
        tracing::debug!(line, url = %url, "Requesting line status");

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

        Ok(response.text().await?)
    }
}
