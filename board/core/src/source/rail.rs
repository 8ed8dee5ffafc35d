//! National Rail Source
//!
//! Client for the national rail live departure board web service. The
//! service speaks SOAP: we post a `GetDepBoardWithDetails` envelope and hand
//! the XML response back untouched.

use std::time::Duration;

use async_trait::async_trait;

use super::{FetchError, RawPayload, SourceClient};
use crate::config::RailSettings;
use crate::model::{Station, TransportMode};

/// Rail departure board client
#[derive(Clone)]
pub struct RailClient {
    /// SOAP endpoint
    endpoint: String,
    /// Access token
    api_key: String,
    /// Per-request timeout
    timeout: Duration,
    /// Rows to ask the board for
    rows: u32,
    /// Look-ahead window in minutes
    time_window_mins: u32,
    /// Offset from now in minutes
    time_offset_mins: i32,
    /// HTTP client
    http_client: reqwest::Client,
}

impl RailClient {
    /// Create a client from settings, with a per-screen time offset
    #[must_use]
    pub fn new(settings: &RailSettings, time_offset_mins: i32) -> Self {
        Self {
            endpoint: settings.endpoint.clone(),
            api_key: settings.api_key.clone(),
            timeout: settings.timeout,
            rows: settings.rows_requested,
            time_window_mins: settings.time_window_mins,
            time_offset_mins,
            http_client: reqwest::Client::new(),
        }
    }

    /// Build the request envelope
    fn build_envelope(&self, station: &Station) -> String {
        // The board filters server-side only by station code
        let filter_crs = station
            .destination
            .as_deref()
            .map(str::trim)
            .filter(|d| d.len() == 3 && d.chars().all(|c| c.is_ascii_alphabetic()))
            .unwrap_or("");

        format!(
            r#"<?xml version="1.0" encoding="utf-8"?>
<soap:Envelope xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/" xmlns:typ="http://thalesgroup.com/RTTI/2013-11-28/Token/types" xmlns:ldb="http://thalesgroup.com/RTTI/2017-10-01/ldb/">
  <soap:Header>
    <typ:AccessToken>
      <typ:TokenValue>{token}</typ:TokenValue>
    </typ:AccessToken>
  </soap:Header>
  <soap:Body>
    <ldb:GetDepBoardWithDetailsRequest>
      <ldb:numRows>{rows}</ldb:numRows>
      <ldb:crs>{crs}</ldb:crs>
      <ldb:filterCrs>{filter}</ldb:filterCrs>
      <ldb:filterType>to</ldb:filterType>
      <ldb:timeOffset>{offset}</ldb:timeOffset>
      <ldb:timeWindow>{window}</ldb:timeWindow>
    </ldb:GetDepBoardWithDetailsRequest>
  </soap:Body>
</soap:Envelope>"#,
            token = escape_xml(&self.api_key),
            rows = self.rows,
            crs = escape_xml(&station.code),
            filter = escape_xml(filter_crs),
            offset = self.time_offset_mins,
            window = self.time_window_mins,
        )
    }
}

#[async_trait]
impl SourceClient for RailClient {
    fn name(&self) -> &'static str {
        "rail"
    }

    fn mode(&self) -> TransportMode {
        TransportMode::Rail
    }

    async fn fetch(&self, station: &Station) -> Result<RawPayload, FetchError> {
        tracing::debug!(station = %station.code, endpoint = %self.endpoint, "Requesting rail board");

        let response = self
            .http_client
            .post(&self.endpoint)
            .timeout(self.timeout)
            .header(reqwest::header::CONTENT_TYPE, "text/xml; charset=utf-8")
            .body(self.build_envelope(station))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::HttpError(status.as_u16()));
        }

        let body = response.text().await?;
        Ok(RawPayload::Rail(body))
    }
}

/// Escape text for inclusion in an XML element
fn escape_xml(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
