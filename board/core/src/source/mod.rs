//! Upstream Source Clients
//!
//! One client per transit feed, behind a common [`SourceClient`] trait so the
//! poller can drive either without knowing which it has. Clients return the
//! feed's raw payload untouched; turning it into departures is the
//! normalizer's job.
//!
//! # Available Sources
//!
//! - **Rail**: national rail live departure board (SOAP over HTTPS)
//! - **Transit**: metro arrivals countdown (JSON over HTTPS)
//! - **Line status**: metro line disruption text ([`StatusSource`])
//!
//! Transient failures are retried by wrapping a client in
//! [`RetryingClient`], which applies bounded exponential backoff before
//! giving up.

pub mod rail;
pub mod status;
pub mod transit;

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{Station, TransportMode};

pub use rail::RailClient;
pub use status::{LineStatusClient, StatusSource};
pub use transit::TransitClient;

/// Raw, feed-specific response body
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RawPayload {
    /// SOAP envelope from the rail feed
    Rail(String),
    /// JSON array from the transit feed
    Transit(String),
}

impl RawPayload {
    /// Which feed produced this payload
    #[must_use]
    pub fn mode(&self) -> TransportMode {
        match self {
            Self::Rail(_) => TransportMode::Rail,
            Self::Transit(_) => TransportMode::Transit,
        }
    }
}

/// Errors from a single fetch
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// The request did not complete within the client's timeout
    #[error("request timed out")]
    Timeout,

    /// The feed answered with a non-success status
    #[error("upstream returned HTTP {0}")]
    HttpError(u16),

    /// The feed could not be reached at all
    #[error("upstream unreachable: {0}")]
    Unreachable(String),

    /// The response body could not be read
    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

impl FetchError {
    /// Whether trying again could plausibly succeed
    ///
    /// Authentication and not-found responses, and bodies we cannot read,
    /// will fail the same way on every attempt.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout | Self::Unreachable(_) => true,
            Self::HttpError(status) => !matches!(status, 401 | 403 | 404),
            Self::MalformedResponse(_) => false,
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else if let Some(status) = e.status() {
            Self::HttpError(status.as_u16())
        } else if e.is_decode() || e.is_body() {
            Self::MalformedResponse(e.to_string())
        } else {
            Self::Unreachable(e.to_string())
        }
    }
}

/// A transit data feed
///
/// Each instance serves one station configuration and is driven
/// sequentially by its own poller; implementations need no interior
/// synchronisation beyond what their HTTP client already has.
#[async_trait]
pub trait SourceClient: Send + Sync {
    /// Short name for logs (e.g. "rail", "transit")
    fn name(&self) -> &str;

    /// Which feed this client talks to
    fn mode(&self) -> TransportMode;

    /// Fetch the current departures for `station`
    async fn fetch(&self, station: &Station) -> Result<RawPayload, FetchError>;
}

#[async_trait]
impl<T: SourceClient + ?Sized> SourceClient for Box<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn mode(&self) -> TransportMode {
        (**self).mode()
    }

    async fn fetch(&self, station: &Station) -> Result<RawPayload, FetchError> {
        (**self).fetch(station).await
    }
}

/// Retry behaviour for source fetches
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts including the first (at least 1)
    pub max_attempts: u32,

    /// Delay before the first retry
    pub initial_backoff_ms: u64,

    /// Upper bound on any single delay
    pub max_backoff_ms: u64,

    /// Growth factor between consecutive delays
    pub backoff_multiplier: f32,

    /// Add up to 25% random jitter to each delay
    pub use_jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 1_000,
            max_backoff_ms: 30_000,
            backoff_multiplier: 2.0,
            use_jitter: true,
        }
    }
}

impl RetryPolicy {
    /// Policy without delays, for tests
    #[must_use]
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_backoff_ms: 0,
            max_backoff_ms: 0,
            backoff_multiplier: 1.0,
            use_jitter: false,
        }
    }

    /// Delay to wait after the `retry`-th failure (0-based)
    #[must_use]
    pub fn backoff_for_attempt(&self, retry: u32) -> Duration {
        let exponent = i32::try_from(retry).unwrap_or(i32::MAX);
        let base = self.initial_backoff_ms as f64 * f64::from(self.backoff_multiplier).powi(exponent);
        let capped = base.min(self.max_backoff_ms as f64);

        let duration_ms = if self.use_jitter {
            let jitter = rand::random::<f64>() * 0.25;
            (capped * (1.0 + jitter)).min(self.max_backoff_ms as f64)
        } else {
            capped
        };

        Duration::from_millis(duration_ms as u64)
    }
}

/// Wraps a client with bounded exponential-backoff retries
pub struct RetryingClient<C> {
    inner: C,
    policy: RetryPolicy,
}

impl<C: SourceClient> RetryingClient<C> {
    /// Wrap `inner` with `policy`
    pub fn new(inner: C, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }
}

#[async_trait]
impl<C: SourceClient> SourceClient for RetryingClient<C> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn mode(&self) -> TransportMode {
        self.inner.mode()
    }

    async fn fetch(&self, station: &Station) -> Result<RawPayload, FetchError> {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match self.inner.fetch(station).await {
                Ok(payload) => {
                    if attempt > 1 {
                        tracing::info!(
                            source = self.inner.name(),
                            station = %station.code,
                            attempt,
                            "Fetch succeeded after retry"
                        );
                    }
                    return Ok(payload);
                }
                Err(e) if !e.is_retryable() || attempt >= max_attempts => {
                    tracing::warn!(
                        source = self.inner.name(),
                        station = %station.code,
                        attempt,
                        error = %e,
                        "Fetch failed, giving up"
                    );
                    return Err(e);
                }
                Err(e) => {
                    let backoff = self.policy.backoff_for_attempt(attempt - 1);
                    tracing::warn!(
                        source = self.inner.name(),
                        station = %station.code,
                        attempt,
                        max_attempts,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %e,
                        "Fetch failed, retrying"
                    );
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
            }
        }
    }
}
