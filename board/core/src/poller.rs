//! Poller - Scheduled Fetches for One Screen
//!
//! Each screen gets its own poller running in its own task, so a hung feed
//! for one screen never delays the other screen or the render loop.
//!
//! # State Machine
//!
//! ```text
//!            tick                 fetch + normalise ok
//!   Idle ───────────► Fetching ─────────────────────────► Publishing ──► Idle
//!     ▲                   │
//!     │                   │ fetch or normalise failed
//!     │    next tick      ▼
//!     └──────────── BackoffWait
//! ```
//!
//! The client has already retried by the time a failure reaches the poller,
//! so the poller adds no backoff of its own: it publishes `SnapshotFailed`
//! and waits for its next regular tick. Ticks that fall due while a fetch is
//! still running are delayed until it completes, never run concurrently.
//!
//! Transit screens with line status enabled get a second, slower
//! [`LineStatusPoller`]. It asks about the configured line, or the line of
//! the first departure in the screen's queue, and publishes
//! `LineStatusUpdated`. Its failures are logged and otherwise ignored: a
//! missing status message never affects the departures.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

use crate::bus::{BoardEvent, EventBus, FailureKind};
use crate::clock::Clock;
use crate::config::{LineStatusSettings, ScreenConfig};
use crate::hours::HoursWindow;
use crate::model::{ScreenId, Station};
use crate::normalize::{self, NormalizeOptions};
use crate::queue::DepartureQueue;
use crate::source::{SourceClient, StatusSource};

/// How soon a status poller looks again when no line is known yet
const LINE_LOOKUP_RETRY: Duration = Duration::from_secs(10);

/// Where a poller is in its cycle
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PollerState {
    /// Waiting for the next tick
    Idle,
    /// Fetch in flight
    Fetching,
    /// Publishing a new snapshot
    Publishing,
    /// Last cycle failed; waiting for the next tick
    BackoffWait,
}

/// Result of one poll cycle
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PollOutcome {
    /// A snapshot was published
    Published,
    /// The cycle failed and `SnapshotFailed` was published
    Failed(FailureKind),
    /// Outside operating hours; nothing fetched
    Skipped,
}

/// Periodic fetcher for one screen
pub struct Poller<C> {
    screen: ScreenId,
    station: Station,
    client: C,
    options: NormalizeOptions,
    operating_hours: Option<HoursWindow>,
    interval: Duration,
    bus: EventBus,
    clock: Arc<dyn Clock>,
    state: PollerState,
    consecutive_failures: u32,
}

impl<C: SourceClient> Poller<C> {
    /// Create a poller for `screen`, ticking every `interval`
    pub fn new(
        screen: &ScreenConfig,
        interval: Duration,
        client: C,
        bus: EventBus,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            screen: screen.id,
            station: screen.station.clone(),
            client,
            options: screen.normalize_options(),
            operating_hours: screen.operating_hours,
            interval,
            bus,
            clock,
            state: PollerState::Idle,
            consecutive_failures: 0,
        }
    }

    /// Current state
    #[must_use]
    pub fn state(&self) -> PollerState {
        self.state
    }

    /// Failures in a row since the last published snapshot
    #[must_use]
    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Run one fetch-normalise-publish cycle
    pub async fn poll_once(&mut self) -> PollOutcome {
        let now = self.clock.now();
        if let Some(hours) = self.operating_hours {
            if !hours.contains(now.time()) {
                tracing::debug!(screen = %self.screen, %hours, "Outside operating hours, not fetching");
                self.state = PollerState::Idle;
                return PollOutcome::Skipped;
            }
        }

        self.state = PollerState::Fetching;
        let kind = match self.client.fetch(&self.station).await {
            Ok(payload) => {
                let captured_at = self.clock.now();
                match normalize::normalize(&payload, &self.station, &self.options, captured_at) {
                    Ok(snapshot) => {
                        self.publish_snapshot(snapshot);
                        return PollOutcome::Published;
                    }
                    Err(e) => {
                        tracing::warn!(screen = %self.screen, error = %e, "Normalisation failed");
                        FailureKind::from(&e)
                    }
                }
            }
            Err(e) => {
                tracing::warn!(
                    screen = %self.screen,
                    source = self.client.name(),
                    error = %e,
                    "Fetch failed"
                );
                FailureKind::from(&e)
            }
        };

        self.publish_failure(kind);
        PollOutcome::Failed(kind)
    }

    fn publish_snapshot(&mut self, snapshot: crate::model::DepartureSnapshot) {
        self.state = PollerState::Publishing;
        tracing::info!(
            screen = %self.screen,
            station = %self.station.code,
            services = snapshot.services().len(),
            "Snapshot published"
        );
        self.bus.publish(&BoardEvent::SnapshotUpdated {
            screen: self.screen,
            snapshot: Arc::new(snapshot),
        });
        self.consecutive_failures = 0;
        self.state = PollerState::Idle;
    }

    fn publish_failure(&mut self, kind: FailureKind) {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.bus.publish(&BoardEvent::SnapshotFailed {
            screen: self.screen,
            kind,
            consecutive_failures: self.consecutive_failures,
        });
        self.state = PollerState::BackoffWait;
    }

    /// Poll on every tick until `shutdown` turns true or its sender is
    /// dropped
    ///
    /// The first tick fires immediately. A fetch still in flight when
    /// shutdown is signalled is abandoned.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        tracing::info!(
            screen = %self.screen,
            source = self.client.name(),
            interval_secs = self.interval.as_secs(),
            "Starting poller"
        );

        let screen = self.screen;
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = shutdown.changed() => break,
            }
            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                _ = self.poll_once() => {}
                _ = shutdown.changed() => {
                    tracing::debug!(%screen, "Abandoning in-flight fetch");
                    break;
                }
            }
        }

        tracing::info!(%screen, "Poller stopped");
    }
}

/// Result of one line status query
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StatusOutcome {
    /// A status message was published
    Published,
    /// No line configured and no departures to take one from yet
    NoLine,
    /// The feed had nothing for the line
    Empty,
    /// Fetch or parse failed
    Failed,
    /// Outside operating hours; nothing fetched
    Skipped,
}

/// Periodic line status fetcher for one transit screen
pub struct LineStatusPoller<S> {
    screen: ScreenId,
    source: S,
    line: Option<String>,
    queue: DepartureQueue,
    operating_hours: Option<HoursWindow>,
    interval: Duration,
    bus: EventBus,
    clock: Arc<dyn Clock>,
}

impl<S: StatusSource> LineStatusPoller<S> {
    /// Create a status poller for `screen`, reading departures from `queue`
    pub fn new(
        screen: &ScreenConfig,
        settings: &LineStatusSettings,
        source: S,
        queue: DepartureQueue,
        bus: EventBus,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            screen: screen.id,
            source,
            line: settings.line.clone(),
            queue,
            operating_hours: screen.operating_hours,
            interval: settings.query_interval,
            bus,
            clock,
        }
    }

    /// Line to query: the configured one, else the first departure's
    fn current_line(&self) -> Option<String> {
        if let Some(line) = &self.line {
            return Some(line.clone());
        }
        self.queue.latest()?.services().first()?.line_id()
    }

    /// Run one status query
    pub async fn poll_once(&mut self) -> StatusOutcome {
        if let Some(hours) = self.operating_hours {
            if !hours.contains(self.clock.now().time()) {
                return StatusOutcome::Skipped;
            }
        }

        let Some(line) = self.current_line() else {
            tracing::debug!(screen = %self.screen, "No line known yet for status query");
            return StatusOutcome::NoLine;
        };

        let body = match self.source.fetch_status(&line).await {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!(
                    screen = %self.screen,
                    source = self.source.name(),
                    line = %line,
                    error = %e,
                    "Line status fetch failed"
                );
                return StatusOutcome::Failed;
            }
        };

        match normalize::parse_line_status(&line, &body) {
            Ok(Some(status)) => {
                tracing::info!(screen = %self.screen, line = %line, "Line status published");
                self.bus.publish(&BoardEvent::LineStatusUpdated {
                    screen: self.screen,
                    status: Arc::new(status),
                });
                StatusOutcome::Published
            }
            Ok(None) => {
                tracing::debug!(screen = %self.screen, line = %line, "No status for line");
                StatusOutcome::Empty
            }
            Err(e) => {
                tracing::warn!(screen = %self.screen, line = %line, error = %e, "Line status unreadable");
                StatusOutcome::Failed
            }
        }
    }

    /// Query on every tick until `shutdown` turns true or its sender is
    /// dropped
    ///
    /// Until a line is known the poller looks again after a short delay
    /// rather than waiting a full interval.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        tracing::info!(
            screen = %self.screen,
            source = self.source.name(),
            interval_secs = self.interval.as_secs(),
            "Starting line status poller"
        );

        let screen = self.screen;
        let lookup_retry = LINE_LOOKUP_RETRY.min(self.interval);
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = shutdown.changed() => break,
            }
            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                outcome = self.poll_once() => {
                    if outcome == StatusOutcome::NoLine {
                        ticker.reset_after(lookup_retry);
                    }
                }
                _ = shutdown.changed() => {
                    tracing::debug!(%screen, "Abandoning in-flight status query");
                    break;
                }
            }
        }

        tracing::info!(%screen, "Line status poller stopped");
    }
}
