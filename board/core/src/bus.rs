//! Event Bus - In-Process Publish/Subscribe
//!
//! Decouples pollers from the per-screen queues. Pollers publish
//! [`BoardEvent`]s without knowing who listens; each screen subscribes the
//! handlers that feed its own queue.
//!
//! # Delivery
//!
//! ```text
//!   Poller (screen1) ──┐                         ┌──► handler A (screen1 queue)
//!                      ├──► EventBus::publish ───┼──► handler B (screen2 queue)
//!   Poller (screen2) ──┘     (synchronous)       └──► handler C (logging, tests)
//! ```
//!
//! - Delivery is synchronous, in subscription order, to every subscriber of
//!   the event's kind.
//! - A handler that returns an error or panics is logged and skipped; the
//!   remaining handlers still run and nothing propagates to the publisher.
//! - The subscriber list is copied before delivery, so handlers may
//!   subscribe or unsubscribe without deadlocking.
//!
//! # Thread Safety
//!
//! Subscribers live behind a `parking_lot::RwLock`. Publishing only takes the
//! read lock long enough to copy the handler list.

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::model::{DepartureSnapshot, LineStatus, ScreenId};
use crate::normalize::NormalizationError;
use crate::source::FetchError;

/// Why a poll cycle produced no snapshot
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// Request timed out on every attempt
    Timeout,
    /// Feed answered with an HTTP error status
    Http(u16),
    /// Feed could not be reached
    Unreachable,
    /// Response body could not be read
    MalformedResponse,
    /// Payload parsed but held no services
    NoServices,
    /// Payload could not be parsed
    MalformedPayload,
}

impl From<&FetchError> for FailureKind {
    fn from(e: &FetchError) -> Self {
        match e {
            FetchError::Timeout => Self::Timeout,
            FetchError::HttpError(status) => Self::Http(*status),
            FetchError::Unreachable(_) => Self::Unreachable,
            FetchError::MalformedResponse(_) => Self::MalformedResponse,
        }
    }
}

impl From<&NormalizationError> for FailureKind {
    fn from(e: &NormalizationError) -> Self {
        match e {
            NormalizationError::NoServices => Self::NoServices,
            NormalizationError::Malformed(_) => Self::MalformedPayload,
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout => write!(f, "timeout"),
            Self::Http(status) => write!(f, "http {status}"),
            Self::Unreachable => write!(f, "unreachable"),
            Self::MalformedResponse => write!(f, "malformed response"),
            Self::NoServices => write!(f, "no services"),
            Self::MalformedPayload => write!(f, "malformed payload"),
        }
    }
}

/// Events published by pollers
#[derive(Clone, Debug)]
pub enum BoardEvent {
    /// A poll produced a new snapshot for a screen
    SnapshotUpdated {
        /// Target screen
        screen: ScreenId,
        /// The new snapshot
        snapshot: Arc<DepartureSnapshot>,
    },

    /// A poll failed after the client's retries were exhausted
    SnapshotFailed {
        /// Target screen
        screen: ScreenId,
        /// What went wrong
        kind: FailureKind,
        /// Failures in a row for this screen, including this one
        consecutive_failures: u32,
    },

    /// A line status query returned a message for a screen
    LineStatusUpdated {
        /// Target screen
        screen: ScreenId,
        /// The fetched status
        status: Arc<LineStatus>,
    },
}

impl BoardEvent {
    /// Kind of this event, for subscription matching
    #[must_use]
    pub fn kind(&self) -> EventKind {
        match self {
            Self::SnapshotUpdated { .. } => EventKind::SnapshotUpdated,
            Self::SnapshotFailed { .. } => EventKind::SnapshotFailed,
            Self::LineStatusUpdated { .. } => EventKind::LineStatusUpdated,
        }
    }

    /// Screen this event is for
    #[must_use]
    pub fn screen(&self) -> ScreenId {
        match self {
            Self::SnapshotUpdated { screen, .. }
            | Self::SnapshotFailed { screen, .. }
            | Self::LineStatusUpdated { screen, .. } => *screen,
        }
    }
}

/// Event types a handler can subscribe to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// [`BoardEvent::SnapshotUpdated`]
    SnapshotUpdated,
    /// [`BoardEvent::SnapshotFailed`]
    SnapshotFailed,
    /// [`BoardEvent::LineStatusUpdated`]
    LineStatusUpdated,
}

/// Handle returned by [`EventBus::subscribe`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

type Handler = Arc<dyn Fn(&BoardEvent) -> anyhow::Result<()> + Send + Sync>;

struct Subscriber {
    id: SubscriptionId,
    kind: EventKind,
    handler: Handler,
}

/// Outcome of a single publish
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PublishResult {
    /// Handlers that completed
    pub delivered: usize,
    /// Handlers that returned an error or panicked
    pub failed: usize,
}

#[derive(Default)]
struct BusInner {
    subscribers: RwLock<Vec<Subscriber>>,
    next_id: AtomicU64,
}

/// In-process event bus
///
/// Cheap to clone; clones share the same subscriber list.
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

impl EventBus {
    /// Create an empty bus
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for events of `kind`
    pub fn subscribe<F>(&self, kind: EventKind, handler: F) -> SubscriptionId
    where
        F: Fn(&BoardEvent) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        self.inner.subscribers.write().push(Subscriber {
            id,
            kind,
            handler: Arc::new(handler),
        });
        tracing::debug!(subscription = %id, ?kind, "Subscribed");
        id
    }

    /// Remove a subscription; returns whether it existed
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self.inner.subscribers.write();
        let before = subscribers.len();
        subscribers.retain(|s| s.id != id);
        let removed = subscribers.len() != before;
        if removed {
            tracing::debug!(subscription = %id, "Unsubscribed");
        }
        removed
    }

    /// Deliver `event` to every subscriber of its kind
    pub fn publish(&self, event: &BoardEvent) -> PublishResult {
        let kind = event.kind();
        let handlers: Vec<(SubscriptionId, Handler)> = self
            .inner
            .subscribers
            .read()
            .iter()
            .filter(|s| s.kind == kind)
            .map(|s| (s.id, Arc::clone(&s.handler)))
            .collect();

        let mut result = PublishResult::default();
        for (id, handler) in handlers {
            match catch_unwind(AssertUnwindSafe(|| handler(event))) {
                Ok(Ok(())) => result.delivered += 1,
                Ok(Err(e)) => {
                    result.failed += 1;
                    tracing::error!(
                        subscription = %id,
                        ?kind,
                        screen = %event.screen(),
                        error = %e,
                        "Event handler failed"
                    );
                }
                Err(_) => {
                    result.failed += 1;
                    tracing::error!(
                        subscription = %id,
                        ?kind,
                        screen = %event.screen(),
                        "Event handler panicked"
                    );
                }
            }
        }
        result
    }

    /// Number of subscribers for `kind`
    #[must_use]
    pub fn subscriber_count(&self, kind: EventKind) -> usize {
        self.inner
            .subscribers
            .read()
            .iter()
            .filter(|s| s.kind == kind)
            .count()
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.inner.subscribers.read().len())
            .finish()
    }
}
