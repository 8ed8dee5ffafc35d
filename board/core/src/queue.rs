//! Departure Queue - Latest Known Good Snapshot
//!
//! One single-slot buffer per screen. Writes overwrite, reads never block:
//! the renderer always gets the newest snapshot (or nothing before the first
//! successful poll) and carries on.
//!
//! The slot is a `tokio::sync::watch` channel, which already has exactly
//! these semantics. Alongside the snapshot it carries a failure status so the
//! renderer can tell "fresh data" from "old data, feed currently failing",
//! and the most recent line status message for transit screens.

use std::sync::Arc;

use chrono::NaiveDateTime;
use tokio::sync::watch;

use crate::bus::{BoardEvent, EventBus, EventKind, FailureKind, SubscriptionId};
use crate::clock::Clock;
use crate::model::{DepartureSnapshot, LineStatus, ScreenId};

/// Failure bookkeeping for a screen's feed
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct QueueStatus {
    /// Kind of the most recent failure, cleared by the next snapshot
    pub last_failure: Option<FailureKind>,
    /// When the current run of failures started
    pub failing_since: Option<NaiveDateTime>,
    /// Failures in a row
    pub consecutive_failures: u32,
}

impl QueueStatus {
    /// Whether the most recent poll failed
    #[must_use]
    pub fn is_failing(&self) -> bool {
        self.last_failure.is_some()
    }
}

#[derive(Default)]
struct Slot {
    snapshot: Option<Arc<DepartureSnapshot>>,
    status: QueueStatus,
    line_status: Option<Arc<LineStatus>>,
}

/// Single-slot, overwrite-on-write snapshot buffer for one screen
///
/// Cloning yields another handle to the same slot.
#[derive(Clone)]
pub struct DepartureQueue {
    screen: ScreenId,
    slot: Arc<watch::Sender<Slot>>,
}

impl DepartureQueue {
    /// Create an empty queue for `screen`
    #[must_use]
    pub fn new(screen: ScreenId) -> Self {
        let (tx, _rx) = watch::channel(Slot::default());
        Self {
            screen,
            slot: Arc::new(tx),
        }
    }

    /// Screen this queue feeds
    #[must_use]
    pub fn screen(&self) -> ScreenId {
        self.screen
    }

    /// Replace the held snapshot and clear any failure status
    pub fn set(&self, snapshot: Arc<DepartureSnapshot>) {
        self.slot.send_modify(|slot| {
            slot.snapshot = Some(snapshot);
            slot.status = QueueStatus::default();
        });
    }

    /// Most recent snapshot, or `None` before the first [`set`](Self::set)
    #[must_use]
    pub fn latest(&self) -> Option<Arc<DepartureSnapshot>> {
        self.slot.borrow().snapshot.clone()
    }

    /// Record a failed poll; the held snapshot is kept
    pub fn mark_failed(&self, kind: FailureKind, consecutive_failures: u32, at: NaiveDateTime) {
        self.slot.send_modify(|slot| {
            slot.status.last_failure = Some(kind);
            slot.status.consecutive_failures = consecutive_failures;
            slot.status.failing_since.get_or_insert(at);
        });
    }

    /// Current failure status
    #[must_use]
    pub fn status(&self) -> QueueStatus {
        self.slot.borrow().status.clone()
    }

    /// Replace the held line status
    pub fn set_line_status(&self, status: Arc<LineStatus>) {
        self.slot.send_modify(|slot| slot.line_status = Some(status));
    }

    /// Most recent line status, if one has been fetched
    #[must_use]
    pub fn line_status(&self) -> Option<Arc<LineStatus>> {
        self.slot.borrow().line_status.clone()
    }

    /// Wire this queue to the bus: snapshot, failure and line status events
    /// for its screen update the slot
    pub fn attach(&self, bus: &EventBus, clock: Arc<dyn Clock>) -> [SubscriptionId; 3] {
        let updates = self.clone();
        let on_update = bus.subscribe(EventKind::SnapshotUpdated, move |event| {
            if let BoardEvent::SnapshotUpdated { screen, snapshot } = event {
                if *screen == updates.screen {
                    updates.set(Arc::clone(snapshot));
                }
            }
            Ok(())
        });

        let failures = self.clone();
        let on_failure = bus.subscribe(EventKind::SnapshotFailed, move |event| {
            if let BoardEvent::SnapshotFailed {
                screen,
                kind,
                consecutive_failures,
            } = event
            {
                if *screen == failures.screen {
                    failures.mark_failed(*kind, *consecutive_failures, clock.now());
                }
            }
            Ok(())
        });

        let statuses = self.clone();
        let on_status = bus.subscribe(EventKind::LineStatusUpdated, move |event| {
            if let BoardEvent::LineStatusUpdated { screen, status } = event {
                if *screen == statuses.screen {
                    statuses.set_line_status(Arc::clone(status));
                }
            }
            Ok(())
        });

        [on_update, on_failure, on_status]
    }
}

impl std::fmt::Debug for DepartureQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let slot = self.slot.borrow();
        f.debug_struct("DepartureQueue")
            .field("screen", &self.screen)
            .field("has_snapshot", &slot.snapshot.is_some())
            .field("status", &slot.status)
            .field("line_status", &slot.line_status)
            .finish()
    }
}
