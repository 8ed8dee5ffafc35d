//! Departure Core - Headless Departure Board Pipeline
//!
//! This crate drives one or two dot-matrix departure displays from two
//! structurally different upstream feeds: a national rail departure board
//! (SOAP/XML) and a metro arrivals countdown (JSON). It has no hardware or
//! terminal dependencies; displays plug in through [`DisplayAdapter`].
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────── poll side (one task per screen) ─────────────────────┐
//! │                                                                                │
//! │  ┌──────────────┐   RawPayload   ┌────────────┐  DepartureSnapshot  ┌────────┐ │
//! │  │ SourceClient │ ─────────────► │ normalize  │ ──────────────────► │ Poller │ │
//! │  │ (retrying)   │                │ (pure)     │                     └───┬────┘ │
//! │  └──────────────┘                └────────────┘                         │      │
//! └─────────────────────────────────────────────────────────────────────────┼──────┘
//!                                                                           │
//!                                  BoardEvent::{SnapshotUpdated, SnapshotFailed}
//!                                                                           ▼
//!                                                                    ┌────────────┐
//!                                                                    │  EventBus  │
//!                                                                    └─────┬──────┘
//!                                                                          ▼
//!                                                             ┌─────────────────────┐
//!                                                             │ DepartureQueue (×N) │
//!                                                             │ single slot, latest │
//!                                                             └──────────┬──────────┘
//! ┌──────────────────────── render side (one task, fixed rate) ─────────┼──────────┐
//! │                                                                      ▼          │
//! │   ┌──────────────────────┐      DrawBatch      ┌───────────────────────────┐   │
//! │   │ DisplayRenderer (×N) │ ──────────────────► │ DisplayAdapter (hardware) │   │
//! │   └──────────────────────┘                     └───────────────────────────┘   │
//! └────────────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The queue is the boundary between slow, unreliable network I/O and the
//! render loop: pollers overwrite it, renderers read whatever is there and
//! never wait.
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use std::time::Duration;
//! use departure_core::{
//!     load_config, Board, FixedWidthMetrics, HeadlessAdapter, Scheduler, SystemClock,
//! };
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = load_config()?;
//!     let clock = Arc::new(SystemClock);
//!
//!     let board = Board::from_config(&config, clock.clone(), Arc::new(FixedWidthMetrics::default()))?;
//!     let handle = Scheduler::new(&config, clock).start(board, Arc::new(HeadlessAdapter::new()));
//!
//!     tokio::signal::ctrl_c().await?;
//!     handle.shutdown(Duration::from_secs(5)).await;
//!     Ok(())
//! }
//! ```
//!
//! # Module Overview
//!
//! - [`model`]: Stations, services and immutable snapshots
//! - [`clock`]: Wall-clock abstraction
//! - [`hours`]: Daily hour windows with midnight wrap
//! - [`source`]: Feed clients, line status client and retry with backoff
//! - [`normalize`]: Payload to snapshot mapping
//! - [`bus`]: In-process publish/subscribe
//! - [`queue`]: Per-screen latest-snapshot slot
//! - [`poller`]: Scheduled departure and line status fetches per screen
//! - [`render`]: Layout, scrolling, status banner and fallback states
//! - [`hardware`]: Display adapter boundary
//! - [`scheduler`]: Assembly and task orchestration
//! - [`config`]: TOML configuration loading

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod bus;
pub mod clock;
pub mod config;
pub mod hardware;
pub mod hours;
pub mod model;
pub mod normalize;
pub mod poller;
pub mod queue;
pub mod render;
pub mod scheduler;
pub mod source;

// Model exports
pub use model::{
    CallingPoint, DepartureSnapshot, Freshness, LineStatus, LiveTime, ScreenId, Service, Station,
    TransportMode,
};

pub use clock::{Clock, ManualClock, SystemClock};
pub use hours::{HoursParseError, HoursWindow};

// Source exports
pub use source::{
    FetchError, LineStatusClient, RailClient, RawPayload, RetryPolicy, RetryingClient, SourceClient,
    StatusSource, TransitClient,
};

pub use normalize::{normalize, parse_line_status, NormalizationError, NormalizeOptions};

// Event bus and queue exports
pub use bus::{BoardEvent, EventBus, EventKind, FailureKind, PublishResult, SubscriptionId};
pub use queue::{DepartureQueue, QueueStatus};

pub use poller::{LineStatusPoller, PollOutcome, Poller, PollerState, StatusOutcome};

// Render exports
pub use hardware::{DisplayAdapter, HeadlessAdapter, RenderError};
pub use render::{
    BannerPhase, DisplayRenderer, DisplayState, DrawBatch, DrawCommand, FixedWidthMetrics,
    FontStyle, Rect, RenderSettings, RowRoller, Scene, ScrollConfig, ScrollPhase, ScrollState,
    StatusBanner, TextMetrics,
};

pub use scheduler::{
    Board, BoxedClient, BoxedStatusSource, Scheduler, SchedulerHandle, ShutdownReport,
};

// Config exports
pub use config::{
    default_config_path, load_config, load_config_from_path, BoardConfig, BoardToml, ConfigError,
    ConfigOverrides, ConfigSource, LineStatusSettings, RailSettings, ScreenConfig,
    TransitSettings,
};
