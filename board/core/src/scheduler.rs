//! Scheduler - Board Assembly and Task Orchestration
//!
//! [`Board`] wires the pipeline together from configuration; [`Scheduler`]
//! runs it.
//!
//! ```text
//!   ┌──────────── poll task per screen ────────────┐
//!   │ interval(poll) ─► Poller ─► EventBus::publish │──► DepartureQueue (per screen)
//!   └───────────────────────────────────────────────┘            │
//!                                                               ▼ latest()
//!   ┌──────────────────── render task ──────────────────────────────────┐
//!   │ interval(1/fps, Skip) ─► DisplayRenderer ×N ─► DisplayAdapter     │
//!   └───────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Poll timers delay missed ticks (a slow fetch pushes the next one back,
//! never overlapping). The frame timer skips missed ticks (a slow frame is
//! dropped, never queued). All tasks stop when [`SchedulerHandle::shutdown`]
//! is called; tasks that do not finish within the grace period are aborted.
//!
//! Transit screens with line status enabled get one more poll task, feeding
//! the same queue through `LineStatusUpdated` events.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::bus::EventBus;
use crate::clock::Clock;
use crate::config::{BoardConfig, ConfigError, LineStatusSettings, ScreenConfig};
use crate::hardware::DisplayAdapter;
use crate::model::{ScreenId, TransportMode};
use crate::poller::{LineStatusPoller, Poller};
use crate::queue::DepartureQueue;
use crate::render::{DisplayRenderer, RenderSettings, TextMetrics};
use crate::source::{
    LineStatusClient, RailClient, RetryingClient, SourceClient, StatusSource, TransitClient,
};

/// Source client as held by a poller
pub type BoxedClient = Box<dyn SourceClient>;

/// Line status source as held by a status poller
pub type BoxedStatusSource = Box<dyn StatusSource>;

/// The assembled pipeline for every configured screen
pub struct Board {
    bus: EventBus,
    queues: Vec<DepartureQueue>,
    pollers: Vec<Poller<BoxedClient>>,
    status_pollers: Vec<LineStatusPoller<BoxedStatusSource>>,
    renderers: Vec<DisplayRenderer>,
    clock: Arc<dyn Clock>,
}

impl Board {
    /// Build the board with the real feed clients
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the configuration is invalid.
    pub fn from_config(
        config: &BoardConfig,
        clock: Arc<dyn Clock>,
        metrics: Arc<dyn TextMetrics>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let clients = config
            .screens
            .iter()
            .map(|screen| source_client(config, screen))
            .collect();
        let mut board = Self::with_clients(config, clients, clock, metrics)?;

        if config.transit.status.enabled {
            for screen in config.screens.iter().filter(|s| s.mode == TransportMode::Transit) {
                board.add_status_source(
                    screen,
                    &config.transit.status,
                    Box::new(LineStatusClient::new(&config.transit)),
                )?;
            }
        }
        Ok(board)
    }

    /// Build the board with one client per screen, in screen order
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the configuration is invalid or the client
    /// count does not match the screen count.
    pub fn with_clients(
        config: &BoardConfig,
        clients: Vec<BoxedClient>,
        clock: Arc<dyn Clock>,
        metrics: Arc<dyn TextMetrics>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        if clients.len() != config.screens.len() {
            return Err(ConfigError::ValidationError(format!(
                "{} clients for {} screens",
                clients.len(),
                config.screens.len()
            )));
        }

        let bus = EventBus::new();
        let mut queues = Vec::with_capacity(config.screens.len());
        let mut pollers = Vec::with_capacity(config.screens.len());
        let mut renderers = Vec::with_capacity(config.screens.len());

        for (screen, client) in config.screens.iter().zip(clients) {
            let queue = DepartureQueue::new(screen.id);
            queue.attach(&bus, Arc::clone(&clock));

            let interval = config.poll_interval_for(screen);
            tracing::info!(
                screen = %screen.id,
                station = %screen.station.code,
                mode = %screen.mode,
                source = client.name(),
                interval_secs = interval.as_secs(),
                "Screen configured"
            );

            pollers.push(Poller::new(
                screen,
                interval,
                client,
                bus.clone(),
                Arc::clone(&clock),
            ));
            renderers.push(DisplayRenderer::new(
                RenderSettings::from_screen(screen, config),
                queue.clone(),
                Arc::clone(&metrics),
            ));
            queues.push(queue);
        }

        Ok(Self {
            bus,
            queues,
            pollers,
            status_pollers: Vec::new(),
            renderers,
            clock,
        })
    }

    /// Poll `source` for line status messages shown on `screen`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if `screen` is not part of this board.
    pub fn add_status_source(
        &mut self,
        screen: &ScreenConfig,
        settings: &LineStatusSettings,
        source: BoxedStatusSource,
    ) -> Result<(), ConfigError> {
        let queue = self.queue(screen.id).cloned().ok_or_else(|| {
            ConfigError::ValidationError(format!("{} is not on this board", screen.id))
        })?;
        tracing::info!(
            screen = %screen.id,
            line = settings.line.as_deref().unwrap_or("first departure"),
            interval_secs = settings.query_interval.as_secs(),
            "Line status enabled"
        );
        self.status_pollers.push(LineStatusPoller::new(
            screen,
            settings,
            source,
            queue,
            self.bus.clone(),
            Arc::clone(&self.clock),
        ));
        Ok(())
    }

    /// The board's event bus
    #[must_use]
    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// Queue feeding `screen`
    #[must_use]
    pub fn queue(&self, screen: ScreenId) -> Option<&DepartureQueue> {
        self.queues.iter().find(|q| q.screen() == screen)
    }

    /// Number of screens
    #[must_use]
    pub fn screen_count(&self) -> usize {
        self.renderers.len()
    }

    /// Number of line status pollers
    #[must_use]
    pub fn status_poller_count(&self) -> usize {
        self.status_pollers.len()
    }
}

impl std::fmt::Debug for Board {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Board")
            .field("bus", &self.bus)
            .field("queues", &self.queues)
            .field("renderers", &self.renderers)
            .finish_non_exhaustive()
    }
}

/// Create the retrying feed client for a screen
fn source_client(config: &BoardConfig, screen: &ScreenConfig) -> BoxedClient {
    match screen.mode {
        TransportMode::Rail => {
            if config.rail.api_key.is_empty() {
                tracing::warn!(screen = %screen.id, "No rail API key configured, requests will be rejected");
            }
            Box::new(RetryingClient::new(
                RailClient::new(&config.rail, screen.time_offset_mins),
                config.retry.clone(),
            ))
        }
        TransportMode::Transit => Box::new(RetryingClient::new(
            TransitClient::new(&config.transit),
            config.retry.clone(),
        )),
    }
}

/// Runs a [`Board`]'s poll and render tasks
pub struct Scheduler {
    frame_period: Duration,
    fps_log_interval: Duration,
    clock: Arc<dyn Clock>,
}

impl Scheduler {
    /// Create a scheduler with the configured frame timing
    #[must_use]
    pub fn new(config: &BoardConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            frame_period: config.frame_period(),
            fps_log_interval: config.fps_log_interval,
            clock,
        }
    }

    /// Spawn one task per poller and one render task
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(self, board: Board, adapter: Arc<dyn DisplayAdapter>) -> SchedulerHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let mut tasks = Vec::with_capacity(board.pollers.len() + board.status_pollers.len() + 1);

        for poller in board.pollers {
            tasks.push(tokio::spawn(poller.run(shutdown_rx.clone())));
        }
        for poller in board.status_pollers {
            tasks.push(tokio::spawn(poller.run(shutdown_rx.clone())));
        }

        tracing::info!(
            screens = board.renderers.len(),
            adapter = adapter.name(),
            frame_period = ?self.frame_period,
            "Starting render loop"
        );
        tasks.push(tokio::spawn(render_loop(
            board.renderers,
            adapter,
            self,
            shutdown_rx,
        )));

        SchedulerHandle {
            shutdown: shutdown_tx,
            tasks,
        }
    }
}

async fn render_loop(
    mut renderers: Vec<DisplayRenderer>,
    adapter: Arc<dyn DisplayAdapter>,
    timing: Scheduler,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(timing.frame_period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut frames: u32 = 0;
    let mut window_start = Instant::now();

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = shutdown.changed() => break,
        }
        if *shutdown.borrow() {
            break;
        }

        let now = timing.clock.now();
        for renderer in &mut renderers {
            let batch = renderer.render_frame(now);
            if let Err(e) = adapter.draw_frame(renderer.screen(), &batch) {
                tracing::error!(screen = %renderer.screen(), error = %e, "Frame dropped");
            }
        }

        frames = frames.saturating_add(1);
        let elapsed = window_start.elapsed();
        if elapsed >= timing.fps_log_interval {
            tracing::info!(
                fps = f64::from(frames) / elapsed.as_secs_f64(),
                "Effective frame rate"
            );
            frames = 0;
            window_start = Instant::now();
        }
    }

    tracing::info!("Render loop stopped");
}

/// How a shutdown went
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Tasks that stopped on their own
    pub completed: usize,
    /// Tasks aborted after the grace period
    pub aborted: usize,
}

/// Control handle for running board tasks
#[derive(Debug)]
pub struct SchedulerHandle {
    shutdown: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl SchedulerHandle {
    /// Stop every task, waiting at most `grace` before aborting stragglers
    pub async fn shutdown(self, grace: Duration) -> ShutdownReport {
        tracing::info!(?grace, "Stopping board tasks");
        self.shutdown.send_replace(true);

        let deadline = Instant::now() + grace;
        let mut report = ShutdownReport::default();
        for mut task in self.tasks {
            match tokio::time::timeout_at(deadline, &mut task).await {
                Ok(Ok(())) => report.completed += 1,
                Ok(Err(e)) => {
                    tracing::error!(error = %e, "Board task failed");
                    report.completed += 1;
                }
                Err(_) => {
                    task.abort();
                    report.aborted += 1;
                }
            }
        }

        if report.aborted > 0 {
            tracing::warn!(aborted = report.aborted, "Board tasks aborted after grace period");
        }
        report
    }

    /// Number of tasks not yet finished
    #[must_use]
    pub fn running(&self) -> usize {
        self.tasks.iter().filter(|t| !t.is_finished()).count()
    }
}
