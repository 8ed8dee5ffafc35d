//! Departure Board Daemon
//!
//! Loads the board configuration, starts one poller per screen and the
//! shared render loop, then runs until told to stop.
//!
//! # Usage
//!
//! ```bash
//! # Start with the default config file
//! departure-board
//!
//! # Explicit config, no display hardware
//! departure-board --config /etc/departure-board/board.toml --headless
//!
//! # Verbose logging
//! RUST_LOG=debug departure-board
//! ```
//!
//! # Signals
//!
//! - `SIGTERM` / `SIGINT`: Graceful shutdown

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal::unix::{signal, SignalKind};
use tracing::{info, warn};

use departure_core::{
    default_config_path, load_config_from_path, Board, BoardConfig, ConfigOverrides, FixedWidthMetrics,
    HeadlessAdapter, Scheduler, SystemClock,
};

/// Time given to running tasks to stop before they are aborted
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Departure Board - live rail and metro departures on dot-matrix displays
#[derive(Parser, Debug)]
#[command(name = "departure-board")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Configuration file path
    #[arg(short = 'c', long, env = "DEPARTURE_BOARD_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Run without display hardware, logging each screen's text instead
    #[arg(long)]
    headless: bool,

    /// Override the target frame rate
    #[arg(long, value_name = "FPS")]
    fps: Option<u32>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long, env = "DEPARTURE_BOARD_LOG_LEVEL", default_value = "info")]
    log_level: String,
}

/// Initialize logging with the specified level
fn init_logging(level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(format!(
            "departure_board={level},departure_core={level}"
        ))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();
}

/// Load the config file and apply command-line overrides
fn resolve_config(args: &Args) -> Result<BoardConfig> {
    let path = args.config.clone().or_else(default_config_path);
    let mut config = load_config_from_path(path).context("Failed to load configuration")?;

    let mut overrides = ConfigOverrides::new();
    if args.headless {
        overrides = overrides.with_headless(true);
    }
    if let Some(fps) = args.fps {
        overrides = overrides.with_target_fps(fps);
    }
    overrides.apply(&mut config);
    config.validate().context("Invalid configuration after overrides")?;

    Ok(config)
}

/// Wait for SIGTERM or SIGINT
async fn wait_for_shutdown() -> Result<()> {
    let mut sigterm = signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?;
    let mut sigint = signal(SignalKind::interrupt()).context("Failed to install SIGINT handler")?;

    tokio::select! {
        _ = sigterm.recv() => info!("Received SIGTERM, initiating shutdown"),
        _ = sigint.recv() => info!("Received SIGINT, initiating shutdown"),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging first
    init_logging(&args.log_level);

    info!("Departure board starting");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let config = resolve_config(&args)?;
    info!(
        source = %config.source(),
        path = ?config.config_file_path,
        screens = config.screens.len(),
        target_fps = config.target_fps,
        "Configuration loaded"
    );

    let clock = Arc::new(SystemClock);
    let board = Board::from_config(&config, clock.clone(), Arc::new(FixedWidthMetrics::default()))
        .context("Failed to assemble board")?;

    if !config.headless {
        warn!("No display driver available in this build, rendering headless");
    }
    let adapter = Arc::new(HeadlessAdapter::new());

    let handle = Scheduler::new(&config, clock).start(board, adapter);

    let waited = wait_for_shutdown().await;

    info!("Shutting down...");
    let report = handle.shutdown(SHUTDOWN_GRACE).await;
    info!(
        completed = report.completed,
        aborted = report.aborted,
        "Departure board stopped"
    );

    waited
}
