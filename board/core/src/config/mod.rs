//! TOML Configuration File Support
//!
//! Loads the board configuration from a TOML file at
//! `~/.config/departure-board/board.toml`.
//!
//! # Configuration Priority
//!
//! Configuration values are loaded with the following priority (highest first):
//! 1. CLI arguments (applied by the daemon through [`ConfigOverrides`])
//! 2. Environment variables
//! 3. TOML configuration file
//! 4. Default values
//!
//! # Example Configuration
//!
//! ```toml
//! target_fps = 70
//! stale_after_secs = 600
//! scroll_pause_ms = 1000
//!
//! [retry]
//! max_attempts = 3
//! initial_backoff_ms = 1000
//!
//! [rail]
//! api_key = "00000000-0000-0000-0000-000000000000"
//! poll_interval_secs = 180
//!
//! [transit]
//! app_key = "abc123"
//! poll_interval_secs = 90
//!
//! [transit.status]
//! enabled = true
//! query_interval_secs = 300
//!
//! [[screens]]
//! station = "EAL"
//! name = "Ealing Broadway"
//! mode = "rail"
//! destination = "RDG"
//! operating_hours = "6-23"
//! blank_hours = "1-5"
//!
//! [[screens]]
//! station = "940GZZLUNFD"
//! name = "Northfields"
//! mode = "transit"
//! platform = "1"
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::hours::{self, HoursWindow};
use crate::model::{ScreenId, Station, TransportMode};
use crate::normalize::NormalizeOptions;
use crate::render::ScrollConfig;
use crate::source::RetryPolicy;

/// Most screens one board process drives
pub const MAX_SCREENS: usize = 2;

/// Highest accepted frame rate
pub const MAX_TARGET_FPS: u32 = 1000;

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur when loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file at {path}: {source}")]
    ReadError {
        /// The path that was attempted
        path: PathBuf,
        /// The underlying IO error
        source: std::io::Error,
    },

    /// Failed to parse TOML
    #[error("Failed to parse TOML config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

// =============================================================================
// Configuration Source Tracking
// =============================================================================

/// Tracks where a configuration value came from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigSource {
    /// Value from command-line argument
    Cli,
    /// Value from environment variable
    Env,
    /// Value from TOML configuration file
    File,
    /// Default value
    Default,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cli => write!(f, "CLI"),
            Self::Env => write!(f, "environment"),
            Self::File => write!(f, "config file"),
            Self::Default => write!(f, "default"),
        }
    }
}

// =============================================================================
// TOML Configuration Structures
// =============================================================================

/// Retry section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryToml {
    /// Total fetch attempts per poll
    pub max_attempts: Option<u32>,

    /// First retry delay in milliseconds
    pub initial_backoff_ms: Option<u64>,

    /// Longest retry delay in milliseconds
    pub max_backoff_ms: Option<u64>,

    /// Delay growth factor
    pub backoff_multiplier: Option<f32>,

    /// Whether to add jitter to delays
    pub use_jitter: Option<bool>,
}

/// Rail section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RailToml {
    /// Access token for the departure board service
    pub api_key: Option<String>,

    /// SOAP endpoint
    pub endpoint: Option<String>,

    /// Seconds between polls
    pub poll_interval_secs: Option<u64>,

    /// Per-request timeout in seconds
    pub timeout_secs: Option<u64>,

    /// Rows to request from the board
    pub rows_requested: Option<u32>,

    /// Look-ahead window in minutes
    pub time_window_mins: Option<u32>,
}

/// Transit section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TransitToml {
    /// Application ID
    pub app_id: Option<String>,

    /// Application key
    pub app_key: Option<String>,

    /// API base URL
    pub endpoint: Option<String>,

    /// Seconds between polls
    pub poll_interval_secs: Option<u64>,

    /// Per-request timeout in seconds
    pub timeout_secs: Option<u64>,

    /// Direction filter for line queries (`inbound`, `outbound`, `all`)
    pub direction: Option<String>,

    /// Restrict to these line IDs
    pub lines: Option<Vec<String>>,

    /// Line status section
    pub status: LineStatusToml,
}

/// `[transit.status]` section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LineStatusToml {
    /// Show line status messages on transit screens
    pub enabled: Option<bool>,

    /// Seconds between status queries
    pub query_interval_secs: Option<u64>,

    /// Seconds each of the 2nd and 3rd departures holds the shared row
    /// while a status message is up
    pub alternate_interval_secs: Option<u64>,

    /// Line to query; defaults to the line of the first departure
    pub line: Option<String>,
}

/// One `[[screens]]` entry of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScreenToml {
    /// Station code
    pub station: Option<String>,

    /// Station name shown on fallback and out-of-hours signage
    pub name: Option<String>,

    /// Feed driving this screen
    pub mode: Option<TransportMode>,

    /// Platform filter
    pub platform: Option<String>,

    /// Destination filter
    pub destination: Option<String>,

    /// Hours during which departures are fetched and shown, e.g. `"6-23"`
    pub operating_hours: Option<String>,

    /// Hours during which the screen is blank, e.g. `"23-5"`
    pub blank_hours: Option<String>,

    /// Departure rows shown
    pub max_rows: Option<usize>,

    /// Draw the first departure in bold
    pub bold_first_row: Option<bool>,

    /// Prefix rows with "1st", "2nd", ...
    pub show_departure_numbers: Option<bool>,

    /// Rail board offset from now in minutes
    pub time_offset_mins: Option<i32>,

    /// Poll interval override for this screen
    pub poll_interval_secs: Option<u64>,

    /// Display width in pixels
    pub width: Option<u32>,

    /// Display height in pixels
    pub height: Option<u32>,
}

/// Top-level TOML configuration structure
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BoardToml {
    /// Frames per second
    pub target_fps: Option<u32>,

    /// Seconds between effective frame rate log lines
    pub fps_log_interval_secs: Option<u64>,

    /// Age in seconds after which a snapshot is replaced by fallback text
    pub stale_after_secs: Option<u64>,

    /// Render to the log instead of hardware
    pub headless: Option<bool>,

    /// Pixels a scrolling row moves per frame
    pub scroll_step_px: Option<u32>,

    /// Milliseconds a scrolling row holds at each end
    pub scroll_pause_ms: Option<u64>,

    /// Retry configuration section
    pub retry: RetryToml,

    /// Rail configuration section
    pub rail: RailToml,

    /// Transit configuration section
    pub transit: TransitToml,

    /// Screen entries, in display order
    pub screens: Vec<ScreenToml>,
}

// =============================================================================
// Main Configuration Structs
// =============================================================================

/// Settings shared by every rail screen
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RailSettings {
    /// Access token
    pub api_key: String,
    /// SOAP endpoint
    pub endpoint: String,
    /// Default poll interval
    pub poll_interval: Duration,
    /// Per-request timeout
    pub timeout: Duration,
    /// Rows requested from the board
    pub rows_requested: u32,
    /// Look-ahead window in minutes
    pub time_window_mins: u32,
}

impl Default for RailSettings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            endpoint: "https://lite.realtime.nationalrail.co.uk/OpenLDBWS/ldb11.asmx".to_string(),
            poll_interval: Duration::from_secs(180),
            timeout: Duration::from_secs(10),
            rows_requested: 10,
            time_window_mins: 120,
        }
    }
}

/// Settings shared by every transit screen
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransitSettings {
    /// Application ID (optional for the public API)
    pub app_id: String,
    /// Application key
    pub app_key: String,
    /// API base URL
    pub endpoint: String,
    /// Default poll interval
    pub poll_interval: Duration,
    /// Per-request timeout
    pub timeout: Duration,
    /// Direction filter for line queries
    pub direction: String,
    /// Line IDs to restrict to; empty means every line at the stop
    pub lines: Vec<String>,
    /// Line status messages
    pub status: LineStatusSettings,
}

/// Line status messages shown in place of the third departure
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LineStatusSettings {
    /// Whether transit screens query and show line status
    pub enabled: bool,
    /// Time between status queries
    pub query_interval: Duration,
    /// Time each of the 2nd and 3rd departures holds the shared row while a
    /// message is up
    pub alternate_interval: Duration,
    /// Line ID to query; `None` follows the first departure's line
    pub line: Option<String>,
}

impl Default for LineStatusSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            query_interval: Duration::from_secs(300),
            alternate_interval: Duration::from_secs(5),
            line: None,
        }
    }
}

impl Default for TransitSettings {
    fn default() -> Self {
        Self {
            app_id: String::new(),
            app_key: String::new(),
            endpoint: "https://api.tfl.gov.uk".to_string(),
            poll_interval: Duration::from_secs(90),
            timeout: Duration::from_secs(10),
            direction: "all".to_string(),
            lines: Vec::new(),
            status: LineStatusSettings::default(),
        }
    }
}

/// Configuration of one physical screen
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScreenConfig {
    /// Screen number
    pub id: ScreenId,
    /// Station and filters
    pub station: Station,
    /// Feed driving this screen
    pub mode: TransportMode,
    /// Fetch and show departures only inside this window
    pub operating_hours: Option<HoursWindow>,
    /// Blank the screen inside this window
    pub blank_hours: Option<HoursWindow>,
    /// Departure rows shown
    pub max_rows: usize,
    /// Draw the first departure in bold
    pub bold_first_row: bool,
    /// Prefix rows with ordinals
    pub show_departure_numbers: bool,
    /// Rail board offset from now in minutes
    pub time_offset_mins: i32,
    /// Poll interval override
    pub poll_interval: Option<Duration>,
    /// Display width in pixels
    pub width: u32,
    /// Display height in pixels
    pub height: u32,
}

impl ScreenConfig {
    /// A screen with default display settings
    #[must_use]
    pub fn new(id: ScreenId, station: Station, mode: TransportMode) -> Self {
        Self {
            id,
            station,
            mode,
            operating_hours: None,
            blank_hours: None,
            max_rows: 3,
            bold_first_row: true,
            show_departure_numbers: true,
            time_offset_mins: 0,
            poll_interval: None,
            width: 256,
            height: 64,
        }
    }

    /// Normalisation options derived from this screen
    #[must_use]
    pub fn normalize_options(&self) -> NormalizeOptions {
        NormalizeOptions {
            max_rows: self.max_rows,
        }
    }
}

/// Centralized configuration for the board
///
/// Use [`load_config`] to load configuration with proper priority handling.
#[derive(Clone, Debug)]
pub struct BoardConfig {
    /// Frames per second for every screen
    pub target_fps: u32,

    /// Interval between effective frame rate log lines
    pub fps_log_interval: Duration,

    /// Snapshots older than this are replaced by fallback text
    pub stale_after: Duration,

    /// Render through the logging adapter
    pub headless: bool,

    /// Pixels a scrolling row moves per frame
    pub scroll_step_px: u32,

    /// Hold at each end of a scroll
    pub scroll_pause: Duration,

    /// Retry policy applied to every source client
    pub retry: RetryPolicy,

    /// Rail feed settings
    pub rail: RailSettings,

    /// Transit feed settings
    pub transit: TransitSettings,

    /// Configured screens
    pub screens: Vec<ScreenConfig>,

    /// Path to the config file that was loaded (if any)
    pub config_file_path: Option<PathBuf>,

    /// Source of configuration values
    pub(crate) source: ConfigSource,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            target_fps: 70,
            fps_log_interval: Duration::from_secs(180),
            stale_after: Duration::from_secs(600),
            headless: false,
            scroll_step_px: 1,
            scroll_pause: Duration::from_secs(1),
            retry: RetryPolicy::default(),
            rail: RailSettings::default(),
            transit: TransitSettings::default(),
            screens: Vec::new(),
            config_file_path: None,
            source: ConfigSource::Default,
        }
    }
}

impl BoardConfig {
    /// Create a new configuration with default values
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the primary source of this configuration
    #[must_use]
    pub fn source(&self) -> ConfigSource {
        self.source
    }

    /// Duration of one frame at the target rate
    #[must_use]
    pub fn frame_period(&self) -> Duration {
        Duration::from_secs(1) / self.target_fps.max(1)
    }

    /// Scroll animation in frames at the target rate
    #[must_use]
    pub fn scroll_config(&self) -> ScrollConfig {
        let pause_ms = self.scroll_pause.as_millis() * u128::from(self.target_fps) / 1000;
        ScrollConfig {
            step_px: self.scroll_step_px,
            pause_frames: u32::try_from(pause_ms).unwrap_or(u32::MAX),
        }
    }

    /// Frames each alternating row holds at the target rate
    #[must_use]
    pub fn alternate_frames(&self) -> u32 {
        let frames = self.transit.status.alternate_interval.as_millis() * u128::from(self.target_fps) / 1000;
        u32::try_from(frames).unwrap_or(u32::MAX).max(1)
    }

    /// Poll interval for a screen: its override, or its feed's default
    #[must_use]
    pub fn poll_interval_for(&self, screen: &ScreenConfig) -> Duration {
        screen.poll_interval.unwrap_or(match screen.mode {
            TransportMode::Rail => self.rail.poll_interval,
            TransportMode::Transit => self.transit.poll_interval,
        })
    }

    /// Check the configuration can drive a board
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] describing the first problem.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::ValidationError(msg));

        if self.screens.is_empty() {
            return invalid("no screens configured".to_string());
        }
        if self.screens.len() > MAX_SCREENS {
            return invalid(format!(
                "{} screens configured, at most {MAX_SCREENS} are supported",
                self.screens.len()
            ));
        }
        if self.target_fps == 0 || self.target_fps > MAX_TARGET_FPS {
            return invalid(format!(
                "target_fps must be between 1 and {MAX_TARGET_FPS}, got {}",
                self.target_fps
            ));
        }
        if self.scroll_step_px == 0 {
            return invalid("scroll_step_px must be at least 1".to_string());
        }
        if self.retry.max_attempts == 0 {
            return invalid("retry.max_attempts must be at least 1".to_string());
        }
        if self.rail.poll_interval.is_zero() || self.transit.poll_interval.is_zero() {
            return invalid("poll_interval_secs must be greater than zero".to_string());
        }
        let status = &self.transit.status;
        if status.enabled && (status.query_interval.is_zero() || status.alternate_interval.is_zero()) {
            return invalid("transit.status intervals must be greater than zero".to_string());
        }

        for screen in &self.screens {
            if screen.station.code.trim().is_empty() {
                return invalid(format!("{}: station code is empty", screen.id));
            }
            if screen.poll_interval.is_some_and(|p| p.is_zero()) {
                return invalid(format!("{}: poll_interval_secs must be greater than zero", screen.id));
            }
            if screen.max_rows == 0 {
                return invalid(format!("{}: max_rows must be at least 1", screen.id));
            }
            if screen.width == 0 || screen.height == 0 {
                return invalid(format!("{}: display size must be non-zero", screen.id));
            }
        }

        Ok(())
    }
}

// =============================================================================
// Configuration Loading
// =============================================================================

/// Get the default configuration file path
///
/// Returns `$XDG_CONFIG_HOME/departure-board/board.toml` or
/// `~/.config/departure-board/board.toml` if `XDG_CONFIG_HOME` is not set.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("departure-board").join("board.toml"))
}

/// Load configuration from all sources with proper priority
///
/// # Errors
///
/// Returns an error if the config file exists but cannot be parsed, or the
/// resulting configuration is invalid.
pub fn load_config() -> Result<BoardConfig, ConfigError> {
    load_config_from_path(default_config_path())
}

/// Load configuration from a specific path
///
/// A missing file is not an error; defaults and environment variables are
/// used. The result is validated before it is returned.
///
/// # Errors
///
/// Returns an error if the specified config file cannot be read or parsed,
/// or the resulting configuration is invalid.
pub fn load_config_from_path(path: Option<PathBuf>) -> Result<BoardConfig, ConfigError> {
    let mut config = BoardConfig::default();

    if let Some(ref config_path) = path {
        if config_path.exists() {
            let toml_content =
                std::fs::read_to_string(config_path).map_err(|e| ConfigError::ReadError {
                    path: config_path.clone(),
                    source: e,
                })?;

            let toml_config: BoardToml = toml::from_str(&toml_content)?;
            apply_toml_config(&mut config, &toml_config)?;
            config.config_file_path = Some(config_path.clone());
            config.source = ConfigSource::File;

            tracing::info!(
                path = %config_path.display(),
                screens = config.screens.len(),
                "Loaded configuration from file"
            );
        } else {
            tracing::debug!(
                path = %config_path.display(),
                "Config file not found, using defaults"
            );
        }
    }

    apply_env_config(&mut config);
    config.validate()?;

    Ok(config)
}

/// Apply TOML configuration values to the config struct
fn apply_toml_config(config: &mut BoardConfig, toml: &BoardToml) -> Result<(), ConfigError> {
    if let Some(fps) = toml.target_fps {
        config.target_fps = fps;
    }
    if let Some(secs) = toml.fps_log_interval_secs {
        config.fps_log_interval = Duration::from_secs(secs);
    }
    if let Some(secs) = toml.stale_after_secs {
        config.stale_after = Duration::from_secs(secs);
    }
    if let Some(headless) = toml.headless {
        config.headless = headless;
    }
    if let Some(step) = toml.scroll_step_px {
        config.scroll_step_px = step;
    }
    if let Some(ms) = toml.scroll_pause_ms {
        config.scroll_pause = Duration::from_millis(ms);
    }

    // Retry settings
    if let Some(attempts) = toml.retry.max_attempts {
        config.retry.max_attempts = attempts;
    }
    if let Some(ms) = toml.retry.initial_backoff_ms {
        config.retry.initial_backoff_ms = ms;
    }
    if let Some(ms) = toml.retry.max_backoff_ms {
        config.retry.max_backoff_ms = ms;
    }
    if let Some(multiplier) = toml.retry.backoff_multiplier {
        config.retry.backoff_multiplier = multiplier;
    }
    if let Some(jitter) = toml.retry.use_jitter {
        config.retry.use_jitter = jitter;
    }

    // Rail settings
    if let Some(ref key) = toml.rail.api_key {
        config.rail.api_key.clone_from(key);
    }
    if let Some(ref endpoint) = toml.rail.endpoint {
        config.rail.endpoint.clone_from(endpoint);
    }
    if let Some(secs) = toml.rail.poll_interval_secs {
        config.rail.poll_interval = Duration::from_secs(secs);
    }
    if let Some(secs) = toml.rail.timeout_secs {
        config.rail.timeout = Duration::from_secs(secs);
    }
    if let Some(rows) = toml.rail.rows_requested {
        config.rail.rows_requested = rows;
    }
    if let Some(mins) = toml.rail.time_window_mins {
        config.rail.time_window_mins = mins;
    }

    // Transit settings
    if let Some(ref id) = toml.transit.app_id {
        config.transit.app_id.clone_from(id);
    }
    if let Some(ref key) = toml.transit.app_key {
        config.transit.app_key.clone_from(key);
    }
    if let Some(ref endpoint) = toml.transit.endpoint {
        config.transit.endpoint.clone_from(endpoint);
    }
    if let Some(secs) = toml.transit.poll_interval_secs {
        config.transit.poll_interval = Duration::from_secs(secs);
    }
    if let Some(secs) = toml.transit.timeout_secs {
        config.transit.timeout = Duration::from_secs(secs);
    }
    if let Some(ref direction) = toml.transit.direction {
        config.transit.direction.clone_from(direction);
    }
    if let Some(ref lines) = toml.transit.lines {
        config.transit.lines.clone_from(lines);
    }
    if let Some(enabled) = toml.transit.status.enabled {
        config.transit.status.enabled = enabled;
    }
    if let Some(secs) = toml.transit.status.query_interval_secs {
        config.transit.status.query_interval = Duration::from_secs(secs);
    }
    if let Some(secs) = toml.transit.status.alternate_interval_secs {
        config.transit.status.alternate_interval = Duration::from_secs(secs);
    }
    if let Some(ref line) = toml.transit.status.line {
        config.transit.status.line = Some(line.clone()).filter(|l| !l.trim().is_empty());
    }

    // Screens
    config.screens = toml
        .screens
        .iter()
        .enumerate()
        .map(|(index, screen)| screen_from_toml(index, screen))
        .collect::<Result<_, _>>()?;

    Ok(())
}

/// Build one screen from its TOML entry; `index` is 0-based
fn screen_from_toml(index: usize, toml: &ScreenToml) -> Result<ScreenConfig, ConfigError> {
    let number = u8::try_from(index + 1)
        .map_err(|_| ConfigError::ValidationError("too many screens".to_string()))?;
    let id = ScreenId::new(number);

    let code = toml.station.clone().unwrap_or_default();
    let name = toml.name.clone().unwrap_or_else(|| code.clone());
    let mut station = Station::new(code, name);
    station.platform = toml.platform.clone().filter(|p| !p.trim().is_empty());
    station.destination = toml.destination.clone().filter(|d| !d.trim().is_empty());

    let hours_field = |field: &str, value: Option<&String>| {
        hours::parse_optional(value.map(String::as_str))
            .map_err(|e| ConfigError::ValidationError(format!("{id}: {field}: {e}")))
    };

    let mut screen = ScreenConfig::new(id, station, toml.mode.unwrap_or_default());
    screen.operating_hours = hours_field("operating_hours", toml.operating_hours.as_ref())?;
    screen.blank_hours = hours_field("blank_hours", toml.blank_hours.as_ref())?;
    if let Some(rows) = toml.max_rows {
        screen.max_rows = rows;
    }
    if let Some(bold) = toml.bold_first_row {
        screen.bold_first_row = bold;
    }
    if let Some(numbers) = toml.show_departure_numbers {
        screen.show_departure_numbers = numbers;
    }
    if let Some(offset) = toml.time_offset_mins {
        screen.time_offset_mins = offset;
    }
    screen.poll_interval = toml.poll_interval_secs.map(Duration::from_secs);
    if let Some(width) = toml.width {
        screen.width = width;
    }
    if let Some(height) = toml.height {
        screen.height = height;
    }

    Ok(screen)
}

/// Apply environment variable overrides to the config
fn apply_env_config(config: &mut BoardConfig) {
    if let Ok(key) = std::env::var("DEPARTURE_RAIL_API_KEY") {
        config.rail.api_key = key;
        config.source = ConfigSource::Env;
    }
    if let Ok(id) = std::env::var("DEPARTURE_TRANSIT_APP_ID") {
        config.transit.app_id = id;
        config.source = ConfigSource::Env;
    }
    if let Ok(key) = std::env::var("DEPARTURE_TRANSIT_APP_KEY") {
        config.transit.app_key = key;
        config.source = ConfigSource::Env;
    }
    if let Ok(fps) = std::env::var("DEPARTURE_TARGET_FPS") {
        if let Ok(n) = fps.parse::<u32>() {
            config.target_fps = n;
            config.source = ConfigSource::Env;
        }
    }
}

// =============================================================================
// CLI Override Support
// =============================================================================

/// Builder for applying CLI overrides to configuration
///
/// Use this after [`load_config`] to apply command-line argument overrides,
/// then call [`BoardConfig::validate`] again.
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    /// Headless override
    pub headless: Option<bool>,

    /// Frame rate override
    pub target_fps: Option<u32>,
}

impl ConfigOverrides {
    /// Create a new empty set of overrides
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set headless override
    #[must_use]
    pub fn with_headless(mut self, headless: bool) -> Self {
        self.headless = Some(headless);
        self
    }

    /// Set frame rate override
    #[must_use]
    pub fn with_target_fps(mut self, fps: u32) -> Self {
        self.target_fps = Some(fps);
        self
    }

    /// Apply overrides to a configuration
    pub fn apply(&self, config: &mut BoardConfig) {
        if self.headless.is_some() || self.target_fps.is_some() {
            config.source = ConfigSource::Cli;
        }
        if let Some(headless) = self.headless {
            config.headless = headless;
        }
        if let Some(fps) = self.target_fps {
            config.target_fps = fps;
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    fn load(content: &str) -> Result<BoardConfig, ConfigError> {
        let file = write_config(content);
        load_config_from_path(Some(file.path().to_path_buf()))
    }

    // =========================================================================
    // Default Configuration Tests
    // =========================================================================

    #[test]
    fn test_default_config() {
        let config = BoardConfig::default();

        assert_eq!(config.target_fps, 70);
        assert_eq!(config.fps_log_interval, Duration::from_secs(180));
        assert_eq!(config.stale_after, Duration::from_secs(600));
        assert_eq!(config.rail.poll_interval, Duration::from_secs(180));
        assert_eq!(config.transit.poll_interval, Duration::from_secs(90));
        assert_eq!(config.retry, RetryPolicy::default());
        assert_eq!(config.source(), ConfigSource::Default);
    }

    #[test]
    fn test_default_config_path() {
        if let Some(p) = default_config_path() {
            assert!(p.to_string_lossy().contains("departure-board"));
            assert!(p.to_string_lossy().ends_with("board.toml"));
        }
    }

    #[test]
    fn test_default_scroll_pauses_one_second() {
        let config = BoardConfig::default();
        assert_eq!(
            config.scroll_config(),
            ScrollConfig {
                step_px: 1,
                pause_frames: 70
            }
        );
    }

    #[test]
    fn test_scroll_settings_from_file() {
        let config = load(
            r#"
target_fps = 50
scroll_step_px = 2
scroll_pause_ms = 2500

[[screens]]
station = "EAL"
"#,
        )
        .unwrap();

        assert_eq!(config.scroll_step_px, 2);
        assert_eq!(config.scroll_pause, Duration::from_millis(2500));
        assert_eq!(
            config.scroll_config(),
            ScrollConfig {
                step_px: 2,
                pause_frames: 125
            }
        );
    }

    #[test]
    fn test_line_status_settings() {
        let config = load(
            r#"
target_fps = 60

[transit.status]
enabled = true
query_interval_secs = 120
alternate_interval_secs = 3
line = "piccadilly"

[[screens]]
station = "940GZZLUNFD"
mode = "transit"
"#,
        )
        .unwrap();

        let status = &config.transit.status;
        assert!(status.enabled);
        assert_eq!(status.query_interval, Duration::from_secs(120));
        assert_eq!(status.line.as_deref(), Some("piccadilly"));
        assert_eq!(config.alternate_frames(), 180);
        assert!(!BoardConfig::default().transit.status.enabled);
    }

    #[test]
    fn test_frame_period() {
        let config = BoardConfig {
            target_fps: 50,
            ..BoardConfig::default()
        };
        assert_eq!(config.frame_period(), Duration::from_millis(20));
    }

    // =========================================================================
    // TOML Parsing Tests
    // =========================================================================

    #[test]
    fn test_parse_two_screens() {
        let config = load(
            r#"
target_fps = 40
stale_after_secs = 300

[retry]
max_attempts = 5
use_jitter = false

[rail]
api_key = "rail-token"
poll_interval_secs = 120

[[screens]]
station = "EAL"
name = "Ealing Broadway"
mode = "rail"
destination = "RDG"
operating_hours = "6-23"
time_offset_mins = 5

[[screens]]
station = "940GZZLUNFD"
name = "Northfields"
mode = "tfl"
platform = "1"
blank_hours = "23-5"
max_rows = 4
poll_interval_secs = 30
"#,
        )
        .unwrap();

        assert_eq!(config.source(), ConfigSource::File);
        assert_eq!(config.target_fps, 40);
        assert_eq!(config.stale_after, Duration::from_secs(300));
        assert_eq!(config.retry.max_attempts, 5);
        assert!(!config.retry.use_jitter);
        assert_eq!(config.rail.poll_interval, Duration::from_secs(120));
        assert_eq!(config.screens.len(), 2);

        let rail = &config.screens[0];
        assert_eq!(rail.id, ScreenId::new(1));
        assert_eq!(rail.station.code, "EAL");
        assert_eq!(rail.station.destination.as_deref(), Some("RDG"));
        assert_eq!(rail.operating_hours, HoursWindow::new(6, 23));
        assert_eq!(rail.time_offset_mins, 5);
        assert_eq!(config.poll_interval_for(rail), Duration::from_secs(120));

        let transit = &config.screens[1];
        assert_eq!(transit.id, ScreenId::new(2));
        assert_eq!(transit.mode, TransportMode::Transit);
        assert_eq!(transit.station.platform.as_deref(), Some("1"));
        assert_eq!(transit.blank_hours, HoursWindow::new(23, 5));
        assert_eq!(transit.max_rows, 4);
        assert_eq!(config.poll_interval_for(transit), Duration::from_secs(30));
    }

    #[test]
    fn test_partial_screen_uses_defaults() {
        let config = load(
            r#"
[[screens]]
station = "PAD"
"#,
        )
        .unwrap();

        let screen = &config.screens[0];
        assert_eq!(screen.station.name, "PAD");
        assert_eq!(screen.mode, TransportMode::Rail);
        assert_eq!(screen.max_rows, 3);
        assert!(screen.bold_first_row);
        assert!(screen.show_departure_numbers);
        assert_eq!((screen.width, screen.height), (256, 64));
        assert_eq!(screen.operating_hours, None);
    }

    #[test]
    fn test_empty_hours_mean_unset() {
        let config = load(
            r#"
[[screens]]
station = "PAD"
operating_hours = ""
"#,
        )
        .unwrap();
        assert_eq!(config.screens[0].operating_hours, None);
    }

    #[test]
    fn test_invalid_toml_syntax() {
        let result = load("[[screens]\nstation = ");
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_nonexistent_file_without_screens_is_invalid() {
        let result = load_config_from_path(Some(PathBuf::from("/nonexistent/board.toml")));
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    // =========================================================================
    // Validation Tests
    // =========================================================================

    #[test]
    fn test_rejects_three_screens() {
        let result = load(
            r#"
[[screens]]
station = "A"
[[screens]]
station = "B"
[[screens]]
station = "C"
"#,
        );
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_rejects_empty_station() {
        let result = load("[[screens]]\nname = \"Nowhere\"\n");
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_rejects_malformed_hours() {
        let result = load("[[screens]]\nstation = \"EAL\"\nblank_hours = \"late\"\n");
        match result {
            Err(ConfigError::ValidationError(msg)) => assert!(msg.contains("blank_hours")),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_rejects_zero_poll_interval() {
        let result = load("[[screens]]\nstation = \"EAL\"\npoll_interval_secs = 0\n");
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_rejects_zero_fps() {
        let result = load("target_fps = 0\n[[screens]]\nstation = \"EAL\"\n");
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_rejects_fps_above_limit() {
        let result = load("target_fps = 1001\n[[screens]]\nstation = \"EAL\"\n");
        match result {
            Err(ConfigError::ValidationError(msg)) => assert!(msg.contains("1000")),
            other => panic!("expected validation error, got {other:?}"),
        }

        let config = load("target_fps = 1000\n[[screens]]\nstation = \"EAL\"\n").unwrap();
        assert_eq!(config.frame_period(), Duration::from_millis(1));
    }

    #[test]
    fn test_rejects_zero_scroll_step() {
        let result = load("scroll_step_px = 0\n[[screens]]\nstation = \"EAL\"\n");
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_rejects_zero_status_interval() {
        let result = load(
            r#"
[transit.status]
enabled = true
query_interval_secs = 0

[[screens]]
station = "940GZZLUNFD"
mode = "transit"
"#,
        );
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    // =========================================================================
    // Override Tests
    // =========================================================================

    #[test]
    fn test_env_overrides_file() {
        std::env::set_var("DEPARTURE_TRANSIT_APP_ID", "from-env");

        let config = load(
            r#"
[transit]
app_id = "from-file"

[[screens]]
station = "940GZZLUNFD"
mode = "transit"
"#,
        );

        std::env::remove_var("DEPARTURE_TRANSIT_APP_ID");

        let config = config.unwrap();
        assert_eq!(config.transit.app_id, "from-env");
        assert_eq!(config.source(), ConfigSource::Env);
    }

    #[test]
    fn test_cli_overrides() {
        let mut config = BoardConfig::default();
        ConfigOverrides::new()
            .with_headless(true)
            .with_target_fps(25)
            .apply(&mut config);

        assert!(config.headless);
        assert_eq!(config.target_fps, 25);
        assert_eq!(config.source(), ConfigSource::Cli);
    }

    #[test]
    fn test_empty_overrides_keep_source() {
        let mut config = BoardConfig::default();
        ConfigOverrides::new().apply(&mut config);
        assert_eq!(config.source(), ConfigSource::Default);
    }
}
