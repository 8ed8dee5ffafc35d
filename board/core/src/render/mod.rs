//! Display Renderer
//!
//! One renderer per physical screen. Every frame it reads the latest
//! snapshot from its queue, decides what the screen should say, lays that out
//! as a [`DrawBatch`] and advances the scroll animation. It never waits on
//! anything: no data simply means fallback text.
//!
//! # Scenes
//!
//! ```text
//!   blank_hours?          ──yes──► Blank         (nothing drawn, animation frozen)
//!   outside operating?    ──yes──► OutOfHours    "Welcome to" / station name
//!   nothing polled yet?   ──yes──► Startup       board name / feed attribution
//!   no snapshot or stale? ──yes──► NoData        "No data" / station name
//!   zero services?        ──yes──► NoDepartures  "No departures from <station>"
//!   otherwise                    ► Departures
//! ```
//!
//! Every scene except `Blank` and `Startup` ends with a clock row. When the feed is failing
//! but the held snapshot is still fresh, the departures stay up and the
//! clock row reads "Last updated HH:MM" instead of the time.
//!
//! # Departures layout
//!
//! ```text
//!   ┌──────────────────────────────────────────┐
//!   │ 1st 10:32 Reading             Exp 10:35  │  first departure (bold)
//!   │ Calling at: Slough (10:41), Maidenhe...  │  scrolls
//!   │ 2nd 10:45 Oxford                On time  │
//!   │ 3rd 10:51 Didcot Parkway      Cancelled  │
//!   │                 10:30:12                 │  clock row
//!   └──────────────────────────────────────────┘
//! ```
//!
//! When the queue holds a line status message that has not been shown yet
//! and there are at least three departures, the message rolls up and scrolls
//! across the third row once, while the second and third departures take
//! turns on the row above (see [`banner`]).

pub mod banner;
pub mod layout;
pub mod scroll;

use std::sync::Arc;

use chrono::NaiveDateTime;

use crate::config::{BoardConfig, ScreenConfig};
use crate::hours::HoursWindow;
use crate::model::{DepartureSnapshot, Freshness, LiveTime, ScreenId, Service, Station, TransportMode};
use crate::queue::{DepartureQueue, QueueStatus};

pub use banner::{BannerPhase, RowRoller, StatusBanner};
pub use layout::{DrawBatch, DrawCommand, FixedWidthMetrics, FontStyle, Rect, TextMetrics};
pub use scroll::{ScrollConfig, ScrollPhase, ScrollState};

const CALLING_AT: &str = "Calling at:";
const COLUMN_GAP: u32 = 6;
const BOARD_NAME: &str = "Departure Board";
const POWERED_BY: &str = "Powered by";

/// What a frame shows
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Scene {
    /// Blanking hours; nothing drawn
    Blank,
    /// Outside operating hours
    OutOfHours,
    /// Before the first poll has finished
    Startup,
    /// No usable snapshot
    NoData,
    /// Snapshot with zero services
    NoDepartures,
    /// Departure rows
    Departures,
}

/// Per-screen rendering settings
#[derive(Clone, Debug)]
pub struct RenderSettings {
    /// Screen being drawn
    pub screen: ScreenId,
    /// Station, for signage and fallback text
    pub station: Station,
    /// Feed driving the screen
    pub mode: TransportMode,
    /// Display width in pixels
    pub width: u32,
    /// Display height in pixels
    pub height: u32,
    /// Draw the first departure in bold
    pub bold_first_row: bool,
    /// Prefix rows with ordinals
    pub show_departure_numbers: bool,
    /// Departures shown only inside this window
    pub operating_hours: Option<HoursWindow>,
    /// Screen blank inside this window
    pub blank_hours: Option<HoursWindow>,
    /// Snapshots older than this fall back to "No data"
    pub stale_after: chrono::Duration,
    /// Scroll animation
    pub scroll: ScrollConfig,
    /// Frames each of the 2nd and 3rd departures holds the shared row while
    /// a line status message is up
    pub alternate_frames: u32,
}

impl RenderSettings {
    /// Derive settings for a configured screen
    #[must_use]
    pub fn from_screen(screen: &ScreenConfig, config: &BoardConfig) -> Self {
        Self {
            screen: screen.id,
            station: screen.station.clone(),
            mode: screen.mode,
            width: screen.width,
            height: screen.height,
            bold_first_row: screen.bold_first_row,
            show_departure_numbers: screen.show_departure_numbers,
            operating_hours: screen.operating_hours,
            blank_hours: screen.blank_hours,
            stale_after: chrono::Duration::from_std(config.stale_after)
                .unwrap_or_else(|_| chrono::Duration::days(365)),
            scroll: config.scroll_config(),
            alternate_frames: config.alternate_frames(),
        }
    }
}

/// Mutable per-screen render state
///
/// Owned by exactly one renderer.
#[derive(Debug)]
pub struct DisplayState {
    snapshot: Option<Arc<DepartureSnapshot>>,
    rows: Vec<ScrollState>,
    last_render: Option<NaiveDateTime>,
    stale_since: Option<NaiveDateTime>,
    scene: Option<Scene>,
    banner: Option<StatusBanner>,
    roller: Option<RowRoller>,
    last_shown_status: Option<String>,
}

impl DisplayState {
    fn new() -> Self {
        Self {
            snapshot: None,
            rows: Vec::new(),
            last_render: None,
            stale_since: None,
            scene: None,
            banner: None,
            roller: None,
            last_shown_status: None,
        }
    }

    /// Line status banner currently on screen
    #[must_use]
    pub fn banner(&self) -> Option<&StatusBanner> {
        self.banner.as_ref()
    }

    /// Last line status message shown to the end
    #[must_use]
    pub fn last_shown_status(&self) -> Option<&str> {
        self.last_shown_status.as_deref()
    }

    /// Snapshot drawn by the last frame
    #[must_use]
    pub fn snapshot(&self) -> Option<&Arc<DepartureSnapshot>> {
        self.snapshot.as_ref()
    }

    /// When the last frame was rendered
    #[must_use]
    pub fn last_render(&self) -> Option<NaiveDateTime> {
        self.last_render
    }

    /// When the held data stopped being trustworthy: the start of the
    /// current run of feed failures, or the moment the snapshot went stale
    #[must_use]
    pub fn stale_since(&self) -> Option<NaiveDateTime> {
        self.stale_since
    }

    /// Scene of the last frame
    #[must_use]
    pub fn scene(&self) -> Option<Scene> {
        self.scene
    }

    /// Scroll state of a row, by layout position
    #[must_use]
    pub fn row(&self, index: usize) -> Option<&ScrollState> {
        self.rows.get(index)
    }
}

/// Draws one screen from its departure queue
pub struct DisplayRenderer {
    settings: RenderSettings,
    queue: DepartureQueue,
    metrics: Arc<dyn TextMetrics>,
    state: DisplayState,
}

impl DisplayRenderer {
    /// Create a renderer reading from `queue`
    pub fn new(settings: RenderSettings, queue: DepartureQueue, metrics: Arc<dyn TextMetrics>) -> Self {
        Self {
            settings,
            queue,
            metrics,
            state: DisplayState::new(),
        }
    }

    /// Screen this renderer draws
    #[must_use]
    pub fn screen(&self) -> ScreenId {
        self.settings.screen
    }

    /// Current render state
    #[must_use]
    pub fn state(&self) -> &DisplayState {
        &self.state
    }

    /// Render one frame for wall-clock time `now`
    pub fn render_frame(&mut self, now: NaiveDateTime) -> DrawBatch {
        let mut batch = DrawBatch::new();
        batch.push(DrawCommand::Clear(self.full_rect()));
        self.state.last_render = Some(now);

        if self.settings.blank_hours.is_some_and(|h| h.contains(now.time())) {
            self.state.scene = Some(Scene::Blank);
            return batch;
        }

        if self.settings.operating_hours.is_some_and(|h| !h.contains(now.time())) {
            self.state.scene = Some(Scene::OutOfHours);
            self.centered(&mut batch, 0, "Welcome to", FontStyle::Regular);
            self.centered(&mut batch, 1, &self.settings.station.name, FontStyle::Bold);
            self.clock_row(&mut batch, &now.format("%H:%M:%S").to_string());
            return batch;
        }

        let latest = self.queue.latest();
        let status = self.queue.status();
        if let Some(ref snapshot) = latest {
            let changed = self
                .state
                .snapshot
                .as_ref()
                .map_or(true, |held| !Arc::ptr_eq(held, snapshot));
            if changed {
                tracing::debug!(screen = %self.settings.screen, services = snapshot.services().len(), "New snapshot");
            }
        }
        self.state.snapshot.clone_from(&latest);

        let stale = latest
            .as_ref()
            .is_some_and(|s| s.freshness(now, self.settings.stale_after) == Freshness::Stale);
        self.state.stale_since = match (&latest, status.failing_since) {
            (Some(s), _) if stale => Some(s.captured_at() + self.settings.stale_after),
            (_, since) => since,
        };

        if latest.is_none() && status == QueueStatus::default() {
            self.state.scene = Some(Scene::Startup);
            let attribution = match self.settings.mode {
                TransportMode::Rail => "National Rail Enquiries",
                TransportMode::Transit => "Transport for London",
            };
            self.centered(&mut batch, 0, BOARD_NAME, FontStyle::Bold);
            self.centered(&mut batch, 2, POWERED_BY, FontStyle::Bold);
            self.centered(&mut batch, 3, attribution, FontStyle::Bold);
            return batch;
        }

        let Some(snapshot) = latest.filter(|_| !stale) else {
            self.state.scene = Some(Scene::NoData);
            self.centered(&mut batch, 0, "No data", FontStyle::Regular);
            self.centered(&mut batch, 1, &self.settings.station.name, FontStyle::Regular);
            self.clock_row(&mut batch, &now.format("%H:%M:%S").to_string());
            return batch;
        };

        let clock = if status.is_failing() {
            format!("Last updated {}", snapshot.captured_at().format("%H:%M"))
        } else {
            now.format("%H:%M:%S").to_string()
        };

        if snapshot.is_empty() {
            self.state.scene = Some(Scene::NoDepartures);
            let text = format!("No departures from {}", self.settings.station.name);
            self.scrolling_row(&mut batch, 0, 0, &text, FontStyle::Regular, 0, self.settings.width);
        } else {
            self.state.scene = Some(Scene::Departures);
            self.update_banner(&snapshot);
            self.departure_rows(&mut batch, &snapshot);
        }
        self.clock_row(&mut batch, &clock);

        for row in &mut self.state.rows {
            row.advance();
        }
        if let Some(banner) = &mut self.state.banner {
            banner.advance();
        }
        if let Some(roller) = &mut self.state.roller {
            roller.advance();
        }
        batch
    }

    /// Start a banner for an unseen line status message, or retire a
    /// finished one
    fn update_banner(&mut self, snapshot: &DepartureSnapshot) {
        if snapshot.services().len() < 3 {
            self.state.banner = None;
            self.state.roller = None;
            return;
        }

        if let Some(banner) = &self.state.banner {
            if banner.phase() != BannerPhase::Done {
                return;
            }
            tracing::debug!(screen = %self.settings.screen, "Line status shown");
            self.state.last_shown_status = Some(banner.message().to_string());
            self.state.banner = None;
            self.state.roller = None;
        }

        let Some(status) = self.queue.line_status() else {
            return;
        };
        if self.state.last_shown_status.as_deref() == Some(status.message.as_str()) {
            return;
        }

        let width = self.metrics.text_width(&status.message, FontStyle::Regular);
        self.state.banner = Some(StatusBanner::new(&status.message, width, self.line_height()));
        self.state.roller = Some(RowRoller::new(self.settings.alternate_frames, self.line_height()));
    }

    fn full_rect(&self) -> Rect {
        Rect::new(0, 0, self.settings.width, self.settings.height)
    }

    fn line_height(&self) -> u32 {
        self.metrics.line_height().max(1)
    }

    fn row_y(&self, line: u32) -> i32 {
        i32::try_from(line * self.line_height()).unwrap_or(i32::MAX)
    }

    /// Lines available above the clock row
    fn content_lines(&self) -> u32 {
        (self.settings.height / self.line_height()).saturating_sub(1)
    }

    fn row_clip(&self, line: u32, x: u32, width: u32) -> Rect {
        Rect::new(
            i32::try_from(x).unwrap_or(i32::MAX),
            self.row_y(line),
            width,
            self.line_height(),
        )
    }

    fn centered(&self, batch: &mut DrawBatch, line: u32, text: &str, style: FontStyle) {
        let width = self.metrics.text_width(text, style);
        let x = self.settings.width.saturating_sub(width) / 2;
        let clip = self.row_clip(line, 0, self.settings.width);
        batch.text(i32::try_from(x).unwrap_or(0), clip.y, text, style, clip);
    }

    fn clock_row(&self, batch: &mut DrawBatch, text: &str) {
        let width = self.metrics.text_width(text, FontStyle::Regular);
        let x = self.settings.width.saturating_sub(width) / 2;
        let y = self.settings.height.saturating_sub(self.line_height());
        let clip = Rect::new(0, i32::try_from(y).unwrap_or(0), self.settings.width, self.line_height());
        batch.text(i32::try_from(x).unwrap_or(0), clip.y, text, FontStyle::Regular, clip);
    }

    /// Draw `text` in a region of a line, scrolling it when it overflows
    #[allow(clippy::too_many_arguments)]
    fn scrolling_row(
        &mut self,
        batch: &mut DrawBatch,
        slot: usize,
        line: u32,
        text: &str,
        style: FontStyle,
        x: u32,
        width: u32,
    ) {
        if self.state.rows.len() <= slot {
            self.state
                .rows
                .resize_with(slot + 1, || ScrollState::new(self.settings.scroll));
        }
        let text_width = self.metrics.text_width(text, style);
        let clip = self.row_clip(line, x, width);
        let row = &mut self.state.rows[slot];
        row.fit(text, text_width, width);
        let offset = i32::try_from(row.offset()).unwrap_or(0);
        batch.text(clip.x - offset, clip.y, text, style, clip);
    }

    fn departure_rows(&mut self, batch: &mut DrawBatch, snapshot: &DepartureSnapshot) {
        let lines = self.content_lines();
        let mut line = 0;
        let mut slot = 0;

        for (index, service) in snapshot.services().iter().enumerate() {
            if line >= lines {
                break;
            }
            if self.state.banner.is_some() && matches!(index, 1 | 2) {
                if index == 1 {
                    self.alternating_row(batch, line, snapshot.services().get(1..3).unwrap_or_default());
                } else {
                    self.banner_row(batch, line);
                }
                slot += 1;
                line += 1;
                continue;
            }
            let style = if self.settings.bold_first_row && service.is_first {
                FontStyle::Bold
            } else {
                FontStyle::Regular
            };

            let status = status_text(service);
            let status_width = self.metrics.text_width(&status, style);
            let status_x = self.settings.width.saturating_sub(status_width);
            if !status.is_empty() {
                let clip = self.row_clip(line, status_x, status_width);
                batch.text(clip.x, clip.y, status, style, clip);
            }

            let label = self.row_label(service);
            let label_width = status_x.saturating_sub(COLUMN_GAP);
            self.scrolling_row(batch, slot, line, &label, style, 0, label_width);
            slot += 1;
            line += 1;

            if service.is_first && line < lines {
                let prefix_width = self.metrics.text_width(CALLING_AT, FontStyle::Regular);
                let clip = self.row_clip(line, 0, prefix_width);
                batch.text(0, clip.y, CALLING_AT, FontStyle::Regular, clip);

                let x = prefix_width + COLUMN_GAP;
                let width = self.settings.width.saturating_sub(x);
                self.scrolling_row(batch, slot, line, &service.calling_at(), FontStyle::Regular, x, width);
                slot += 1;
                line += 1;
            }
        }
    }

    /// The 2nd and 3rd departures taking turns on one row
    fn alternating_row(&self, batch: &mut DrawBatch, line: u32, pair: &[Service]) {
        let Some(roller) = &self.state.roller else {
            return;
        };
        let Some(service) = pair.get(roller.showing()) else {
            return;
        };
        let clip = self.row_clip(line, 0, self.settings.width);
        let y = clip.y + i32::try_from(roller.drop_px()).unwrap_or(0);

        let status = status_text(service);
        let status_width = self.metrics.text_width(&status, FontStyle::Regular);
        if !status.is_empty() {
            let x = self.settings.width.saturating_sub(status_width);
            batch.text(i32::try_from(x).unwrap_or(0), y, status, FontStyle::Regular, clip);
        }
        batch.text(0, y, self.row_label(service), FontStyle::Regular, clip);
    }

    fn banner_row(&self, batch: &mut DrawBatch, line: u32) {
        let Some(banner) = &self.state.banner else {
            return;
        };
        if banner.phase() == BannerPhase::EndPause {
            return;
        }
        let clip = self.row_clip(line, 0, self.settings.width);
        let x = -i32::try_from(banner.offset()).unwrap_or(0);
        let y = clip.y + i32::try_from(banner.drop_px()).unwrap_or(0);
        batch.text(x, y, banner.message(), FontStyle::Regular, clip);
    }

    fn row_label(&self, service: &Service) -> String {
        let mut parts = Vec::with_capacity(3);
        if self.settings.show_departure_numbers {
            parts.push(ordinal(service.ordinal));
        }
        if self.settings.mode == TransportMode::Rail {
            parts.push(service.scheduled.format("%H:%M").to_string());
        }
        parts.push(service.destination.clone());
        parts.join(" ")
    }
}

impl std::fmt::Debug for DisplayRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DisplayRenderer")
            .field("screen", &self.settings.screen)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

/// Right-hand status column for a service
fn status_text(service: &Service) -> String {
    match service.live {
        LiveTime::OnTime => "On time".to_string(),
        LiveTime::Delayed(expected) => format!("Exp {}", expected.format("%H:%M")),
        LiveTime::Unknown => service.status.clone(),
    }
}

/// "1st", "2nd", "3rd", "4th", ... "11th", "12th", "13th", "21st"
fn ordinal(n: usize) -> String {
    let suffix = match (n % 10, n % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    };
    format!("{n}{suffix}")
}
