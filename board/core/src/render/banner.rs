//! Line status banner and the alternating departure row
//!
//! While a new line status message is up it takes the third departure's
//! row, and the second and third departures share the row above it.
//!
//! ```text
//!   banner:  roll up ──► hold ──► scroll left until gone ──► pause ──► done
//!   roller:  2nd ──(interval)──► 3rd ──(interval)──► 2nd ...   each switch rolls up
//! ```

/// Frames the banner holds after rolling up
const HOLD_FRAMES: u32 = 20;
/// Frames the banner holds once the text has scrolled off
const END_PAUSE_FRAMES: u32 = 8;
/// Pixels the alternating row rises per frame
const ROLLER_STEP_PX: u32 = 2;

/// Where a banner is in its one-shot animation
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BannerPhase {
    /// Rising into the row from below
    RollUp,
    /// Fully risen, holding still
    Hold,
    /// Moving left one pixel per frame
    Scroll,
    /// Scrolled off, holding an empty row
    EndPause,
    /// Finished; the departure row comes back
    Done,
}

/// One-shot animation of a line status message
#[derive(Clone, Debug)]
pub struct StatusBanner {
    message: String,
    text_width: u32,
    line_height: u32,
    phase: BannerPhase,
    risen: u32,
    offset: u32,
    frames: u32,
}

impl StatusBanner {
    /// Start a banner for `message`
    #[must_use]
    pub fn new(message: &str, text_width: u32, line_height: u32) -> Self {
        Self {
            message: message.to_string(),
            text_width,
            line_height: line_height.max(1),
            phase: BannerPhase::RollUp,
            risen: 0,
            offset: 0,
            frames: 0,
        }
    }

    /// Message being shown
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Current phase
    #[must_use]
    pub fn phase(&self) -> BannerPhase {
        self.phase
    }

    /// Pixels the text sits below its row's top edge
    #[must_use]
    pub fn drop_px(&self) -> u32 {
        self.line_height - self.risen
    }

    /// Pixels the text is shifted left
    #[must_use]
    pub fn offset(&self) -> u32 {
        self.offset
    }

    /// Advance one frame
    pub fn advance(&mut self) {
        match self.phase {
            BannerPhase::RollUp => {
                self.risen += 1;
                if self.risen >= self.line_height {
                    self.phase = BannerPhase::Hold;
                    self.frames = 0;
                }
            }
            BannerPhase::Hold => {
                self.frames += 1;
                if self.frames >= HOLD_FRAMES {
                    self.phase = BannerPhase::Scroll;
                }
            }
            BannerPhase::Scroll => {
                self.offset += 1;
                if self.offset > self.text_width {
                    self.phase = BannerPhase::EndPause;
                    self.frames = 0;
                }
            }
            BannerPhase::EndPause => {
                self.frames += 1;
                if self.frames >= END_PAUSE_FRAMES {
                    self.phase = BannerPhase::Done;
                }
            }
            BannerPhase::Done => {}
        }
    }
}

/// Two departures taking turns on one row
#[derive(Clone, Debug)]
pub struct RowRoller {
    interval_frames: u32,
    line_height: u32,
    frames: u32,
    second: bool,
    risen: u32,
}

impl RowRoller {
    /// Switch every `interval_frames`, rolling each newcomer up into place
    #[must_use]
    pub fn new(interval_frames: u32, line_height: u32) -> Self {
        let line_height = line_height.max(1);
        Self {
            interval_frames: interval_frames.max(1),
            line_height,
            frames: 0,
            second: false,
            risen: line_height,
        }
    }

    /// Which of the pair is showing: 0 for the first, 1 for the second
    #[must_use]
    pub fn showing(&self) -> usize {
        usize::from(self.second)
    }

    /// Pixels the text sits below its row's top edge
    #[must_use]
    pub fn drop_px(&self) -> u32 {
        self.line_height - self.risen
    }

    /// Advance one frame
    pub fn advance(&mut self) {
        self.risen = (self.risen + ROLLER_STEP_PX).min(self.line_height);
        self.frames += 1;
        if self.frames >= self.interval_frames {
            self.frames = 0;
            self.second = !self.second;
            self.risen = 0;
        }
    }
}
