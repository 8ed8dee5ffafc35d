//! Per-row scroll animation
//!
//! A row whose text fits stays [`ScrollPhase::Static`] forever. A row that
//! does not fit scrolls back and forth: it holds at the start, moves left a
//! fixed step per frame until the end of the text is visible, holds again,
//! then moves back.
//!
//! ```text
//!   pause ──► forward ──► pause ──► backward ──┐
//!     ▲                                        │
//!     └────────────────────────────────────────┘
//! ```

/// Scroll animation settings
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScrollConfig {
    /// Pixels moved per frame
    pub step_px: u32,
    /// Frames held at each end
    pub pause_frames: u32,
}

impl Default for ScrollConfig {
    fn default() -> Self {
        Self {
            step_px: 1,
            pause_frames: 70,
        }
    }
}

/// Whether a row animates
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScrollPhase {
    /// Text fits; never moves
    Static,
    /// Text overflows; ping-pongs
    Scrolling,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Direction {
    Forward,
    Backward,
}

/// Scroll position of one row
#[derive(Clone, Debug)]
pub struct ScrollState {
    config: ScrollConfig,
    content: String,
    text_width: u32,
    view_width: u32,
    offset: u32,
    direction: Direction,
    pause_remaining: u32,
}

impl ScrollState {
    /// Create an empty, static row
    #[must_use]
    pub fn new(config: ScrollConfig) -> Self {
        Self {
            config,
            content: String::new(),
            text_width: 0,
            view_width: 0,
            offset: 0,
            direction: Direction::Forward,
            pause_remaining: config.pause_frames,
        }
    }

    /// Point the row at `content`; restarts from the beginning when the
    /// content or geometry changed
    pub fn fit(&mut self, content: &str, text_width: u32, view_width: u32) {
        if self.content == content && self.text_width == text_width && self.view_width == view_width
        {
            return;
        }
        self.content.clear();
        self.content.push_str(content);
        self.text_width = text_width;
        self.view_width = view_width;
        self.offset = 0;
        self.direction = Direction::Forward;
        self.pause_remaining = self.config.pause_frames;
    }

    /// Current phase
    #[must_use]
    pub fn phase(&self) -> ScrollPhase {
        if self.text_width > self.view_width {
            ScrollPhase::Scrolling
        } else {
            ScrollPhase::Static
        }
    }

    /// Pixels the text is shifted left
    #[must_use]
    pub fn offset(&self) -> u32 {
        self.offset
    }

    fn max_offset(&self) -> u32 {
        self.text_width.saturating_sub(self.view_width)
    }

    /// Advance one frame
    pub fn advance(&mut self) {
        if self.phase() == ScrollPhase::Static {
            return;
        }
        if self.pause_remaining > 0 {
            self.pause_remaining -= 1;
            return;
        }

        let max = self.max_offset();
        match self.direction {
            Direction::Forward => {
                self.offset = self.offset.saturating_add(self.config.step_px).min(max);
                if self.offset == max {
                    self.direction = Direction::Backward;
                    self.pause_remaining = self.config.pause_frames;
                }
            }
            Direction::Backward => {
                self.offset = self.offset.saturating_sub(self.config.step_px);
                if self.offset == 0 {
                    self.direction = Direction::Forward;
                    self.pause_remaining = self.config.pause_frames;
                }
            }
        }
    }
}
