//! Draw primitives and text measurement
//!
//! The renderer never touches pixels. It emits a [`DrawBatch`] of
//! positioned text and clear commands; the hardware adapter rasterises them
//! with whatever fonts it has. Layout only needs to know how wide a string
//! will be, which is what [`TextMetrics`] answers.

/// Font weight for a text command
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum FontStyle {
    /// Normal weight
    #[default]
    Regular,
    /// Bold weight
    Bold,
}

/// Axis-aligned rectangle in display pixels
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Rect {
    /// Left edge
    pub x: i32,
    /// Top edge
    pub y: i32,
    /// Width
    pub width: u32,
    /// Height
    pub height: u32,
}

impl Rect {
    /// Create a rectangle
    #[must_use]
    pub const fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

/// One draw primitive
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DrawCommand {
    /// Clear a region to background
    Clear(Rect),

    /// Draw text with its top-left corner at (`x`, `y`), clipped to `clip`
    ///
    /// `x` may lie left of the clip region while the text is scrolled.
    Text {
        /// Left edge of the text
        x: i32,
        /// Top edge of the text
        y: i32,
        /// Content
        text: String,
        /// Weight
        style: FontStyle,
        /// Visible region
        clip: Rect,
    },
}

/// Ordered draw commands for one frame
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DrawBatch {
    commands: Vec<DrawCommand>,
}

impl DrawBatch {
    /// Create an empty batch
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a command
    pub fn push(&mut self, command: DrawCommand) {
        self.commands.push(command);
    }

    /// Append a text command
    pub fn text(&mut self, x: i32, y: i32, text: impl Into<String>, style: FontStyle, clip: Rect) {
        self.push(DrawCommand::Text {
            x,
            y,
            text: text.into(),
            style,
            clip,
        });
    }

    /// Commands in draw order
    #[must_use]
    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    /// Text content in draw order
    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.commands.iter().filter_map(|c| match c {
            DrawCommand::Text { text, .. } => Some(text.as_str()),
            DrawCommand::Clear(_) => None,
        })
    }

    /// Whether the frame draws nothing but background
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.texts().next().is_none()
    }
}

/// Measures text for layout
pub trait TextMetrics: Send + Sync {
    /// Rendered width of `text` in pixels
    fn text_width(&self, text: &str, style: FontStyle) -> u32;

    /// Height of one text row in pixels
    fn line_height(&self) -> u32;
}

/// Metrics for fixed-width bitmap fonts
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FixedWidthMetrics {
    /// Advance of a regular glyph
    pub glyph_width: u32,
    /// Advance of a bold glyph
    pub bold_glyph_width: u32,
    /// Row height
    pub line_height: u32,
}

impl Default for FixedWidthMetrics {
    fn default() -> Self {
        Self {
            glyph_width: 6,
            bold_glyph_width: 7,
            line_height: 12,
        }
    }
}

impl TextMetrics for FixedWidthMetrics {
    fn text_width(&self, text: &str, style: FontStyle) -> u32 {
        let glyph = match style {
            FontStyle::Regular => self.glyph_width,
            FontStyle::Bold => self.bold_glyph_width,
        };
        u32::try_from(text.chars().count())
            .unwrap_or(u32::MAX)
            .saturating_mul(glyph)
    }

    fn line_height(&self) -> u32 {
        self.line_height
    }
}
