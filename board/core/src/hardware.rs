//! Hardware Display Adapter
//!
//! The boundary between the renderer and the physical panels. An adapter
//! takes a finished [`DrawBatch`] and puts it on the glass; everything about
//! fonts, SPI and GPIO lives on the far side of this trait.
//!
//! `draw_frame` is synchronous and is called once per frame tick from the
//! render loop. A failure drops that frame only; the loop carries on.

use std::collections::HashMap;

use parking_lot::Mutex;
use thiserror::Error;

use crate::model::ScreenId;
use crate::render::DrawBatch;

/// Errors raised by a display adapter
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    /// The adapter rejected or failed to draw the frame
    #[error("display adapter error: {0}")]
    Adapter(String),

    /// The display is not connected
    #[error("display disconnected")]
    Disconnected,
}

/// Something that can show frames on one or more screens
pub trait DisplayAdapter: Send + Sync {
    /// Adapter name for logs
    fn name(&self) -> &str;

    /// Draw a frame on `screen`
    ///
    /// # Errors
    ///
    /// Returns [`RenderError`] if the frame could not be drawn.
    fn draw_frame(&self, screen: ScreenId, batch: &DrawBatch) -> Result<(), RenderError>;
}

/// Adapter for runs without display hardware
///
/// Logs each screen's text whenever it changes, so a headless board can be
/// watched from its log output.
#[derive(Debug, Default)]
pub struct HeadlessAdapter {
    last: Mutex<HashMap<ScreenId, Vec<String>>>,
}

impl HeadlessAdapter {
    /// Create a headless adapter
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Text most recently drawn on `screen`
    #[must_use]
    pub fn last_text(&self, screen: ScreenId) -> Option<Vec<String>> {
        self.last.lock().get(&screen).cloned()
    }
}

impl DisplayAdapter for HeadlessAdapter {
    fn name(&self) -> &str {
        "headless"
    }

    fn draw_frame(&self, screen: ScreenId, batch: &DrawBatch) -> Result<(), RenderError> {
        let lines: Vec<String> = batch.texts().map(str::to_string).collect();
        let mut last = self.last.lock();
        if last.get(&screen) != Some(&lines) {
            if lines.is_empty() {
                tracing::info!(%screen, "(blank)");
            } else {
                tracing::info!(%screen, text = %lines.join(" | "), "Frame");
            }
            last.insert(screen, lines);
        } else {
            tracing::trace!(%screen, "Frame unchanged");
        }
        Ok(())
    }
}
