//! Daily hour windows
//!
//! Both operating hours and screen blanking are configured as `"start-end"`
//! in whole hours, e.g. `"6-23"` or `"23-5"`. The start hour is inclusive,
//! the end hour exclusive, and a window whose start is after its end wraps
//! across midnight.

use std::fmt;
use std::str::FromStr;

use chrono::{NaiveTime, Timelike};
use serde::{Deserialize, Deserializer};

/// A window of whole hours in the day
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct HoursWindow {
    start: u8,
    end: u8,
}

/// Error parsing an hours window
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid hours window {0:?} (expected \"H-H\" with hours 0-23)")]
pub struct HoursParseError(pub String);

impl HoursWindow {
    /// Create a window; hours must be in `0..=23`
    #[must_use]
    pub fn new(start: u8, end: u8) -> Option<Self> {
        (start < 24 && end < 24).then_some(Self { start, end })
    }

    /// Start hour (inclusive)
    #[must_use]
    pub fn start(&self) -> u8 {
        self.start
    }

    /// End hour (exclusive)
    #[must_use]
    pub fn end(&self) -> u8 {
        self.end
    }

    /// Whether `time` falls inside the window
    ///
    /// A window with equal start and end covers the whole day.
    #[must_use]
    pub fn contains(&self, time: NaiveTime) -> bool {
        let hour = time.hour() as u8;
        match self.start.cmp(&self.end) {
            std::cmp::Ordering::Equal => true,
            std::cmp::Ordering::Less => hour >= self.start && hour < self.end,
            std::cmp::Ordering::Greater => hour >= self.start || hour < self.end,
        }
    }
}

impl FromStr for HoursWindow {
    type Err = HoursParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || HoursParseError(s.to_string());
        let (start, end) = s.trim().split_once('-').ok_or_else(err)?;
        let start: u8 = start.trim().parse().map_err(|_| err())?;
        let end: u8 = end.trim().parse().map_err(|_| err())?;
        Self::new(start, end).ok_or_else(err)
    }
}

impl fmt::Display for HoursWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

/// Parse an optional window where an empty string means "not configured"
///
/// # Errors
///
/// Returns an error for a non-empty string that is not a valid window.
pub fn parse_optional(value: Option<&str>) -> Result<Option<HoursWindow>, HoursParseError> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => s.parse().map(Some),
    }
}

impl<'de> Deserialize<'de> for HoursWindow {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
