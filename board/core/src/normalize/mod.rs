//! Domain Normalizer
//!
//! Pure mapping from a feed's raw payload to a [`DepartureSnapshot`]. Each
//! feed has its own parser; the shared pipeline after parsing is:
//!
//! ```text
//! parse ──► de-duplicate ──► filter (platform, destination) ──► sort ──► truncate ──► annotate
//! ```
//!
//! No I/O happens here. The capture time is passed in so the same payload
//! always normalises to the same snapshot.
//!
//! Line status bodies have their own parser in [`status`].

pub mod rail;
pub mod status;
pub mod transit;

use std::collections::HashSet;

use chrono::NaiveDateTime;
use thiserror::Error;

use crate::model::{DepartureSnapshot, Service, Station};
use crate::source::RawPayload;

pub use status::parse_line_status;

/// Errors turning a payload into a snapshot
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NormalizationError {
    /// The payload parsed but was not a departure board, or none of its
    /// entries were usable
    #[error("payload contained no parseable services")]
    NoServices,

    /// The payload could not be parsed at all
    #[error("malformed payload: {0}")]
    Malformed(String),
}

/// Per-screen normalisation settings
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NormalizeOptions {
    /// Maximum services kept in a snapshot
    pub max_rows: usize,
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        Self { max_rows: 3 }
    }
}

/// Normalise a raw payload for `station`
///
/// An empty board, or an empty result after filtering, is a valid snapshot.
/// Which payloads count as holding no services at all is up to each
/// feed's parser.
///
/// # Errors
///
/// Returns [`NormalizationError`] when the payload cannot be parsed or holds
/// no usable services.
pub fn normalize(
    payload: &RawPayload,
    station: &Station,
    options: &NormalizeOptions,
    captured_at: NaiveDateTime,
) -> Result<DepartureSnapshot, NormalizationError> {
    let services = match payload {
        RawPayload::Rail(xml) => rail::parse_services(xml, captured_at)?,
        RawPayload::Transit(json) => transit::parse_services(json, captured_at)?,
    };

    Ok(build_snapshot(station, services, options, captured_at))
}

/// Run the shared post-parse pipeline
#[must_use]
pub fn build_snapshot(
    station: &Station,
    services: Vec<Service>,
    options: &NormalizeOptions,
    captured_at: NaiveDateTime,
) -> DepartureSnapshot {
    let parsed = services.len();

    let mut seen = HashSet::new();
    let mut kept: Vec<Service> = services
        .into_iter()
        .filter(|s| seen.insert((s.scheduled, s.destination.clone())))
        .filter(|s| station.accepts_platform(s) && station.accepts_destination(s))
        .collect();

    kept.sort_by_key(|s| s.scheduled);
    kept.truncate(options.max_rows);

    tracing::debug!(
        station = %station.code,
        parsed,
        kept = kept.len(),
        "Normalised departures"
    );

    DepartureSnapshot::new(station.clone(), kept, captured_at)
}
