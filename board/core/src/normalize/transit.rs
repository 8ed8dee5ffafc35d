//! Transit arrivals parser
//!
//! The arrivals feed is a JSON array of predictions, each counting down in
//! seconds to arrival. Predictions carry no timetable, so the scheduled time
//! is the capture time plus the countdown and the live estimate is unknown.

use chrono::{Duration, NaiveDateTime};
use serde::Deserialize;

use super::NormalizationError;
use crate::model::{LiveTime, Service};

/// One arrival prediction as served by the feed
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ArrivalPrediction {
    #[serde(default)]
    line_name: Option<String>,
    #[serde(default)]
    destination_name: Option<String>,
    #[serde(default)]
    towards: Option<String>,
    #[serde(default)]
    platform_name: Option<String>,
    time_to_station: i64,
}

/// Parse every prediction
///
/// Predictions without any destination are skipped. An empty array means
/// nothing is due and parses to an empty list.
///
/// # Errors
///
/// Returns [`NormalizationError::Malformed`] when the body is not an array of
/// predictions, and [`NormalizationError::NoServices`] when there were
/// predictions but none was usable.
pub fn parse_services(
    json: &str,
    captured_at: NaiveDateTime,
) -> Result<Vec<Service>, NormalizationError> {
    let predictions: Vec<ArrivalPrediction> =
        serde_json::from_str(json).map_err(|e| NormalizationError::Malformed(e.to_string()))?;
    let received = predictions.len();

    let services: Vec<Service> = predictions
        .into_iter()
        .filter_map(|p| to_service(p, captured_at))
        .collect();

    if received > 0 && services.is_empty() {
        return Err(NormalizationError::NoServices);
    }
    Ok(services)
}

fn to_service(prediction: ArrivalPrediction, captured_at: NaiveDateTime) -> Option<Service> {
    let destination = prediction
        .destination_name
        .as_deref()
        .or(prediction.towards.as_deref())
        .map(format_destination)
        .filter(|d| !d.is_empty())?;

    let seconds = prediction.time_to_station.max(0);
    let mut service = Service::new(captured_at + Duration::seconds(seconds), destination)
        .with_live(LiveTime::Unknown)
        .with_status(countdown(seconds))
        .with_operator(prediction.line_name.unwrap_or_default());
    service.platform = prediction
        .platform_name
        .filter(|p| !p.trim().is_empty() && p != "null");

    Some(service)
}

/// Strip the feed's station-type suffixes from a destination name
fn format_destination(name: &str) -> String {
    name.replace("Underground Station", "")
        .replace("DLR Station", "")
        .replace("Rail Station", "")
        .trim()
        .to_string()
}

/// Countdown text for the status column
fn countdown(seconds: i64) -> String {
    let minutes = (seconds + 59) / 60;
    if seconds < 30 {
        "Due".to_string()
    } else if minutes <= 1 {
        "1 min".to_string()
    } else {
        format!("{minutes} mins")
    }
}
