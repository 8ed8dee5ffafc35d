//! Rail board parser
//!
//! Reads the `GetDepBoardWithDetails` SOAP response. Element names are
//! matched on their local part only, since the feed moves its namespace
//! prefixes between schema versions.

use chrono::{Duration, NaiveDateTime, NaiveTime};
use roxmltree::{Document, Node};

use super::NormalizationError;
use crate::model::{CallingPoint, LiveTime, Service};

/// Parse every service on the board
///
/// Services without a parseable scheduled time are skipped. A board with no
/// `trainServices` (nothing running, or nothing matching the server-side
/// destination filter) parses to an empty list.
///
/// # Errors
///
/// Returns [`NormalizationError::Malformed`] for invalid XML or a SOAP fault,
/// and [`NormalizationError::NoServices`] when the response holds no station
/// board at all.
pub fn parse_services(
    xml: &str,
    captured_at: NaiveDateTime,
) -> Result<Vec<Service>, NormalizationError> {
    let doc = Document::parse(xml).map_err(|e| NormalizationError::Malformed(e.to_string()))?;

    if let Some(fault) = doc.descendants().find(|n| n.has_tag_name("Fault")) {
        let reason = fault
            .descendants()
            .find(|n| n.has_tag_name("faultstring"))
            .and_then(|n| n.text())
            .unwrap_or("unknown SOAP fault");
        return Err(NormalizationError::Malformed(format!("SOAP fault: {reason}")));
    }

    let Some(board) = doc
        .descendants()
        .find(|n| n.has_tag_name("GetStationBoardResult"))
    else {
        return Err(NormalizationError::NoServices);
    };

    let services = board
        .descendants()
        .filter(|n| n.has_tag_name("service"))
        .filter(|n| {
            n.parent_element()
                .is_some_and(|p| p.tag_name().name().ends_with("Services"))
        })
        .filter_map(|node| {
            let service = parse_service(node, captured_at);
            if service.is_none() {
                tracing::debug!("Skipping rail service without a scheduled time");
            }
            service
        })
        .collect();

    Ok(services)
}

fn parse_service(node: Node<'_, '_>, captured_at: NaiveDateTime) -> Option<Service> {
    let scheduled = child_text(node, "std")
        .and_then(parse_clock)
        .map(|t| resolve_time(t, captured_at))?;

    let (destination, destination_code) = node
        .children()
        .find(|n| n.has_tag_name("destination"))
        .map(locations)
        .unwrap_or_else(|| ("Unknown".to_string(), None));

    let etd = child_text(node, "etd").unwrap_or("");
    let cancelled = child_text(node, "isCancelled") == Some("true");
    let (live, status) = if cancelled {
        (LiveTime::Unknown, "Cancelled".to_string())
    } else {
        interpret_etd(etd, captured_at)
    };

    let mut service = Service::new(scheduled, destination)
        .with_live(live)
        .with_status(status)
        .with_operator(child_text(node, "operator").unwrap_or(""))
        .with_calling_points(calling_points(node));
    service.destination_code = destination_code;
    service.platform = child_text(node, "platform").map(str::to_string);

    Some(service)
}

/// Map the estimate field to a live time and status text
fn interpret_etd(etd: &str, captured_at: NaiveDateTime) -> (LiveTime, String) {
    if etd.eq_ignore_ascii_case("on time") {
        return (LiveTime::OnTime, "On time".to_string());
    }
    match parse_clock(etd) {
        Some(t) => (
            LiveTime::Delayed(resolve_time(t, captured_at)),
            format!("Exp {etd}"),
        ),
        None if etd.is_empty() => (LiveTime::Unknown, String::new()),
        None => (LiveTime::Unknown, etd.to_string()),
    }
}

/// Destination name(s) and first code; joined trains list every portion
fn locations(destination: Node<'_, '_>) -> (String, Option<String>) {
    let mut names = Vec::new();
    let mut code = None;
    for location in destination.children().filter(|n| n.has_tag_name("location")) {
        if let Some(name) = child_text(location, "locationName") {
            names.push(name.to_string());
        }
        if code.is_none() {
            code = child_text(location, "crs").map(str::to_string);
        }
    }

    if names.is_empty() {
        ("Unknown".to_string(), code)
    } else {
        (names.join(" & "), code)
    }
}

/// Calling points on the main portion of the train
fn calling_points(service: Node<'_, '_>) -> Vec<CallingPoint> {
    let Some(list) = service
        .children()
        .find(|n| n.has_tag_name("subsequentCallingPoints"))
        .and_then(|n| n.children().find(|c| c.has_tag_name("callingPointList")))
    else {
        return Vec::new();
    };

    list.children()
        .filter(|n| n.has_tag_name("callingPoint"))
        .filter_map(|cp| {
            let name = child_text(cp, "locationName")?;
            Some(CallingPoint {
                name: name.to_string(),
                code: child_text(cp, "crs").map(str::to_string),
                time: child_text(cp, "st").map(str::to_string),
            })
        })
        .collect()
}

fn child_text<'a>(node: Node<'a, '_>, name: &str) -> Option<&'a str> {
    node.children()
        .find(|n| n.has_tag_name(name))
        .and_then(|n| n.text())
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

fn parse_clock(text: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(text.trim(), "%H:%M").ok()
}

/// Place a bare clock time on the day nearest the capture time
///
/// Boards look a couple of hours ahead, so 00:10 seen at 23:50 is tomorrow
/// and 23:55 seen at 00:05 is yesterday.
fn resolve_time(time: NaiveTime, captured_at: NaiveDateTime) -> NaiveDateTime {
    let candidate = captured_at.date().and_time(time);
    let delta = candidate - captured_at;
    if delta < -Duration::hours(12) {
        candidate + Duration::days(1)
    } else if delta > Duration::hours(12) {
        candidate - Duration::days(1)
    } else {
        candidate
    }
}
