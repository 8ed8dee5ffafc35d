//! Line status parser
//!
//! The status endpoint answers with an array of lines, each carrying one or
//! more severity entries. Only the first line is used; its entries are
//! flattened into one display line:
//!
//! ```text
//! Piccadilly Line Status: - Minor Delays: Signal failure at Acton Town - Good Service: No additional information.
//! ```

use serde::Deserialize;

use super::NormalizationError;
use crate::model::LineStatus;

const NO_REASON: &str = "No additional information.";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LineEntry {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    line_statuses: Vec<SeverityEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SeverityEntry {
    status_severity_description: String,
    #[serde(default)]
    reason: Option<String>,
}

/// Parse a status body for `line`
///
/// An empty array means the feed knows nothing about the line and yields
/// `None`.
///
/// # Errors
///
/// Returns [`NormalizationError::Malformed`] when the body is not an array of
/// line entries.
pub fn parse_line_status(line: &str, json: &str) -> Result<Option<LineStatus>, NormalizationError> {
    let entries: Vec<LineEntry> =
        serde_json::from_str(json).map_err(|e| NormalizationError::Malformed(e.to_string()))?;

    let Some(entry) = entries.into_iter().next() else {
        return Ok(None);
    };

    let name = entry.name.as_deref().unwrap_or("Unknown");
    let mut parts = vec![format!("{name} Line Status:")];
    parts.extend(entry.line_statuses.iter().map(|s| {
        let reason = s
            .reason
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .unwrap_or(NO_REASON);
        format!("- {}: {reason}", s.status_severity_description)
    }));

    let message = parts.join(" ").split_whitespace().collect::<Vec<_>>().join(" ");
    Ok(Some(LineStatus::new(line, message)))
}
