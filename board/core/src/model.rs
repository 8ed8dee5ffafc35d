//! Departure Domain Model
//!
//! The shared vocabulary both upstream feeds are normalised into. Nothing in
//! here knows which feed produced it: a rail board and a metro countdown both
//! become a [`DepartureSnapshot`] of [`Service`] entries.
//!
//! Snapshots are immutable once built and are passed around as
//! `Arc<DepartureSnapshot>`, so a snapshot published on the bus and held in a
//! queue slot is the same allocation.

use std::fmt;

use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Identifier of one physical display
///
/// Screens are numbered from 1 in configuration order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ScreenId(u8);

impl ScreenId {
    /// Create a screen ID from its 1-based number
    #[must_use]
    pub const fn new(number: u8) -> Self {
        Self(number)
    }

    /// Get the 1-based screen number
    #[must_use]
    pub fn number(self) -> u8 {
        self.0
    }
}

impl fmt::Display for ScreenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "screen{}", self.0)
    }
}

/// Which upstream feed a screen is driven by
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TransportMode {
    /// National rail departure board (SOAP/XML)
    #[default]
    Rail,
    /// Metro/transit arrivals countdown (JSON)
    #[serde(alias = "tfl", alias = "tube")]
    Transit,
}

impl fmt::Display for TransportMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rail => write!(f, "rail"),
            Self::Transit => write!(f, "transit"),
        }
    }
}

/// A station a screen shows departures for
///
/// Loaded once from configuration and never changed afterwards.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Station {
    /// Station code (CRS for rail, stop point ID for transit)
    pub code: String,
    /// Human-readable name, also used for fallback and out-of-hours signage
    pub name: String,
    /// Only show services from this platform
    pub platform: Option<String>,
    /// Only show services to (or calling at) this destination
    pub destination: Option<String>,
}

impl Station {
    /// Create a station without filters
    pub fn new(code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            platform: None,
            destination: None,
        }
    }

    /// Restrict to a platform
    #[must_use]
    pub fn with_platform(mut self, platform: impl Into<String>) -> Self {
        self.platform = Some(platform.into());
        self
    }

    /// Restrict to a destination
    #[must_use]
    pub fn with_destination(mut self, destination: impl Into<String>) -> Self {
        self.destination = Some(destination.into());
        self
    }

    /// Whether a service passes this station's platform filter
    ///
    /// Matches the platform string exactly, or the digits extracted from it,
    /// so a filter of `1` accepts `"Westbound - Platform 1"`.
    #[must_use]
    pub fn accepts_platform(&self, service: &Service) -> bool {
        let Some(wanted) = self.platform.as_deref().map(str::trim) else {
            return true;
        };
        if wanted.is_empty() {
            return true;
        }
        let Some(platform) = service.platform.as_deref().map(str::trim) else {
            return false;
        };
        if platform.eq_ignore_ascii_case(wanted) {
            return true;
        }
        let digits: String = platform.chars().filter(char::is_ascii_digit).collect();
        !digits.is_empty() && digits == wanted
    }

    /// Whether a service passes this station's destination filter
    ///
    /// Case-insensitive: matches a code exactly or a name by substring, on
    /// either the final destination or any calling point.
    #[must_use]
    pub fn accepts_destination(&self, service: &Service) -> bool {
        let Some(wanted) = self.destination.as_deref().map(str::trim) else {
            return true;
        };
        if wanted.is_empty() {
            return true;
        }
        let wanted_lower = wanted.to_lowercase();
        let matches = |name: &str, code: Option<&str>| {
            code.is_some_and(|c| c.eq_ignore_ascii_case(wanted))
                || name.to_lowercase().contains(&wanted_lower)
        };

        matches(&service.destination, service.destination_code.as_deref())
            || service
                .calling_points
                .iter()
                .any(|cp| matches(&cp.name, cp.code.as_deref()))
    }
}

/// A stop a service makes after leaving the station
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CallingPoint {
    /// Stop name
    pub name: String,
    /// Stop code, when the feed provides one
    pub code: Option<String>,
    /// Scheduled time at the stop as the feed formats it (e.g. "10:42")
    pub time: Option<String>,
}

impl CallingPoint {
    /// Create a calling point with just a name
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            code: None,
            time: None,
        }
    }
}

/// Live departure estimate
///
/// Kept as three states because the feeds disagree about what a missing
/// estimate means: rail says "On time" explicitly, the metro feed never
/// distinguishes on-time from late.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LiveTime {
    /// Running to schedule
    OnTime,
    /// Expected at a different time; may be earlier than scheduled
    Delayed(NaiveDateTime),
    /// No usable estimate
    Unknown,
}

/// A single departure entry
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Service {
    /// Scheduled departure (always present)
    pub scheduled: NaiveDateTime,
    /// Live estimate
    pub live: LiveTime,
    /// Destination name
    pub destination: String,
    /// Destination code, when the feed provides one
    pub destination_code: Option<String>,
    /// Platform, when known
    pub platform: Option<String>,
    /// Operator (rail) or line name (transit)
    pub operator: String,
    /// Free-form status text ("On time", "Cancelled", "3 mins", ...)
    pub status: String,
    /// Subsequent calling points
    pub calling_points: Vec<CallingPoint>,
    /// 1-based position within its snapshot
    pub ordinal: usize,
    /// Earliest service in its snapshot
    pub is_first: bool,
}

impl Service {
    /// Create a service with the required fields; annotations are filled in
    /// when it is placed into a snapshot.
    pub fn new(scheduled: NaiveDateTime, destination: impl Into<String>) -> Self {
        Self {
            scheduled,
            live: LiveTime::Unknown,
            destination: destination.into(),
            destination_code: None,
            platform: None,
            operator: String::new(),
            status: String::new(),
            calling_points: Vec::new(),
            ordinal: 0,
            is_first: false,
        }
    }

    /// Set live estimate
    #[must_use]
    pub fn with_live(mut self, live: LiveTime) -> Self {
        self.live = live;
        self
    }

    /// Set platform
    #[must_use]
    pub fn with_platform(mut self, platform: impl Into<String>) -> Self {
        self.platform = Some(platform.into());
        self
    }

    /// Set operator or line
    #[must_use]
    pub fn with_operator(mut self, operator: impl Into<String>) -> Self {
        self.operator = operator.into();
        self
    }

    /// Set status text
    #[must_use]
    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = status.into();
        self
    }

    /// Set calling points
    #[must_use]
    pub fn with_calling_points(mut self, calling_points: Vec<CallingPoint>) -> Self {
        self.calling_points = calling_points;
        self
    }

    /// Line ID derived from the operator name ("Hammersmith & City" becomes
    /// "hammersmith-city"), or `None` when the feed named no operator
    #[must_use]
    pub fn line_id(&self) -> Option<String> {
        let name = self.operator.trim();
        if name.is_empty() {
            return None;
        }
        Some(
            name.to_lowercase()
                .replace(" & ", "-")
                .split_whitespace()
                .collect::<Vec<_>>()
                .join("-"),
        )
    }

    /// Identity of the physical departure, used for de-duplication
    #[must_use]
    pub fn departure_key(&self) -> (NaiveDateTime, &str) {
        (self.scheduled, self.destination.as_str())
    }

    /// Text for the "Calling at:" row
    ///
    /// Lists calling points with their times when the feed provides them,
    /// otherwise describes the service by operator and destination.
    #[must_use]
    pub fn calling_at(&self) -> String {
        if self.calling_points.is_empty() {
            if self.operator.is_empty() {
                return format!("{} only.", self.destination);
            }
            return format!("This is a {} service to {}", self.operator, self.destination);
        }

        let stops: Vec<String> = self
            .calling_points
            .iter()
            .map(|cp| match &cp.time {
                Some(t) => format!("{} ({t})", cp.name),
                None => cp.name.clone(),
            })
            .collect();
        match stops.split_last() {
            Some((last, [])) => format!("{last} only."),
            Some((last, rest)) => format!("{} and {last}.", rest.join(", ")),
            None => String::new(),
        }
    }
}

/// Service disruption text for one line
///
/// Transit screens show it once in place of the third departure whenever the
/// message changes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LineStatus {
    /// Line ID the status was queried for ("piccadilly")
    pub line: String,
    /// Single-line message ready for display
    pub message: String,
}

impl LineStatus {
    /// Create a line status
    pub fn new(line: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            line: line.into(),
            message: message.into(),
        }
    }
}

/// Whether a snapshot is recent enough to be shown as-is
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Freshness {
    /// Within the freshness threshold
    Fresh,
    /// Older than the threshold; still available but flagged
    Stale,
}

/// One immutable, normalised set of departures for a station
///
/// Services are always in non-decreasing scheduled order and carry their
/// position annotations. There are no mutating methods.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DepartureSnapshot {
    station: Station,
    services: Vec<Service>,
    captured_at: NaiveDateTime,
}

impl DepartureSnapshot {
    /// Build a snapshot, sorting services by scheduled time and annotating
    /// their positions
    #[must_use]
    pub fn new(station: Station, mut services: Vec<Service>, captured_at: NaiveDateTime) -> Self {
        services.sort_by_key(|s| s.scheduled);
        for (index, service) in services.iter_mut().enumerate() {
            service.ordinal = index + 1;
            service.is_first = index == 0;
        }

        Self {
            station,
            services,
            captured_at,
        }
    }

    /// The station this snapshot describes
    #[must_use]
    pub fn station(&self) -> &Station {
        &self.station
    }

    /// Services in scheduled order
    #[must_use]
    pub fn services(&self) -> &[Service] {
        &self.services
    }

    /// When the underlying data was fetched
    #[must_use]
    pub fn captured_at(&self) -> NaiveDateTime {
        self.captured_at
    }

    /// Whether there are no services to show
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    /// Time elapsed since capture
    #[must_use]
    pub fn age(&self, now: NaiveDateTime) -> Duration {
        now - self.captured_at
    }

    /// Classify against a freshness threshold
    #[must_use]
    pub fn freshness(&self, now: NaiveDateTime, threshold: Duration) -> Freshness {
        if self.age(now) > threshold {
            Freshness::Stale
        } else {
            Freshness::Fresh
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 1)
            .and_then(|d| d.and_hms_opt(h, m, 0))
            .unwrap()
    }

    #[test]
    fn test_snapshot_sorts_and_annotates() {
        let services = vec![
            Service::new(at(10, 30), "Reading"),
            Service::new(at(10, 5), "Oxford"),
            Service::new(at(10, 15), "Didcot"),
        ];
        let snapshot = DepartureSnapshot::new(Station::new("EAL", "Ealing"), services, at(10, 0));

        let order: Vec<&str> = snapshot
            .services()
            .iter()
            .map(|s| s.destination.as_str())
            .collect();
        assert_eq!(order, vec!["Oxford", "Didcot", "Reading"]);
        assert!(snapshot.services()[0].is_first);
        assert!(!snapshot.services()[1].is_first);
        assert_eq!(snapshot.services()[2].ordinal, 3);
    }

    #[test]
    fn test_freshness_threshold() {
        let snapshot = DepartureSnapshot::new(Station::new("EAL", "Ealing"), vec![], at(10, 0));
        let threshold = Duration::minutes(10);

        assert_eq!(snapshot.freshness(at(10, 10), threshold), Freshness::Fresh);
        assert_eq!(snapshot.freshness(at(10, 11), threshold), Freshness::Stale);
    }

    #[test]
    fn test_platform_filter_matches_digits() {
        let station = Station::new("940GZZLUNFD", "Northfields").with_platform("1");
        let westbound = Service::new(at(9, 0), "Heathrow").with_platform("Westbound - Platform 1");
        let eastbound = Service::new(at(9, 0), "Cockfosters").with_platform("Eastbound - Platform 2");
        let unknown = Service::new(at(9, 0), "Cockfosters");

        assert!(station.accepts_platform(&westbound));
        assert!(!station.accepts_platform(&eastbound));
        assert!(!station.accepts_platform(&unknown));
    }

    #[test]
    fn test_destination_filter_checks_calling_points() {
        let station = Station::new("EAL", "Ealing").with_destination("RDG");
        let mut via_reading = Service::new(at(9, 0), "Oxford");
        via_reading.calling_points = vec![CallingPoint {
            name: "Reading".to_string(),
            code: Some("RDG".to_string()),
            time: Some("09:25".to_string()),
        }];
        let elsewhere = Service::new(at(9, 0), "Heathrow Terminal 5");

        assert!(station.accepts_destination(&via_reading));
        assert!(!station.accepts_destination(&elsewhere));

        let by_name = Station::new("EAL", "Ealing").with_destination("heathrow");
        assert!(by_name.accepts_destination(&elsewhere));
    }

    #[test]
    fn test_calling_at_text() {
        let service = Service::new(at(9, 0), "Oxford").with_calling_points(vec![
            CallingPoint {
                name: "Slough".to_string(),
                code: None,
                time: Some("09:12".to_string()),
            },
            CallingPoint::named("Oxford"),
        ]);
        assert_eq!(service.calling_at(), "Slough (09:12) and Oxford.");

        let tube = Service::new(at(9, 0), "Cockfosters").with_operator("Piccadilly");
        assert_eq!(
            tube.calling_at(),
            "This is a Piccadilly service to Cockfosters"
        );
    }

    #[test]
    fn test_line_id_from_operator() {
        let service = Service::new(at(10, 0), "Barking").with_operator("Hammersmith & City");
        assert_eq!(service.line_id().as_deref(), Some("hammersmith-city"));

        let service = Service::new(at(10, 0), "Cockfosters").with_operator("Piccadilly");
        assert_eq!(service.line_id().as_deref(), Some("piccadilly"));

        assert_eq!(Service::new(at(10, 0), "Reading").line_id(), None);
    }

    #[test]
    fn test_screen_id_display() {
        assert_eq!(ScreenId::new(2).to_string(), "screen2");
    }
}
