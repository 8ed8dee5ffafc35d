//! End-to-end pipeline tests
//!
//! Scripted feeds drive a full board (pollers, bus, queues, renderers and
//! the render loop) on a paused tokio clock, and the headless adapter shows
//! what each screen ended up saying.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use parking_lot::Mutex;
use tokio::time::Instant;

use departure_core::{
    Board, BoardConfig, BoxedClient, BoxedStatusSource, FetchError, FixedWidthMetrics,
    HeadlessAdapter, LineStatusSettings, ManualClock, RawPayload, RetryPolicy, RetryingClient,
    Scheduler, SchedulerHandle, ScreenConfig, ScreenId, ShutdownReport, SourceClient, Station,
    StatusSource, TransportMode,
};

const ARRIVALS: &str = r#"[
    {"lineName": "Piccadilly", "destinationName": "Cockfosters Underground Station",
     "platformName": "Eastbound - Platform 2", "timeToStation": 125},
    {"lineName": "Piccadilly", "destinationName": "Arnos Grove Underground Station",
     "platformName": "Eastbound - Platform 2", "timeToStation": 400}
]"#;

const THREE_ARRIVALS: &str = r#"[
    {"lineName": "Piccadilly", "destinationName": "Cockfosters Underground Station", "timeToStation": 125},
    {"lineName": "Piccadilly", "destinationName": "Arnos Grove Underground Station", "timeToStation": 400},
    {"lineName": "Piccadilly", "destinationName": "Wood Green Underground Station", "timeToStation": 610}
]"#;

const GOOD_SERVICE: &str = r#"[{"name": "Piccadilly", "lineStatuses": [{"statusSeverityDescription": "Good Service"}]}]"#;

const SCREEN: ScreenId = ScreenId::new(1);

struct ScriptedClient {
    script: Mutex<VecDeque<Result<RawPayload, FetchError>>>,
    calls: Arc<Mutex<u32>>,
}

#[async_trait]
impl SourceClient for ScriptedClient {
    fn name(&self) -> &str {
        "scripted"
    }

    fn mode(&self) -> TransportMode {
        TransportMode::Transit
    }

    async fn fetch(&self, _station: &Station) -> Result<RawPayload, FetchError> {
        *self.calls.lock() += 1;
        self.script
            .lock()
            .pop_front()
            .unwrap_or(Err(FetchError::Unreachable("connection refused".to_string())))
    }
}

/// Takes `delay` to answer, recording when each fetch started and how many
/// overlapped
struct SlowClient {
    delay: Duration,
    in_flight: AtomicU32,
    most_in_flight: Arc<AtomicU32>,
    started: Arc<Mutex<Vec<Instant>>>,
}

#[async_trait]
impl SourceClient for SlowClient {
    fn name(&self) -> &str {
        "slow"
    }

    fn mode(&self) -> TransportMode {
        TransportMode::Transit
    }

    async fn fetch(&self, _station: &Station) -> Result<RawPayload, FetchError> {
        self.started.lock().push(Instant::now());
        let now_in_flight = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.most_in_flight.fetch_max(now_in_flight, Ordering::SeqCst);

        tokio::time::sleep(self.delay).await;

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(RawPayload::Transit(ARRIVALS.to_string()))
    }
}

/// Never answers
struct HungClient;

#[async_trait]
impl SourceClient for HungClient {
    fn name(&self) -> &str {
        "hung"
    }

    fn mode(&self) -> TransportMode {
        TransportMode::Transit
    }

    async fn fetch(&self, _station: &Station) -> Result<RawPayload, FetchError> {
        std::future::pending().await
    }
}

struct FixedStatus(&'static str);

#[async_trait]
impl StatusSource for FixedStatus {
    fn name(&self) -> &str {
        "fixed"
    }

    async fn fetch_status(&self, _line: &str) -> Result<String, FetchError> {
        Ok(self.0.to_string())
    }
}

fn at(h: u32, m: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 3, 1)
        .and_then(|d| d.and_hms_opt(h, m, 0))
        .unwrap()
}

fn config(poll_interval: Duration) -> BoardConfig {
    let mut screen = ScreenConfig::new(
        SCREEN,
        Station::new("940GZZLUNFD", "Northfields"),
        TransportMode::Transit,
    );
    screen.poll_interval = Some(poll_interval);

    let mut config = BoardConfig::new();
    config.screens.push(screen);
    config
}

struct Harness {
    handle: SchedulerHandle,
    adapter: Arc<HeadlessAdapter>,
    clock: ManualClock,
    calls: Arc<Mutex<u32>>,
    board_failures: Box<dyn Fn() -> u32>,
}

impl Harness {
    fn start(
        script: Vec<Result<RawPayload, FetchError>>,
        retry: RetryPolicy,
        poll_interval: Duration,
    ) -> Self {
        let calls = Arc::new(Mutex::new(0));
        let client: BoxedClient = Box::new(RetryingClient::new(
            ScriptedClient {
                script: Mutex::new(script.into()),
                calls: Arc::clone(&calls),
            },
            retry,
        ));
        Self::launch(client, None, calls, poll_interval)
    }

    fn launch(
        client: BoxedClient,
        status: Option<BoxedStatusSource>,
        calls: Arc<Mutex<u32>>,
        poll_interval: Duration,
    ) -> Self {
        let config = config(poll_interval);
        let clock = ManualClock::new(at(9, 0));
        let mut board = Board::with_clients(
            &config,
            vec![client],
            Arc::new(clock.clone()),
            Arc::new(FixedWidthMetrics::default()),
        )
        .unwrap();
        if let Some(source) = status {
            let settings = LineStatusSettings {
                enabled: true,
                line: Some("piccadilly".to_string()),
                ..LineStatusSettings::default()
            };
            board
                .add_status_source(&config.screens[0], &settings, source)
                .unwrap();
        }

        let queue = board.queue(SCREEN).unwrap().clone();
        let board_failures = Box::new(move || queue.status().consecutive_failures);

        let adapter = Arc::new(HeadlessAdapter::new());
        let handle = Scheduler::new(&config, Arc::new(clock.clone())).start(board, adapter.clone());

        Self {
            handle,
            adapter,
            clock,
            calls,
            board_failures,
        }
    }

    fn screen_text(&self) -> String {
        self.adapter.last_text(SCREEN).unwrap_or_default().join(" | ")
    }

    async fn stop(self) -> ShutdownReport {
        self.handle.shutdown(Duration::from_secs(1)).await
    }
}

#[tokio::test(start_paused = true)]
async fn test_exhausted_retries_show_no_data() {
    let harness = Harness::start(Vec::new(), RetryPolicy::immediate(3), Duration::from_secs(90));

    tokio::time::sleep(Duration::from_millis(500)).await;

    let text = harness.screen_text();
    assert!(text.contains("No data"), "screen showed: {text}");
    assert!(text.contains("Northfields"), "screen showed: {text}");
    assert!(text.contains("09:00:00"), "screen showed: {text}");
    assert_eq!(*harness.calls.lock(), 3);
    assert_eq!((harness.board_failures)(), 1);

    harness.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_retried_fetch_reaches_the_screen() {
    let harness = Harness::start(
        vec![
            Err(FetchError::Timeout),
            Err(FetchError::HttpError(503)),
            Ok(RawPayload::Transit(ARRIVALS.to_string())),
        ],
        RetryPolicy::immediate(3),
        Duration::from_secs(90),
    );

    tokio::time::sleep(Duration::from_millis(500)).await;

    let text = harness.screen_text();
    assert!(text.contains("1st Cockfosters"), "screen showed: {text}");
    assert!(text.contains("2nd Arnos Grove"), "screen showed: {text}");
    assert!(text.contains("3 mins"), "screen showed: {text}");
    assert!(!text.contains("No data"));
    assert_eq!((harness.board_failures)(), 0);

    harness.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_failing_feed_keeps_fresh_departures_with_last_updated() {
    let harness = Harness::start(
        vec![Ok(RawPayload::Transit(ARRIVALS.to_string()))],
        RetryPolicy::immediate(1),
        Duration::from_secs(10),
    );

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert!(harness.screen_text().contains("Cockfosters"));

    // Second poll fails; the held snapshot is still well inside its freshness window
    tokio::time::sleep(Duration::from_secs(10)).await;

    let text = harness.screen_text();
    assert!(text.contains("Cockfosters"), "screen showed: {text}");
    assert!(text.contains("Last updated 09:00"), "screen showed: {text}");
    assert_eq!((harness.board_failures)(), 1);

    harness.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_stale_snapshot_falls_back_to_no_data() {
    let harness = Harness::start(
        vec![Ok(RawPayload::Transit(ARRIVALS.to_string()))],
        RetryPolicy::immediate(1),
        Duration::from_secs(90),
    );

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert!(harness.screen_text().contains("Cockfosters"));

    harness.clock.advance(chrono::Duration::minutes(11));
    tokio::time::sleep(Duration::from_millis(500)).await;

    let text = harness.screen_text();
    assert!(text.contains("No data"), "screen showed: {text}");
    assert!(!text.contains("Cockfosters"), "screen showed: {text}");

    harness.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_stops_every_task() {
    let harness = Harness::start(Vec::new(), RetryPolicy::immediate(1), Duration::from_secs(90));
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(harness.handle.running(), 2);

    let report = harness.stop().await;

    assert_eq!(
        report,
        ShutdownReport {
            completed: 2,
            aborted: 0
        }
    );
}

#[tokio::test(start_paused = true)]
async fn test_empty_board_says_no_departures() {
    let harness = Harness::start(
        vec![Ok(RawPayload::Transit("[]".to_string()))],
        RetryPolicy::immediate(1),
        Duration::from_secs(90),
    );

    tokio::time::sleep(Duration::from_millis(500)).await;

    let text = harness.screen_text();
    assert!(text.contains("No departures from Northfields"), "screen showed: {text}");
    assert!(!text.contains("No data"), "screen showed: {text}");
    assert_eq!((harness.board_failures)(), 0);

    harness.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_slow_feed_never_overlaps_fetches() {
    let most_in_flight = Arc::new(AtomicU32::new(0));
    let started = Arc::new(Mutex::new(Vec::new()));
    let client: BoxedClient = Box::new(SlowClient {
        delay: Duration::from_secs(25),
        in_flight: AtomicU32::new(0),
        most_in_flight: Arc::clone(&most_in_flight),
        started: Arc::clone(&started),
    });
    let harness = Harness::launch(client, None, Arc::new(Mutex::new(0)), Duration::from_secs(10));

    tokio::time::sleep(Duration::from_secs(110)).await;

    assert_eq!(most_in_flight.load(Ordering::SeqCst), 1);

    // Ticks that fell due mid-fetch were pushed back, not queued up
    let started = started.lock().clone();
    assert!(started.len() >= 4, "only {} fetches started", started.len());
    assert!(started.len() <= 5, "{} fetches started", started.len());
    for pair in started.windows(2) {
        assert!(pair[1] - pair[0] >= Duration::from_secs(25));
    }
    assert!(harness.screen_text().contains("Cockfosters"));

    harness.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_abandons_hung_fetch_within_grace() {
    let harness = Harness::launch(
        Box::new(HungClient),
        None,
        Arc::new(Mutex::new(0)),
        Duration::from_secs(90),
    );
    tokio::time::sleep(Duration::from_secs(30)).await;

    // Nothing has come back yet, so the screen is still on its startup page
    assert!(harness.screen_text().contains("Departure Board"));

    let stopping = Instant::now();
    let report = harness.stop().await;

    assert_eq!(
        report,
        ShutdownReport {
            completed: 2,
            aborted: 0
        }
    );
    assert!(stopping.elapsed() < Duration::from_secs(1));
}

#[tokio::test(start_paused = true)]
async fn test_line_status_scrolls_in_place_of_third_departure() {
    let client: BoxedClient = Box::new(ScriptedClient {
        script: Mutex::new(vec![Ok(RawPayload::Transit(THREE_ARRIVALS.to_string()))].into()),
        calls: Arc::new(Mutex::new(0)),
    });
    let harness = Harness::launch(
        client,
        Some(Box::new(FixedStatus(GOOD_SERVICE))),
        Arc::new(Mutex::new(0)),
        Duration::from_secs(90),
    );

    tokio::time::sleep(Duration::from_millis(500)).await;

    let text = harness.screen_text();
    assert!(text.contains("1st Cockfosters"), "screen showed: {text}");
    assert!(text.contains("Piccadilly Line Status: - Good Service"), "screen showed: {text}");
    assert!(!text.contains("3rd Wood Green"), "screen showed: {text}");
    assert_eq!(harness.handle.running(), 3);

    let report = harness.stop().await;
    assert_eq!(report.completed, 3);
}
