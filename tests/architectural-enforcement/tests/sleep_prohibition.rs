//! Integration Test: Sleep Prohibition
//!
//! **Policy**: production code waits on timers and I/O, never on sleep().
//! **Exceptions**: retry backoff inside the source client, test code.
//! Periodic work uses `tokio::time::interval()`.

use architectural_enforcement::{assert_no_violations, production_code, SourceLine};

/// Lines searched above a sleep for a backoff context
const BACKOFF_WINDOW: usize = 12;

fn sleep_violations(relative: &str) -> Vec<SourceLine> {
    let lines = production_code(relative);

    lines
        .iter()
        .enumerate()
        .filter(|(_, line)| line.code.contains("::sleep(") || line.code.contains(".sleep("))
        .filter(|(idx, line)| {
            let start = idx.saturating_sub(BACKOFF_WINDOW);
            let in_backoff = lines[start..*idx]
                .iter()
                .any(|l| l.path == line.path && l.code.contains("backoff"));
            !in_backoff
        })
        .map(|(_, line)| line.clone())
        .collect()
}

#[test]
fn test_no_sleep_in_production_code() {
    let mut violations = sleep_violations("board/core/src");
    violations.extend(sleep_violations("board/daemon/src"));

    assert_no_violations("No sleep() outside retry backoff", &violations);
}

#[test]
fn test_no_thread_sleep_anywhere() {
    let mut violations = production_code("board/core/src");
    violations.extend(production_code("board/daemon/src"));
    violations.retain(|line| line.code.contains("thread::sleep"));

    assert_no_violations("std::thread::sleep blocks the runtime", &violations);
}
