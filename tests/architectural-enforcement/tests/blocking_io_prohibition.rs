//! Integration Test: Blocking I/O Prohibition
//!
//! **Policy**: code running on the runtime must not block it. Network access
//! goes through the async HTTP client; file access is limited to reading the
//! configuration once at startup.

use architectural_enforcement::{assert_no_violations, find_patterns};

#[test]
fn test_no_blocking_http_client() {
    let mut violations = find_patterns("board/core/src", &["reqwest::blocking"]);
    violations.extend(find_patterns("board/daemon/src", &["reqwest::blocking"]));

    assert_no_violations("Use the async HTTP client", &violations);
}

#[test]
fn test_file_io_only_in_config_loading() {
    let violations: Vec<_> = find_patterns("board/core/src", &["std::fs", "std::net::", "File::open"])
        .into_iter()
        .filter(|line| !line.path.ends_with("config/mod.rs"))
        .collect();

    assert_no_violations("File and socket I/O belongs in config loading only", &violations);
}
