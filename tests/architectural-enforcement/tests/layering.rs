//! Integration Test: Pipeline Layering
//!
//! **Policy**: the render path reads only from its queue. It must never
//! reach the network or suspend: a slow feed may make data stale, never make
//! a frame late.
//!
//! **Policy**: normalisation is a pure function of its payload. No HTTP
//! client, no async runtime, no file or socket access.

use architectural_enforcement::{assert_no_violations, find_patterns};

#[test]
fn test_render_path_never_waits() {
    let mut violations = find_patterns(
        "board/core/src/render",
        &["reqwest", ".await", "async fn", "sleep(", "block_on"],
    );
    violations.extend(find_patterns(
        "board/core/src/hardware.rs",
        &["reqwest", ".await", "async fn", "sleep("],
    ));

    assert_no_violations("Render path must not perform network I/O or wait", &violations);
}

#[test]
fn test_normalizer_is_pure() {
    let violations = find_patterns(
        "board/core/src/normalize",
        &["reqwest", "tokio", "std::fs", "std::net", ".await", "SystemClock", "Local::now"],
    );

    assert_no_violations("Normalizer must be a pure function", &violations);
}

#[test]
fn test_domain_model_has_no_io() {
    let mut violations = find_patterns(
        "board/core/src/model.rs",
        &["reqwest", "tokio", "std::fs", "std::net"],
    );
    violations.extend(find_patterns(
        "board/core/src/hours.rs",
        &["reqwest", "tokio", "std::fs", "std::net"],
    ));

    assert_no_violations("Domain model must not perform I/O", &violations);
}

#[test]
fn test_core_has_no_terminal_or_process_control() {
    let violations = find_patterns(
        "board/core/src",
        &["std::process::exit", "clap::", "tracing_subscriber", "signal::ctrl_c"],
    );

    assert_no_violations(
        "Process control, CLI parsing and log setup belong in the daemon",
        &violations,
    );
}
