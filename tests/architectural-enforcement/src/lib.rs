//! Architectural Enforcement Integration Tests
//!
//! This package contains integration tests that enforce architectural principles:
//! - The render path never touches the network or waits on anything
//! - Normalisation is pure (no I/O, no runtime)
//! - No sleep() calls outside retry backoff
//! - No blocking I/O outside startup configuration loading
//!
//! The helpers here walk the workspace sources and return the production
//! lines (test modules and comments stripped) that the tests match against.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

/// One line of production code
#[derive(Debug, Clone)]
pub struct SourceLine {
    /// File the line came from
    pub path: PathBuf,
    /// 1-based line number
    pub number: usize,
    /// Line content with any trailing `//` comment removed
    pub code: String,
}

impl std::fmt::Display for SourceLine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{} - {}", self.path.display(), self.number, self.code.trim())
    }
}

/// Workspace root, resolved from this package's manifest directory
#[must_use]
pub fn workspace_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("..")
}

/// Path of a directory or file relative to the workspace root
#[must_use]
pub fn workspace_path(relative: &str) -> PathBuf {
    workspace_root().join(relative)
}

/// Every `.rs` file under `path` (or `path` itself when it is a file)
#[must_use]
pub fn rust_files(path: &Path) -> Vec<PathBuf> {
    if path.is_file() {
        return vec![path.to_path_buf()];
    }
    walkdir::WalkDir::new(path)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.path().extension().and_then(|s| s.to_str()) == Some("rs"))
        .map(|e| e.path().to_path_buf())
        .collect()
}

/// Production lines of one file
///
/// Everything from a top-level `#[cfg(test)]` onwards is treated as test
/// code, which matches how this workspace places its unit tests. Doc and
/// line comments are dropped.
#[must_use]
pub fn production_lines(path: &Path) -> Vec<SourceLine> {
    let Ok(content) = fs::read_to_string(path) else {
        return Vec::new();
    };

    content
        .lines()
        .enumerate()
        .take_while(|(_, line)| !line.starts_with("#[cfg(test)]"))
        .filter_map(|(idx, line)| {
            let code = line.split("//").next().unwrap_or(line);
            if code.trim().is_empty() {
                return None;
            }
            Some(SourceLine {
                path: path.to_path_buf(),
                number: idx + 1,
                code: code.to_string(),
            })
        })
        .collect()
}

/// Production lines under a workspace-relative directory or file
#[must_use]
pub fn production_code(relative: &str) -> Vec<SourceLine> {
    rust_files(&workspace_path(relative))
        .iter()
        .flat_map(|file| production_lines(file))
        .collect()
}

/// Lines under `relative` containing any of `patterns`
#[must_use]
pub fn find_patterns(relative: &str, patterns: &[&str]) -> Vec<SourceLine> {
    production_code(relative)
        .into_iter()
        .filter(|line| patterns.iter().any(|p| line.code.contains(p)))
        .collect()
}

/// Panic with a readable report when `violations` is non-empty
pub fn assert_no_violations(rule: &str, violations: &[SourceLine]) {
    if violations.is_empty() {
        return;
    }

    eprintln!("\n❌ {rule}\n");
    for violation in violations {
        eprintln!("  ❌ {violation}");
    }
    panic!(
        "\nFound {} violation(s) of: {rule}\nFix these before merging!",
        violations.len()
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workspace_root_contains_core() {
        assert!(workspace_path("board/core/src/lib.rs").exists());
    }

    #[test]
    fn test_test_modules_are_excluded() {
        let lines = production_code("board/core/src/bus.rs");
        assert!(!lines.is_empty());
        assert!(lines.iter().all(|l| !l.code.contains("mod tests")));
    }
}
