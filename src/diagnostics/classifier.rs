// src/diagnostics/classifier.rs

//! Line classification for build tool output.
//!
//! Each line is looked at together with the line before it. Matchers are
//! tried in a fixed order and the first hit wins:
//!
//! 1. Single-line compiler diagnostics (`e: file:///a/B.kt:3:7 message`).
//! 2. A range header followed by its message on the next line
//!    (`B.kt:3:7-12 Error:` then `message`).
//! 3. Literal heuristics for build failures that carry no position.

use std::path::PathBuf;
use std::sync::LazyLock;

use regex::{Captures, Regex};
use url::Url;

use super::issue::{GradleIssue, IssueKind, SourceLocation};

static SINGLE_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?P<sev>[ew]): (?P<path>.+?):(?P<line>\d+):(?P<col>\d+) (?P<msg>.*)$",
    )
    .expect("constant regex pattern is valid")
});

// Newer Kotlin compilers print `(line, col)` instead of `:line:col`.
static SINGLE_LINE_PAREN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?P<sev>[ew]): (?P<path>.+?): \((?P<line>\d+), (?P<col>\d+)\): (?P<msg>.*)$",
    )
    .expect("constant regex pattern is valid")
});

static RANGE_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?P<path>.+?):(?P<line>\d+):(?P<col>\d+)-(?P<end>\d+)\s+(?P<sev>Error|Warning):?\s*$",
    )
    .expect("constant regex pattern is valid")
});

const WHAT_WENT_WRONG: &str = "* What went wrong:";
const PLUGIN_FAILURE: &str = "An exception occurred applying plugin request";
const INSTALL_FAILED: &str = "INSTALL_FAILED";
const INSTALL_PREFIXES: &[&str] = &["adb: failed to install", "Failure [INSTALL"];

/// Stateful classifier holding the previous line of the sliding window.
#[derive(Debug, Default, Clone)]
pub struct IssueClassifier {
    previous: Option<String>,
}

impl IssueClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Classify `line` and then slide the window forward.
    pub fn classify(&mut self, line: &str) -> Option<GradleIssue> {
        let issue = classify_window(self.previous.as_deref(), line);
        self.previous = Some(line.to_string());
        issue
    }

    pub fn previous(&self) -> Option<&str> {
        self.previous.as_deref()
    }

    pub fn reset(&mut self) {
        self.previous = None;
    }
}

/// Classify `line` given the line before it, if any.
pub fn classify_window(previous: Option<&str>, line: &str) -> Option<GradleIssue> {
    single_line(line)
        .or_else(|| previous.and_then(|prev| range_pair(prev, line)))
        .or_else(|| heuristic(previous, line))
}

fn single_line(line: &str) -> Option<GradleIssue> {
    let caps = SINGLE_LINE
        .captures(line)
        .or_else(|| SINGLE_LINE_PAREN.captures(line))?;
    let kind = match &caps["sev"] {
        "e" => IssueKind::Error,
        _ => IssueKind::Warning,
    };
    let location = location_from(&caps)?;
    Some(GradleIssue {
        kind,
        message: caps["msg"].trim().to_string(),
        location: Some(location),
    })
}

fn range_pair(previous: &str, line: &str) -> Option<GradleIssue> {
    let caps = RANGE_HEADER.captures(previous.trim_end())?;
    let message = line.trim();
    if message.is_empty() {
        return None;
    }
    let kind = match &caps["sev"] {
        "Error" => IssueKind::Error,
        _ => IssueKind::Warning,
    };
    Some(GradleIssue {
        kind,
        message: message.to_string(),
        location: Some(location_from(&caps)?),
    })
}

fn heuristic(previous: Option<&str>, line: &str) -> Option<GradleIssue> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }
    if previous.is_some_and(|prev| prev.trim() == WHAT_WENT_WRONG) {
        return Some(GradleIssue::error(trimmed));
    }
    if trimmed.contains(PLUGIN_FAILURE)
        || trimmed.contains(INSTALL_FAILED)
        || INSTALL_PREFIXES.iter().any(|prefix| trimmed.starts_with(prefix))
    {
        return Some(GradleIssue::error(trimmed));
    }
    None
}

fn location_from(caps: &Captures<'_>) -> Option<SourceLocation> {
    Some(SourceLocation {
        path: decode_path(&caps["path"]),
        line: caps["line"].parse().ok()?,
        column: caps["col"].parse().ok()?,
    })
}

/// Plain paths pass through; `file://` URIs are percent-decoded.
fn decode_path(raw: &str) -> PathBuf {
    if raw.starts_with("file:") {
        if let Some(path) = Url::parse(raw).ok().and_then(|url| url.to_file_path().ok()) {
            return path;
        }
        return PathBuf::from(raw.trim_start_matches("file://"));
    }
    PathBuf::from(raw)
}
