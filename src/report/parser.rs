// src/report/parser.rs

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use globset::{Glob, GlobMatcher};
use roxmltree::{Document, Node};
use tracing::{debug, info};

use super::model::{TestCase, TestFailure, TestSuite};
use super::ReportError;
use crate::fs::{FileSystem, RealFileSystem};

pub const DEFAULT_RESULTS_PATTERN: &str = "*.xml";

/// Reads JUnit-style XML reports from a results directory.
///
/// Gradle writes one directory per test task (`test-results/testDebugUnitTest/`),
/// so report files are looked for directly inside the results directory and
/// one level below it. Files whose name does not match the pattern are
/// skipped.
#[derive(Debug, Clone)]
pub struct ReportParser {
    fs: Arc<dyn FileSystem>,
    pattern: GlobMatcher,
}

impl Default for ReportParser {
    fn default() -> Self {
        Self::new(Arc::new(RealFileSystem))
    }
}

impl ReportParser {
    pub fn new(fs: Arc<dyn FileSystem>) -> Self {
        let pattern = Glob::new(DEFAULT_RESULTS_PATTERN)
            .map(|glob| glob.compile_matcher())
            .expect("default results pattern is a valid glob");
        Self { fs, pattern }
    }

    pub fn with_pattern(mut self, pattern: &str) -> Result<Self, ReportError> {
        self.pattern = Glob::new(pattern)
            .map_err(|source| ReportError::InvalidPattern {
                pattern: pattern.to_string(),
                source,
            })?
            .compile_matcher();
        Ok(self)
    }

    /// Report files under `dir`, in a stable order.
    pub fn report_files(&self, dir: &Path) -> Result<Vec<PathBuf>, ReportError> {
        if !self.fs.is_dir(dir) {
            return Err(ReportError::MissingDirectory(dir.to_path_buf()));
        }

        let mut files = Vec::new();
        for entry in self.sorted_entries(dir)? {
            if self.fs.is_dir(&entry) {
                for nested in self.sorted_entries(&entry)? {
                    if self.is_report(&nested) {
                        files.push(nested);
                    }
                }
            } else if self.is_report(&entry) {
                files.push(entry);
            }
        }
        Ok(files)
    }

    /// Parse every report under `dir`.
    ///
    /// Any unreadable or malformed report fails the whole call.
    pub fn parse_dir(&self, dir: &Path) -> Result<Vec<TestSuite>, ReportError> {
        let mut suites = Vec::new();
        for file in self.report_files(dir)? {
            suites.extend(self.parse_file(&file)?);
        }
        info!(
            dir = %dir.display(),
            suites = suites.len(),
            "parsed test reports"
        );
        Ok(suites)
    }

    pub fn parse_file(&self, path: &Path) -> Result<Vec<TestSuite>, ReportError> {
        let text = self
            .fs
            .read_to_string(path)
            .map_err(|err| ReportError::Io {
                path: path.to_path_buf(),
                message: format!("{err:#}"),
            })?;
        parse_report(path, &text)
    }

    fn sorted_entries(&self, dir: &Path) -> Result<Vec<PathBuf>, ReportError> {
        let mut entries = self.fs.read_dir(dir).map_err(|err| ReportError::Io {
            path: dir.to_path_buf(),
            message: format!("{err:#}"),
        })?;
        entries.sort();
        Ok(entries)
    }

    fn is_report(&self, path: &Path) -> bool {
        self.fs.is_file(path)
            && path
                .file_name()
                .is_some_and(|name| self.pattern.is_match(Path::new(name)))
    }
}

/// Parse one XML document. `path` is only used for error messages.
///
/// A document whose root is neither `<testsuite>` nor `<testsuites>` yields
/// no suites.
pub fn parse_report(path: &Path, text: &str) -> Result<Vec<TestSuite>, ReportError> {
    let doc = Document::parse(text).map_err(|source| ReportError::Xml {
        path: path.to_path_buf(),
        source,
    })?;
    let root = doc.root_element();

    match root.tag_name().name() {
        "testsuite" => Ok(vec![parse_suite(path, root)?]),
        "testsuites" => root
            .children()
            .filter(|node| node.has_tag_name("testsuite"))
            .map(|node| parse_suite(path, node))
            .collect(),
        other => {
            debug!(path = %path.display(), root = other, "not a test report; skipping");
            Ok(Vec::new())
        }
    }
}

fn parse_suite(path: &Path, node: Node<'_, '_>) -> Result<TestSuite, ReportError> {
    let mut suite = TestSuite {
        name: node.attribute("name").unwrap_or_default().to_string(),
        tests: required(path, node, "tests")?,
        skipped: optional(path, node, "skipped")?.unwrap_or(0),
        failures: required(path, node, "failures")?,
        errors: required(path, node, "errors")?,
        duration: duration(path, node, required_raw(path, node, "time")?)?,
        ..TestSuite::default()
    };

    for child in node.children().filter(Node::is_element) {
        match child.tag_name().name() {
            "testcase" => suite.test_cases.push(parse_case(path, child)?),
            "system-out" => suite.system_out.push_str(&text_of(child)),
            "system-err" => suite.system_err.push_str(&text_of(child)),
            _ => {}
        }
    }
    Ok(suite)
}

fn parse_case(path: &Path, node: Node<'_, '_>) -> Result<TestCase, ReportError> {
    let duration = match node.attribute("time") {
        Some(raw) => duration(path, node, raw)?,
        None => Duration::ZERO,
    };
    let mut case = TestCase {
        name: node.attribute("name").unwrap_or_default().to_string(),
        classname: node.attribute("classname").map(str::to_string),
        duration,
        ..TestCase::default()
    };

    for child in node.children().filter(Node::is_element) {
        match child.tag_name().name() {
            "skipped" => case.skipped = true,
            name @ ("failure" | "error") => case.failures.push(TestFailure {
                message: child.attribute("message").unwrap_or_default().to_string(),
                kind: child.attribute("type").map(str::to_string),
                contents: Some(text_of(child)).filter(|text| !text.trim().is_empty()),
                is_error: name == "error",
            }),
            _ => {}
        }
    }
    Ok(case)
}

fn text_of(node: Node<'_, '_>) -> String {
    node.descendants()
        .filter(Node::is_text)
        .filter_map(|text| text.text())
        .collect()
}

fn required_raw<'a>(
    path: &Path,
    node: Node<'a, '_>,
    attribute: &str,
) -> Result<&'a str, ReportError> {
    node.attribute(attribute)
        .ok_or_else(|| ReportError::MissingAttribute {
            path: path.to_path_buf(),
            element: node.tag_name().name().to_string(),
            attribute: attribute.to_string(),
        })
}

fn required<T: FromStr>(path: &Path, node: Node<'_, '_>, attribute: &str) -> Result<T, ReportError> {
    let raw = required_raw(path, node, attribute)?;
    parse_value(path, node, attribute, raw)
}

fn optional<T: FromStr>(
    path: &Path,
    node: Node<'_, '_>,
    attribute: &str,
) -> Result<Option<T>, ReportError> {
    node.attribute(attribute)
        .map(|raw| parse_value(path, node, attribute, raw))
        .transpose()
}

fn parse_value<T: FromStr>(
    path: &Path,
    node: Node<'_, '_>,
    attribute: &str,
    raw: &str,
) -> Result<T, ReportError> {
    raw.trim()
        .parse()
        .map_err(|_| invalid(path, node, attribute, raw))
}

/// Seconds as written by JVM runners, which may group thousands with commas.
fn duration(path: &Path, node: Node<'_, '_>, raw: &str) -> Result<Duration, ReportError> {
    let seconds: f64 = raw
        .trim()
        .replace(',', "")
        .parse()
        .map_err(|_| invalid(path, node, "time", raw))?;
    Duration::try_from_secs_f64(seconds).map_err(|_| invalid(path, node, "time", raw))
}

fn invalid(path: &Path, node: Node<'_, '_>, attribute: &str, raw: &str) -> ReportError {
    ReportError::InvalidAttribute {
        path: path.to_path_buf(),
        element: node.tag_name().name().to_string(),
        attribute: attribute.to_string(),
        value: raw.to_string(),
    }
}
