// src/report/model.rs

use std::fmt;
use std::time::Duration;

/// One `<testsuite>` element.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TestSuite {
    pub name: String,
    pub tests: u32,
    pub skipped: u32,
    pub failures: u32,
    pub errors: u32,
    pub duration: Duration,
    /// All suite-level `<system-out>` text, concatenated in document order.
    pub system_out: String,
    pub system_err: String,
    pub test_cases: Vec<TestCase>,
}

impl TestSuite {
    pub fn failed_cases(&self) -> impl Iterator<Item = &TestCase> {
        self.test_cases.iter().filter(|case| case.failed())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TestCase {
    pub name: String,
    pub classname: Option<String>,
    pub duration: Duration,
    pub skipped: bool,
    pub failures: Vec<TestFailure>,
}

impl TestCase {
    pub fn failed(&self) -> bool {
        !self.failures.is_empty()
    }

    pub fn passed(&self) -> bool {
        !self.skipped && self.failures.is_empty()
    }

    /// `classname.name`, or just the name when there is no class.
    pub fn qualified_name(&self) -> String {
        match &self.classname {
            Some(class) if !class.is_empty() => format!("{class}.{}", self.name),
            _ => self.name.clone(),
        }
    }
}

/// A `<failure>` or `<error>` child of a test case.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TestFailure {
    pub message: String,
    /// The `type` attribute, usually an exception class.
    pub kind: Option<String>,
    /// Element text, usually a stack trace.
    pub contents: Option<String>,
    /// Came from `<error>` rather than `<failure>`.
    pub is_error: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedCase {
    pub suite: String,
    pub name: String,
    pub message: String,
}

/// Totals across a set of parsed suites.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TestSummary {
    pub suites: usize,
    pub tests: u32,
    pub skipped: u32,
    pub failures: u32,
    pub errors: u32,
    pub duration: Duration,
    pub failed_cases: Vec<FailedCase>,
}

impl TestSummary {
    pub fn passed(&self) -> u32 {
        self.tests
            .saturating_sub(self.skipped)
            .saturating_sub(self.failures)
            .saturating_sub(self.errors)
    }

    pub fn is_success(&self) -> bool {
        self.failures == 0 && self.errors == 0
    }
}

impl fmt::Display for TestSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} tests in {} suites: {} passed, {} skipped, {} failed, {} errors ({:.2}s)",
            self.tests,
            self.suites,
            self.passed(),
            self.skipped,
            self.failures,
            self.errors,
            self.duration.as_secs_f64()
        )?;
        for case in &self.failed_cases {
            write!(f, "\n  FAILED {} > {}", case.suite, case.name)?;
            if !case.message.is_empty() {
                write!(f, ": {}", case.message)?;
            }
        }
        Ok(())
    }
}

pub fn summarize(suites: &[TestSuite]) -> TestSummary {
    let mut summary = TestSummary {
        suites: suites.len(),
        ..TestSummary::default()
    };
    for suite in suites {
        summary.tests += suite.tests;
        summary.skipped += suite.skipped;
        summary.failures += suite.failures;
        summary.errors += suite.errors;
        summary.duration += suite.duration;
        for case in suite.failed_cases() {
            summary.failed_cases.push(FailedCase {
                suite: suite.name.clone(),
                name: case.qualified_name(),
                message: case
                    .failures
                    .first()
                    .map(|failure| failure.message.clone())
                    .unwrap_or_default(),
            });
        }
    }
    summary
}
