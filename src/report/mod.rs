// src/report/mod.rs

//! JUnit-style XML test reports produced by the build tool.

use std::path::PathBuf;

use thiserror::Error;

pub mod model;
pub mod parser;

pub use model::{summarize, FailedCase, TestCase, TestFailure, TestSuite, TestSummary};
pub use parser::{parse_report, ReportParser, DEFAULT_RESULTS_PATTERN};

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("test results directory {} does not exist", .0.display())]
    MissingDirectory(PathBuf),

    #[error("reading {}: {message}", .path.display())]
    Io { path: PathBuf, message: String },

    #[error("parsing {}: {source}", .path.display())]
    Xml {
        path: PathBuf,
        #[source]
        source: roxmltree::Error,
    },

    #[error("{}: <{element}> is missing required attribute `{attribute}`", .path.display())]
    MissingAttribute {
        path: PathBuf,
        element: String,
        attribute: String,
    },

    #[error("{}: <{element}> has invalid `{attribute}` value {value:?}", .path.display())]
    InvalidAttribute {
        path: PathBuf,
        element: String,
        attribute: String,
        value: String,
    },

    #[error("invalid results file pattern {pattern:?}: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: globset::Error,
    },
}
