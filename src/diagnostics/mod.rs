// src/diagnostics/mod.rs

//! Compiler diagnostics extracted from build output.
//!
//! - [`classifier`] recognises error and warning lines.
//! - [`sourcemap`] maps generated-code positions back to the original source.
//! - [`monitor`] ties both to a line stream and an output sink.

pub mod classifier;
pub mod issue;
pub mod monitor;
pub mod sourcemap;

pub use classifier::{classify_window, IssueClassifier};
pub use issue::{GradleIssue, IssueKind, SourceLocation};
pub use monitor::{IssueCounts, MonitorOptions, OutputMonitor};
pub use sourcemap::{
    source_map_path, MapEntry, Position, Range, Remapper, SourceFile, SourceMap, SourceMapError,
    DEFAULT_SOURCE_MAP_SUFFIX,
};
