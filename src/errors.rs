// src/errors.rs

//! Crate-wide error aliases and helpers.
//!
//! Each subsystem owns a small closed error enum ([`ProcessError`],
//! [`SinkError`], [`SourceMapError`], [`ReportError`]); this module folds them
//! into one type for the orchestration layer in `lib.rs`.

use thiserror::Error;

pub use crate::diagnostics::SourceMapError;
pub use crate::exec::ProcessError;
pub use crate::report::ReportError;
pub use crate::sink::SinkError;

#[derive(Error, Debug)]
pub enum BuildrelayError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Process(#[from] ProcessError),

    #[error(transparent)]
    Report(#[from] ReportError),

    #[error(transparent)]
    SourceMap(#[from] SourceMapError),

    #[error(transparent)]
    Sink(#[from] SinkError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, BuildrelayError>;
