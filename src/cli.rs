// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// Command-line arguments for `buildrelay`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "buildrelay",
    version,
    about = "Run a build tool, relay its output and map compiler diagnostics back to source.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// Default: `Buildrelay.toml` in the current working directory, if present.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `BUILDRELAY_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Parse + validate, print the resolved command, but don't run anything.
    #[arg(long)]
    pub dry_run: bool,

    /// Skip running the build tool and only parse test reports.
    #[arg(long)]
    pub tests_only: bool,

    /// Directory holding JUnit XML results (overrides `[tests].results_dir`).
    #[arg(long, value_name = "DIR")]
    pub results_dir: Option<PathBuf>,

    /// Command to run, overriding `[run].program` and `[run].args`.
    #[arg(last = true, value_name = "ARGV")]
    pub command: Vec<String>,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
