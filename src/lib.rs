// src/lib.rs

pub mod cli;
pub mod config;
pub mod diagnostics;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod logging;
pub mod report;
pub mod sink;
pub mod stream;

use std::io;
use std::path::Path;

use anyhow::{Context, Result};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::cli::CliArgs;
use crate::config::{load_or_default, ConfigFile};
use crate::diagnostics::{MonitorOptions, OutputMonitor, Remapper};
use crate::errors::BuildrelayError;
use crate::exec::{Command, ExitCheck, Process, ProcessError, ProcessResult};
use crate::report::{summarize, ReportError, ReportParser, TestSummary};
use crate::sink::{ByteSink, FileSink, SharedSink, WriterSink};
use crate::stream::{LineOptions, LineStream};

type Terminal = SharedSink<WriterSink<io::Stdout>>;

/// High-level entry point used by `main.rs`.
///
/// Runs the configured build tool (unless `--tests-only`), relays its output
/// with diagnostics to stdout, then summarises test reports when a results
/// directory is known. Returns whether everything succeeded.
pub async fn run(args: CliArgs) -> Result<bool> {
    let mut cfg = load_or_default(args.config.as_deref())?;
    if let Some(dir) = &args.results_dir {
        cfg.tests.results_dir = Some(dir.clone());
    }

    if args.dry_run {
        print_dry_run(&cfg, &args.command, args.tests_only);
        return Ok(true);
    }

    let mut success = true;
    if !args.tests_only {
        let command = build_command(&cfg, &args.command)?;
        success = run_build(&cfg, command).await?;
    }

    if let Some(dir) = &cfg.tests.results_dir {
        match report_tests(&cfg, dir) {
            Ok(summary) => {
                println!("{summary}");
                success &= summary.is_success();
            }
            Err(ReportError::MissingDirectory(dir)) if !success => {
                warn!(dir = %dir.display(), "build failed before writing test results");
            }
            Err(err) => return Err(err.into()),
        }
    }

    Ok(success)
}

/// Resolve the command to run. A non-empty `argv_override` replaces
/// `[run].program` and `[run].args`; everything else still comes from `[run]`.
pub fn build_command(cfg: &ConfigFile, argv_override: &[String]) -> errors::Result<Command> {
    let run = &cfg.run;
    let mut command = if !argv_override.is_empty() {
        Command::from_argv(argv_override.iter().cloned())
    } else if let Some(program) = &run.program {
        Command::new(program.clone()).args(run.args.iter().cloned())
    } else {
        return Err(BuildrelayError::ConfigError(
            "no command to run: set [run].program or pass one after `--`".to_string(),
        ));
    };

    command = command
        .envs(run.env.clone())
        .process_group(run.process_group);
    if !run.inherit_env {
        command = command.env_clear();
    }
    if let Some(dir) = &run.working_dir {
        command = command.current_dir(dir.clone());
    }
    Ok(command)
}

/// Parse the reports under `dir` with the configured file pattern.
pub fn report_tests(cfg: &ConfigFile, dir: &Path) -> std::result::Result<TestSummary, ReportError> {
    let parser = ReportParser::default().with_pattern(&cfg.tests.pattern)?;
    let suites = parser.parse_dir(dir)?;
    Ok(summarize(&suites))
}

async fn run_build(cfg: &ConfigFile, command: Command) -> Result<bool> {
    let exit_check: ExitCheck = cfg.run.exit_check.into();
    let mut options = LineOptions::default()
        .merge_stderr(cfg.run.merge_stderr)
        .exit_check(exit_check);

    let log = match &cfg.run.log_file {
        Some(path) => {
            let sink = FileSink::create(path)
                .with_context(|| format!("opening build log {}", path.display()))?;
            Some(SharedSink::new(sink))
        }
        None => None,
    };
    if let Some(log) = &log {
        options = options.tee(log.clone());
    }

    // stdout keeps its own line buffering; ours would delay live output.
    let terminal: Terminal = SharedSink::new(WriterSink::with_block_size(io::stdout(), "<stdout>", 1));

    info!(command = %command, "starting build tool");
    let outcome = if cfg.run.json_lines {
        relay_json(command, options, terminal.clone()).await?
    } else if cfg.diagnostics.enabled {
        relay_diagnostics(cfg, command, options, terminal.clone()).await?
    } else {
        relay_plain(command, options, terminal.clone()).await?
    };

    close_sink(terminal, "terminal");
    if let Some(log) = log {
        close_sink(log, "build log");
    }

    match outcome {
        Ok(result) => {
            info!(status = %result.status, "build tool finished");
            Ok(true)
        }
        Err(err @ ProcessError::UnexpectedExit { .. }) => {
            error!("{err}");
            Ok(false)
        }
        Err(err) => Err(err.into()),
    }
}

type Outcome = std::result::Result<ProcessResult, ProcessError>;

async fn relay_diagnostics(
    cfg: &ConfigFile,
    command: Command,
    options: LineOptions,
    terminal: Terminal,
) -> Result<Outcome> {
    let mut lines = stream::lines(command, options)?;
    let interrupts = forward_interrupts(lines.process().clone());

    let remapper = Remapper::default().with_suffix(cfg.diagnostics.source_map_suffix.clone());
    let monitor_options = MonitorOptions {
        echo_output: cfg.diagnostics.echo_output,
    };
    let mut monitor = OutputMonitor::new(terminal, Some(remapper), monitor_options);
    let outcome = monitor.consume(&mut lines).await;
    interrupts.abort();

    let counts = monitor.counts();
    info!(
        errors = counts.errors,
        warnings = counts.warnings,
        "diagnostics reported"
    );
    Ok(outcome)
}

async fn relay_plain(
    command: Command,
    options: LineOptions,
    mut terminal: Terminal,
) -> Result<Outcome> {
    let mut lines = stream::lines(command, options)?;
    let interrupts = forward_interrupts(lines.process().clone());
    while let Some(item) = lines.next_line().await {
        match item {
            Ok(line) => terminal.write_line(&line),
            Err(_) if lines.is_finished() => {}
            Err(err) => warn!(error = %err, "skipping undecodable output line"),
        }
    }
    interrupts.abort();
    Ok(lines.finish().await)
}

async fn relay_json(
    command: Command,
    options: LineOptions,
    mut terminal: Terminal,
) -> Result<Outcome> {
    let mut lines: LineStream<serde_json::Value> = stream::json_lines(command, options)?;
    let interrupts = forward_interrupts(lines.process().clone());
    while let Some(item) = lines.next_line().await {
        match item {
            Ok(value) => terminal.write_line(&value.to_string()),
            Err(_) if lines.is_finished() => {}
            Err(err) => warn!(error = %err, "skipping malformed JSON line"),
        }
    }
    interrupts.abort();
    Ok(lines.finish().await)
}

/// Relay Ctrl-C to the child. It runs in its own process group, so the
/// terminal's SIGINT does not reach it directly. The first press interrupts
/// the child; any further press kills it, since our own handler stays
/// installed and would otherwise swallow every later Ctrl-C.
fn forward_interrupts(process: Process) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut presses = 0u32;
        loop {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "failed to listen for Ctrl+C");
                return;
            }
            presses += 1;
            interrupt(&process, presses);
        }
    })
}

/// Signal for the `presses`-th Ctrl-C.
#[cfg(unix)]
fn interrupt_signal(presses: u32) -> exec::Signal {
    if presses > 1 {
        exec::Signal::SIGKILL
    } else {
        exec::Signal::SIGINT
    }
}

#[cfg(unix)]
fn interrupt(process: &Process, presses: u32) {
    let signal = interrupt_signal(presses);
    match process.signal(signal) {
        Ok(()) if presses > 1 => warn!(pid = ?process.pid(), "killed build tool after repeated interrupt"),
        Ok(()) => info!(
            pid = ?process.pid(),
            "forwarded interrupt to build tool; press Ctrl-C again to kill it"
        ),
        Err(err) => warn!(error = %err, %signal, "could not interrupt build tool"),
    }
}

#[cfg(not(unix))]
fn interrupt(process: &Process, presses: u32) {
    debug!(pid = ?process.pid(), presses, "interrupt forwarding is unix-only");
}

fn close_sink<S: ByteSink>(mut sink: S, name: &str) {
    if let Err(err) = sink.close() {
        warn!(sink = name, error = %err, "closing output failed");
    }
}

/// Print the resolved invocation without running anything.
fn print_dry_run(cfg: &ConfigFile, argv_override: &[String], tests_only: bool) {
    println!("buildrelay dry-run");
    if tests_only {
        println!("  command: (skipped, --tests-only)");
    } else {
        match build_command(cfg, argv_override) {
            Ok(command) => println!("  command: {command}"),
            Err(err) => println!("  command: <none> ({err})"),
        }
    }
    let run = &cfg.run;
    if let Some(dir) = &run.working_dir {
        println!("  working_dir: {}", dir.display());
    }
    if !run.env.is_empty() {
        println!("  env: {:?}", run.env);
    }
    println!("  inherit_env: {}", run.inherit_env);
    println!("  merge_stderr: {}", run.merge_stderr);
    println!("  process_group: {}", run.process_group);
    println!("  exit_check: {:?}", run.exit_check);
    if let Some(log) = &run.log_file {
        println!("  log_file: {}", log.display());
    }
    if run.json_lines {
        println!("  json_lines: true");
    }
    println!();

    let diagnostics = &cfg.diagnostics;
    println!("diagnostics:");
    println!("  enabled: {}", diagnostics.enabled);
    println!("  echo_output: {}", diagnostics.echo_output);
    println!("  source_map_suffix: {}", diagnostics.source_map_suffix);
    println!();

    println!("tests:");
    match &cfg.tests.results_dir {
        Some(dir) => println!("  results_dir: {}", dir.display()),
        None => println!("  results_dir: (none)"),
    }
    println!("  pattern: {}", cfg.tests.pattern);

    debug!("dry-run complete (no execution)");
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn repeated_interrupts_escalate_to_kill() {
        assert_eq!(interrupt_signal(1), exec::Signal::SIGINT);
        assert_eq!(interrupt_signal(2), exec::Signal::SIGKILL);
        assert_eq!(interrupt_signal(5), exec::Signal::SIGKILL);
    }
}
