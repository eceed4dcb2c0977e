mod common;

use std::path::Path;

use buildrelay::cli::CliArgs;
use buildrelay::config::ExitCheckSetting;
use buildrelay::errors::BuildrelayError;
use buildrelay::report::ReportError;
use buildrelay::{build_command, report_tests, run};
use buildrelay_test_utils::builders::{ConfigFileBuilder, JunitSuiteBuilder};
use buildrelay_test_utils::script::ScriptDir;
use clap::Parser;
use common::{init_tracing, with_timeout, TestResult};

fn args(argv: &[&str]) -> Result<CliArgs, clap::Error> {
    CliArgs::try_parse_from(std::iter::once("buildrelay").chain(argv.iter().copied()))
}

#[test]
fn trailing_argv_is_the_command() -> TestResult {
    let parsed = args(&["--results-dir", "out", "--", "./gradlew", "test", "--info"])?;
    assert_eq!(parsed.command, ["./gradlew", "test", "--info"]);
    assert_eq!(parsed.results_dir.as_deref(), Some(Path::new("out")));
    assert!(!parsed.dry_run);
    Ok(())
}

#[test]
fn command_comes_from_config() -> TestResult {
    let cfg = ConfigFileBuilder::new()
        .with_program("./gradlew", &["assembleDebug"])
        .with_env("CI", "1")
        .with_working_dir("/work")
        .build();
    let command = build_command(&cfg, &[])?;

    assert_eq!(command.argv(), ["./gradlew", "assembleDebug"]);
    assert_eq!(command.env_vars().get("CI").map(String::as_str), Some("1"));
    assert_eq!(command.cwd(), Some(Path::new("/work")));
    assert!(command.inherits_env());
    assert!(command.uses_process_group());
    Ok(())
}

#[test]
fn argv_override_replaces_program_but_keeps_environment() -> TestResult {
    let cfg = ConfigFileBuilder::new()
        .with_program("./gradlew", &["assembleDebug"])
        .with_env("CI", "1")
        .build();
    let argv = vec!["make".to_string(), "check".to_string()];
    let command = build_command(&cfg, &argv)?;

    assert_eq!(command.argv(), ["make", "check"]);
    assert_eq!(command.env_vars().len(), 1);
    Ok(())
}

#[test]
fn no_program_anywhere_is_a_config_error() {
    let cfg = ConfigFileBuilder::new().build();
    assert!(matches!(
        build_command(&cfg, &[]),
        Err(BuildrelayError::ConfigError(_))
    ));
}

#[test]
fn report_tests_uses_configured_pattern() -> TestResult {
    let dir = ScriptDir::new()?;
    dir.file(
        "testDebugUnitTest/TEST-Math.xml",
        &JunitSuiteBuilder::new("Math").passing("adds", "0.1").build(),
    )?;
    dir.file(
        "testDebugUnitTest/TEST-Broken.xml",
        &JunitSuiteBuilder::new("Broken").failing("divides", "by zero", "trace").build(),
    )?;

    let cfg = ConfigFileBuilder::new().build();
    let summary = report_tests(&cfg, dir.path())?;
    assert_eq!(summary.suites, 2);
    assert!(!summary.is_success());

    let cfg = ConfigFileBuilder::new().with_results_pattern("*Math.xml").build();
    let summary = report_tests(&cfg, dir.path())?;
    assert_eq!(summary.suites, 1);
    assert!(summary.is_success());
    Ok(())
}

#[test]
fn report_tests_on_missing_directory() {
    let cfg = ConfigFileBuilder::new().build();
    assert!(matches!(
        report_tests(&cfg, Path::new("/no/such/results")),
        Err(ReportError::MissingDirectory(_))
    ));
}

#[tokio::test]
async fn tests_only_run_reflects_report_outcome() -> TestResult {
    init_tracing();
    let dir = ScriptDir::new()?;
    dir.file(
        "test/TEST-Ok.xml",
        &JunitSuiteBuilder::new("Ok").passing("works", "0.1").build(),
    )?;
    let config = dir.file("Buildrelay.toml", "")?;
    let results = dir.path().to_string_lossy().into_owned();

    let parsed = args(&[
        "--config",
        &config.to_string_lossy(),
        "--tests-only",
        "--results-dir",
        &results,
    ])?;
    assert!(with_timeout(run(parsed)).await?);

    dir.file(
        "test/TEST-Bad.xml",
        &JunitSuiteBuilder::new("Bad").failing("breaks", "nope", "trace").build(),
    )?;
    let parsed = args(&[
        "--config",
        &config.to_string_lossy(),
        "--tests-only",
        "--results-dir",
        &results,
    ])?;
    assert!(!with_timeout(run(parsed)).await?);
    Ok(())
}

#[tokio::test]
async fn dry_run_launches_nothing() -> TestResult {
    let dir = ScriptDir::new()?;
    let marker = dir.path().join("ran");
    let config = dir.file("Buildrelay.toml", "")?;
    let parsed = args(&[
        "--config",
        &config.to_string_lossy(),
        "--dry-run",
        "--",
        "touch",
        &marker.to_string_lossy(),
    ])?;
    assert!(run(parsed).await?);
    assert!(!marker.exists());
    Ok(())
}

#[cfg(unix)]
mod with_processes {
    use super::*;

    fn config_for(dir: &ScriptDir, exit_check: &str) -> Result<String, anyhow::Error> {
        let path = dir.file(
            "Buildrelay.toml",
            &format!("[run]\nexit_check = \"{exit_check}\"\n"),
        )?;
        Ok(path.to_string_lossy().into_owned())
    }

    #[tokio::test]
    async fn failing_build_is_reported_as_unsuccessful() -> TestResult {
        init_tracing();
        let dir = ScriptDir::new()?;
        let config = config_for(&dir, "zero")?;
        let parsed = args(&["--config", &config, "--", "/bin/sh", "-c", "echo building; exit 3"])?;
        assert!(!with_timeout(run(parsed)).await?);
        Ok(())
    }

    #[tokio::test]
    async fn ignored_exit_status_counts_as_success() -> TestResult {
        let dir = ScriptDir::new()?;
        let config = config_for(&dir, "ignore")?;
        let parsed = args(&["--config", &config, "--", "/bin/sh", "-c", "exit 3"])?;
        assert!(with_timeout(run(parsed)).await?);
        Ok(())
    }

    #[tokio::test]
    async fn build_log_receives_raw_output() -> TestResult {
        let dir = ScriptDir::new()?;
        let log = dir.path().join("build.log");
        let config = dir.file(
            "Buildrelay.toml",
            &format!("[run]\nlog_file = {:?}\n", log.to_string_lossy()),
        )?;
        let parsed = args(&[
            "--config",
            &config.to_string_lossy(),
            "--",
            "/bin/sh",
            "-c",
            "echo first; echo second >&2",
        ])?;
        assert!(with_timeout(run(parsed)).await?);

        let contents = std::fs::read_to_string(&log)?;
        assert!(contents.contains("first\n"), "{contents}");
        assert!(contents.contains("second\n"), "{contents}");
        Ok(())
    }

    #[tokio::test]
    async fn missing_results_after_failed_build_is_not_fatal() -> TestResult {
        let dir = ScriptDir::new()?;
        let config = config_for(&dir, "zero")?;
        let parsed = args(&[
            "--config",
            &config,
            "--results-dir",
            "/no/such/results",
            "--",
            "/bin/sh",
            "-c",
            "exit 1",
        ])?;
        assert!(!with_timeout(run(parsed)).await?);
        Ok(())
    }

    #[test]
    fn exit_check_setting_parses_from_config() -> TestResult {
        let dir = ScriptDir::new()?;
        let config = config_for(&dir, "ignore")?;
        let cfg = buildrelay::config::load_and_validate(&config)?;
        assert_eq!(cfg.run.exit_check, ExitCheckSetting::Ignore);
        Ok(())
    }
}

#[test]
fn log_level_names_from_environment() {
    use buildrelay::logging::parse_level_str;

    assert_eq!(parse_level_str("debug"), Some(tracing::Level::DEBUG));
    assert_eq!(parse_level_str(" Warning "), Some(tracing::Level::WARN));
    assert_eq!(parse_level_str("loud"), None);
}
