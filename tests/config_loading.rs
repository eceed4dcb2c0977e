mod common;

use std::io::Write;
use std::path::{Path, PathBuf};

use buildrelay::config::{
    load_and_validate, load_from_path, load_or_default, ConfigFile, ExitCheckSetting,
};
use buildrelay::errors::BuildrelayError;
use buildrelay::exec::ExitCheck;
use buildrelay_test_utils::builders::ConfigFileBuilder;
use common::{init_tracing, TestResult};
use tempfile::NamedTempFile;

fn write_config(contents: &str) -> Result<NamedTempFile, std::io::Error> {
    let mut file = NamedTempFile::new()?;
    file.write_all(contents.as_bytes())?;
    file.flush()?;
    Ok(file)
}

fn config_error(result: Result<ConfigFile, BuildrelayError>) -> String {
    match result {
        Err(BuildrelayError::ConfigError(message)) => message,
        other => panic!("expected a config error, got {other:?}"),
    }
}

#[test]
fn empty_file_yields_defaults() -> TestResult {
    init_tracing();
    let file = write_config("")?;
    let cfg = load_and_validate(file.path())?;

    assert_eq!(cfg.run.program, None);
    assert!(cfg.run.args.is_empty());
    assert!(cfg.run.inherit_env);
    assert!(cfg.run.merge_stderr);
    assert!(cfg.run.process_group);
    assert_eq!(cfg.run.exit_check, ExitCheckSetting::Zero);
    assert!(!cfg.run.json_lines);
    assert!(cfg.diagnostics.enabled);
    assert!(cfg.diagnostics.echo_output);
    assert_eq!(cfg.diagnostics.source_map_suffix, ".sourcemap");
    assert_eq!(cfg.tests.results_dir, None);
    assert_eq!(cfg.tests.pattern, "*.xml");
    Ok(())
}

#[test]
fn full_config_round_trips_every_field() -> TestResult {
    let file = write_config(
        r#"
[run]
program = "./gradlew"
args = ["assembleDebug", "--console=plain"]
env = { GRADLE_OPTS = "-Xmx2g", CI = "1" }
inherit_env = false
working_dir = "android"
merge_stderr = false
process_group = false
exit_check = "ignore"
log_file = "build/relay.log"
json_lines = true

[diagnostics]
enabled = false
echo_output = false
source_map_suffix = ".kmap"

[tests]
results_dir = "app/build/test-results"
pattern = "TEST-*.xml"
"#,
    )?;
    let cfg = load_and_validate(file.path())?;

    assert_eq!(cfg.run.program.as_deref(), Some("./gradlew"));
    assert_eq!(cfg.run.args, ["assembleDebug", "--console=plain"]);
    assert_eq!(cfg.run.env.get("GRADLE_OPTS").map(String::as_str), Some("-Xmx2g"));
    assert_eq!(cfg.run.env.len(), 2);
    assert!(!cfg.run.inherit_env);
    assert_eq!(cfg.run.working_dir, Some(PathBuf::from("android")));
    assert!(!cfg.run.merge_stderr);
    assert!(!cfg.run.process_group);
    assert_eq!(cfg.run.exit_check, ExitCheckSetting::Ignore);
    assert_eq!(ExitCheck::from(cfg.run.exit_check), ExitCheck::Ignore);
    assert_eq!(cfg.run.log_file, Some(PathBuf::from("build/relay.log")));
    assert!(cfg.run.json_lines);
    assert!(!cfg.diagnostics.enabled);
    assert!(!cfg.diagnostics.echo_output);
    assert_eq!(cfg.diagnostics.source_map_suffix, ".kmap");
    assert_eq!(cfg.tests.results_dir, Some(PathBuf::from("app/build/test-results")));
    assert_eq!(cfg.tests.pattern, "TEST-*.xml");
    Ok(())
}

#[test]
fn unknown_exit_check_is_a_toml_error() -> TestResult {
    let file = write_config("[run]\nexit_check = \"sometimes\"\n")?;
    assert!(matches!(
        load_from_path(file.path()),
        Err(BuildrelayError::TomlError(_))
    ));
    Ok(())
}

#[test]
fn empty_program_is_rejected() {
    let raw = ConfigFileBuilder::new().with_program("  ", &[]).raw();
    let message = config_error(ConfigFile::try_from(raw));
    assert!(message.contains("[run].program"), "{message}");
}

#[test]
fn args_without_program_are_rejected() {
    let mut raw = ConfigFileBuilder::new().raw();
    raw.run.args = vec!["build".to_string()];
    let message = config_error(ConfigFile::try_from(raw));
    assert!(message.contains("[run].args"), "{message}");
}

#[test]
fn env_names_with_equals_are_rejected() {
    let raw = ConfigFileBuilder::new()
        .with_program("make", &[])
        .with_env("A=B", "1")
        .raw();
    let message = config_error(ConfigFile::try_from(raw));
    assert!(message.contains("A=B"), "{message}");
}

#[test]
fn empty_source_map_suffix_is_rejected() {
    let mut raw = ConfigFileBuilder::new().raw();
    raw.diagnostics.source_map_suffix.clear();
    let message = config_error(ConfigFile::try_from(raw));
    assert!(message.contains("source_map_suffix"), "{message}");
}

#[test]
fn invalid_results_pattern_is_rejected() {
    let raw = ConfigFileBuilder::new().with_results_pattern("[oops").raw();
    let message = config_error(ConfigFile::try_from(raw));
    assert!(message.contains("[tests].pattern"), "{message}");

    let raw = ConfigFileBuilder::new().with_results_pattern(" ").raw();
    config_error(ConfigFile::try_from(raw));
}

#[test]
fn explicit_missing_path_is_an_error() {
    let missing = Path::new("/definitely/not/here/Buildrelay.toml");
    let message = config_error(load_or_default(Some(missing)));
    assert!(message.contains("Buildrelay.toml"), "{message}");
}

#[test]
fn explicit_path_is_loaded() -> TestResult {
    let file = write_config("[run]\nprogram = \"make\"\nargs = [\"all\"]\n")?;
    let cfg = load_or_default(Some(file.path()))?;
    assert_eq!(cfg.run.program.as_deref(), Some("make"));
    assert_eq!(cfg.run.args, ["all"]);
    Ok(())
}
