// src/config/validate.rs

use globset::Glob;

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{BuildrelayError, Result};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = BuildrelayError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw.run, raw.diagnostics, raw.tests))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    validate_run(cfg)?;
    validate_diagnostics(cfg)?;
    validate_tests(cfg)?;
    Ok(())
}

fn validate_run(cfg: &RawConfigFile) -> Result<()> {
    if let Some(program) = &cfg.run.program {
        if program.trim().is_empty() {
            return Err(BuildrelayError::ConfigError(
                "[run].program must not be empty".to_string(),
            ));
        }
    }
    if cfg.run.program.is_none() && !cfg.run.args.is_empty() {
        return Err(BuildrelayError::ConfigError(
            "[run].args given without [run].program".to_string(),
        ));
    }
    for key in cfg.run.env.keys() {
        if key.is_empty() || key.contains('=') {
            return Err(BuildrelayError::ConfigError(format!(
                "[run].env has invalid variable name '{}'",
                key
            )));
        }
    }
    Ok(())
}

fn validate_diagnostics(cfg: &RawConfigFile) -> Result<()> {
    if cfg.diagnostics.source_map_suffix.is_empty() {
        return Err(BuildrelayError::ConfigError(
            "[diagnostics].source_map_suffix must not be empty".to_string(),
        ));
    }
    Ok(())
}

fn validate_tests(cfg: &RawConfigFile) -> Result<()> {
    let pattern = &cfg.tests.pattern;
    if pattern.trim().is_empty() {
        return Err(BuildrelayError::ConfigError(
            "[tests].pattern must not be empty".to_string(),
        ));
    }
    Glob::new(pattern).map_err(|err| {
        BuildrelayError::ConfigError(format!("[tests].pattern '{}' is invalid: {}", pattern, err))
    })?;
    Ok(())
}
