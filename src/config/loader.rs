// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{BuildrelayError, Result};

/// Load a configuration file and return the raw, unvalidated model.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawConfigFile> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|err| {
        BuildrelayError::ConfigError(format!("reading {}: {}", path.display(), err))
    })?;

    let config: RawConfigFile = toml::from_str(&contents)?;

    Ok(config)
}

/// Load a configuration file and validate it.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<ConfigFile> {
    let raw_config = load_from_path(&path)?;
    let config = ConfigFile::try_from(raw_config)?;
    Ok(config)
}

/// Resolve the configuration for a run.
///
/// An explicit path must exist. Without one, `Buildrelay.toml` in the working
/// directory is used when present and built-in defaults otherwise.
pub fn load_or_default(explicit: Option<&Path>) -> Result<ConfigFile> {
    if let Some(path) = explicit {
        return load_and_validate(path);
    }
    let path = default_config_path();
    if path.is_file() {
        debug!(path = %path.display(), "using default config file");
        load_and_validate(path)
    } else {
        debug!("no config file; using defaults");
        Ok(ConfigFile::default())
    }
}

pub fn default_config_path() -> PathBuf {
    PathBuf::from("Buildrelay.toml")
}
