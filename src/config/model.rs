// src/config/model.rs

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Deserialize;

use crate::diagnostics::DEFAULT_SOURCE_MAP_SUFFIX;
use crate::exec::ExitCheck;
use crate::report::DEFAULT_RESULTS_PATTERN;

/// Configuration as read from TOML, before validation.
///
/// ```toml
/// [run]
/// program = "./gradlew"
/// args = ["assembleDebug", "--console=plain"]
/// exit_check = "zero"
/// log_file = "build/buildrelay.log"
///
/// [diagnostics]
/// source_map_suffix = ".sourcemap"
///
/// [tests]
/// results_dir = "app/build/test-results"
/// ```
///
/// All sections are optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawConfigFile {
    #[serde(default)]
    pub run: RunSection,

    #[serde(default)]
    pub diagnostics: DiagnosticsSection,

    #[serde(default)]
    pub tests: TestsSection,
}

/// Validated configuration. Construct through `TryFrom<RawConfigFile>`.
#[derive(Debug, Clone, Default)]
pub struct ConfigFile {
    pub run: RunSection,
    pub diagnostics: DiagnosticsSection,
    pub tests: TestsSection,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(
        run: RunSection,
        diagnostics: DiagnosticsSection,
        tests: TestsSection,
    ) -> Self {
        Self {
            run,
            diagnostics,
            tests,
        }
    }
}

/// `[run]` section: the build tool invocation.
#[derive(Debug, Clone, Deserialize)]
pub struct RunSection {
    /// Program to launch. May be left out when the command is given on the
    /// command line instead.
    #[serde(default)]
    pub program: Option<String>,

    #[serde(default)]
    pub args: Vec<String>,

    /// Extra environment variables for the child.
    #[serde(default)]
    pub env: BTreeMap<String, String>,

    #[serde(default = "default_true")]
    pub inherit_env: bool,

    #[serde(default)]
    pub working_dir: Option<PathBuf>,

    #[serde(default = "default_true")]
    pub merge_stderr: bool,

    /// Start the child in its own process group so signals reach its
    /// descendants too.
    #[serde(default = "default_true")]
    pub process_group: bool,

    #[serde(default)]
    pub exit_check: ExitCheckSetting,

    /// Raw copy of everything the child prints.
    #[serde(default)]
    pub log_file: Option<PathBuf>,

    /// Treat each output line as a JSON document instead of build log text.
    #[serde(default)]
    pub json_lines: bool,
}

impl Default for RunSection {
    fn default() -> Self {
        Self {
            program: None,
            args: Vec::new(),
            env: BTreeMap::new(),
            inherit_env: true,
            working_dir: None,
            merge_stderr: true,
            process_group: true,
            exit_check: ExitCheckSetting::default(),
            log_file: None,
            json_lines: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExitCheckSetting {
    /// Any exit status is accepted.
    Ignore,
    /// Only a zero exit status is accepted.
    #[default]
    Zero,
}

impl From<ExitCheckSetting> for ExitCheck {
    fn from(setting: ExitCheckSetting) -> Self {
        match setting {
            ExitCheckSetting::Ignore => ExitCheck::Ignore,
            ExitCheckSetting::Zero => ExitCheck::RequireSuccess,
        }
    }
}

/// `[diagnostics]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct DiagnosticsSection {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Forward every output line, not just diagnostics.
    #[serde(default = "default_true")]
    pub echo_output: bool,

    #[serde(default = "default_source_map_suffix")]
    pub source_map_suffix: String,
}

impl Default for DiagnosticsSection {
    fn default() -> Self {
        Self {
            enabled: true,
            echo_output: true,
            source_map_suffix: default_source_map_suffix(),
        }
    }
}

/// `[tests]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct TestsSection {
    /// Directory holding JUnit XML results. Reports are skipped when unset.
    #[serde(default)]
    pub results_dir: Option<PathBuf>,

    #[serde(default = "default_results_pattern")]
    pub pattern: String,
}

impl Default for TestsSection {
    fn default() -> Self {
        Self {
            results_dir: None,
            pattern: default_results_pattern(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_source_map_suffix() -> String {
    DEFAULT_SOURCE_MAP_SUFFIX.to_string()
}

fn default_results_pattern() -> String {
    DEFAULT_RESULTS_PATTERN.to_string()
}
