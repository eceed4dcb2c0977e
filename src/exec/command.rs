// src/exec/command.rs

//! Description of an external program invocation.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Callback receiving raw output chunks from a reader thread.
///
/// Chunks arrive in the order the reader drained them from its pipe. The
/// callback runs on the reader thread, so slow handlers apply backpressure
/// to the child process.
pub type ChunkHandler = Arc<dyn Fn(&[u8]) + Send + Sync>;

/// What happens to the child's stdout and stderr.
#[derive(Clone, Default)]
pub enum OutputMode {
    /// Both streams go to the null device.
    #[default]
    Discard,

    /// Both streams are captured into the [`ProcessResult`](super::ProcessResult).
    ///
    /// With `merge_stderr`, stderr shares the stdout pipe and the combined
    /// bytes appear as stdout.
    Collect { merge_stderr: bool },

    /// Chunks are delivered to callbacks while the process runs.
    ///
    /// `on_stderr: None` merges stderr into the stdout pipe so that
    /// `on_stdout` sees both in OS delivery order.
    Stream {
        on_stdout: ChunkHandler,
        on_stderr: Option<ChunkHandler>,
    },
}

impl OutputMode {
    pub fn collect() -> Self {
        OutputMode::Collect {
            merge_stderr: false,
        }
    }

    pub fn collect_merged() -> Self {
        OutputMode::Collect { merge_stderr: true }
    }

    /// Stream both streams through one callback on a merged pipe.
    pub fn stream_merged(on_output: impl Fn(&[u8]) + Send + Sync + 'static) -> Self {
        OutputMode::Stream {
            on_stdout: Arc::new(on_output),
            on_stderr: None,
        }
    }

    pub fn stream(
        on_stdout: impl Fn(&[u8]) + Send + Sync + 'static,
        on_stderr: impl Fn(&[u8]) + Send + Sync + 'static,
    ) -> Self {
        OutputMode::Stream {
            on_stdout: Arc::new(on_stdout),
            on_stderr: Some(Arc::new(on_stderr)),
        }
    }

    /// Whether stderr is routed into the stdout pipe.
    pub fn merges_stderr(&self) -> bool {
        match self {
            OutputMode::Discard => false,
            OutputMode::Collect { merge_stderr } => *merge_stderr,
            OutputMode::Stream { on_stderr, .. } => on_stderr.is_none(),
        }
    }
}

impl fmt::Debug for OutputMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputMode::Discard => f.write_str("Discard"),
            OutputMode::Collect { merge_stderr } => f
                .debug_struct("Collect")
                .field("merge_stderr", merge_stderr)
                .finish(),
            OutputMode::Stream { on_stderr, .. } => f
                .debug_struct("Stream")
                .field("merged", &on_stderr.is_none())
                .finish_non_exhaustive(),
        }
    }
}

/// An argument vector plus the environment it runs in.
///
/// The first element of `argv` is the program; it is resolved through `PATH`
/// when it contains no path separator.
#[derive(Debug, Clone)]
pub struct Command {
    argv: Vec<String>,
    env: BTreeMap<String, String>,
    inherit_env: bool,
    cwd: Option<PathBuf>,
    output: OutputMode,
    process_group: bool,
}

impl Command {
    pub fn new(program: impl Into<String>) -> Self {
        Self::from_argv([program.into()])
    }

    pub fn from_argv<I, S>(argv: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            argv: argv.into_iter().map(Into::into).collect(),
            env: BTreeMap::new(),
            inherit_env: true,
            cwd: None,
            output: OutputMode::default(),
            process_group: true,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.argv.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.argv.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set one variable on top of the (possibly inherited) environment.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn envs<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.env
            .extend(vars.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Start from an empty environment instead of the caller's.
    pub fn env_clear(mut self) -> Self {
        self.inherit_env = false;
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    pub fn output(mut self, mode: OutputMode) -> Self {
        self.output = mode;
        self
    }

    /// Place the child in its own process group (default `true`).
    ///
    /// Signals sent through [`Process::signal`](super::Process::signal) then
    /// reach the child and all of its descendants.
    pub fn process_group(mut self, enabled: bool) -> Self {
        self.process_group = enabled;
        self
    }

    pub fn argv(&self) -> &[String] {
        &self.argv
    }

    pub fn program(&self) -> Option<&str> {
        self.argv.first().map(String::as_str)
    }

    pub fn env_vars(&self) -> &BTreeMap<String, String> {
        &self.env
    }

    pub fn inherits_env(&self) -> bool {
        self.inherit_env
    }

    pub fn cwd(&self) -> Option<&Path> {
        self.cwd.as_deref()
    }

    pub fn output_mode(&self) -> &OutputMode {
        &self.output
    }

    pub fn uses_process_group(&self) -> bool {
        self.process_group
    }

    /// Render the argument vector the way a shell user would type it.
    pub fn display(&self) -> String {
        self.argv
            .iter()
            .map(|a| quote_arg(a))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display())
    }
}

fn quote_arg(arg: &str) -> String {
    let plain = !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./:=@%+,".contains(c));
    if plain {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', r"'\''"))
    }
}
