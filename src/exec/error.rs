// src/exec/error.rs

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

use super::result::{ExitStatus, StreamKind};

/// Errors raised by the process execution engine.
///
/// The enum is `Clone` so that a cached failure can be handed to every
/// waiter; OS errors are therefore held behind an `Arc`.
#[derive(Debug, Clone, Error)]
pub enum ProcessError {
    #[error("cannot run a command with an empty argument vector")]
    EmptyCommand,

    #[error("process `{command}` was already launched")]
    AlreadyLaunched { command: String },

    #[error("process `{command}` has not been launched")]
    NotLaunched { command: String },

    #[error("failed to spawn `{command}`{}: {source}", cwd_suffix(.cwd))]
    Spawn {
        command: String,
        cwd: Option<PathBuf>,
        #[source]
        source: Arc<io::Error>,
    },

    #[error("reading {stream} of `{command}`: {source}")]
    Pipe {
        command: String,
        stream: StreamKind,
        #[source]
        source: Arc<io::Error>,
    },

    #[error("waiting for `{command}`: {source}")]
    Wait {
        command: String,
        #[source]
        source: Arc<io::Error>,
    },

    #[error("{stream} of `{command}` is not valid UTF-8: {source}")]
    Decode {
        command: String,
        stream: StreamKind,
        #[source]
        source: std::str::Utf8Error,
    },

    #[error("{stream} line from `{command}` is not valid UTF-8: {source}")]
    LineDecode {
        command: String,
        stream: StreamKind,
        #[source]
        source: std::string::FromUtf8Error,
    },

    #[error("malformed JSON line on {stream} of `{command}`: {source}")]
    Json {
        command: String,
        stream: StreamKind,
        #[source]
        source: Arc<serde_json::Error>,
    },

    #[error("`{command}` exited with unexpected {status}")]
    UnexpectedExit { command: String, status: ExitStatus },

    #[error("sending {signal} to `{command}` (pid {pid}): {source}")]
    Signal {
        command: String,
        pid: u32,
        signal: String,
        #[source]
        source: Arc<io::Error>,
    },

    #[error("process `{command}`: {message}")]
    Internal { command: String, message: String },
}

impl ProcessError {
    /// Raw OS error code carried by this error, if any.
    pub fn os_code(&self) -> Option<i32> {
        match self {
            ProcessError::Spawn { source, .. }
            | ProcessError::Pipe { source, .. }
            | ProcessError::Wait { source, .. }
            | ProcessError::Signal { source, .. } => source.raw_os_error(),
            _ => None,
        }
    }

    /// The rendered command line this error refers to.
    pub fn command(&self) -> Option<&str> {
        match self {
            ProcessError::EmptyCommand => None,
            ProcessError::AlreadyLaunched { command }
            | ProcessError::NotLaunched { command }
            | ProcessError::Spawn { command, .. }
            | ProcessError::Pipe { command, .. }
            | ProcessError::Wait { command, .. }
            | ProcessError::Decode { command, .. }
            | ProcessError::LineDecode { command, .. }
            | ProcessError::Json { command, .. }
            | ProcessError::UnexpectedExit { command, .. }
            | ProcessError::Signal { command, .. }
            | ProcessError::Internal { command, .. } => Some(command),
        }
    }
}

fn cwd_suffix(cwd: &Option<PathBuf>) -> String {
    match cwd {
        Some(dir) => format!(" in {}", dir.display()),
        None => String::new(),
    }
}
