// src/exec/result.rs

//! Values produced once a process has been reaped.

use std::fmt;

use super::error::ProcessError;

/// Which of the child's output streams a value refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamKind {
    Stdout,
    Stderr,
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamKind::Stdout => f.write_str("stdout"),
            StreamKind::Stderr => f.write_str("stderr"),
        }
    }
}

/// How the child terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    /// Normal exit with the given code.
    Terminated(i32),
    /// Killed by the given signal number.
    Signalled(i32),
}

impl ExitStatus {
    pub fn success(&self) -> bool {
        matches!(self, ExitStatus::Terminated(0))
    }

    pub fn code(&self) -> Option<i32> {
        match self {
            ExitStatus::Terminated(code) => Some(*code),
            ExitStatus::Signalled(_) => None,
        }
    }

    pub fn signal(&self) -> Option<i32> {
        match self {
            ExitStatus::Terminated(_) => None,
            ExitStatus::Signalled(sig) => Some(*sig),
        }
    }
}

impl From<std::process::ExitStatus> for ExitStatus {
    fn from(status: std::process::ExitStatus) -> Self {
        if let Some(code) = status.code() {
            return ExitStatus::Terminated(code);
        }
        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;
            if let Some(sig) = status.signal() {
                return ExitStatus::Signalled(sig);
            }
        }
        ExitStatus::Terminated(-1)
    }
}

impl fmt::Display for ExitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitStatus::Terminated(code) => write!(f, "exit code {code}"),
            ExitStatus::Signalled(sig) => write!(f, "signal {sig}"),
        }
    }
}

/// What ended up in the result for one output stream.
#[derive(Debug, Clone)]
pub enum Captured {
    /// Bytes drained from the pipe.
    Bytes(Vec<u8>),
    /// Already handed to a [`ChunkHandler`](super::ChunkHandler).
    Delivered,
    /// Sent to the null device.
    Discarded,
    /// Routed into stdout.
    Merged,
    /// The reader hit an I/O error; anything it read before is lost.
    Failed(ProcessError),
}

impl Captured {
    /// Captured bytes, empty for streams that were not collected.
    ///
    /// A reader failure is surfaced here rather than when the process is
    /// awaited, so one broken pipe does not hide the other stream.
    pub fn bytes(&self) -> Result<&[u8], ProcessError> {
        match self {
            Captured::Bytes(bytes) => Ok(bytes),
            Captured::Delivered | Captured::Discarded | Captured::Merged => Ok(&[]),
            Captured::Failed(err) => Err(err.clone()),
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Captured::Failed(_))
    }
}

/// Policy applied to the exit status by streaming consumers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ExitCheck {
    /// Any status is acceptable.
    Ignore,
    /// Only `Terminated(0)` is acceptable.
    #[default]
    RequireSuccess,
    /// Only the listed exit codes are acceptable.
    Allow(Vec<i32>),
}

impl ExitCheck {
    pub fn accepts(&self, status: ExitStatus) -> bool {
        match self {
            ExitCheck::Ignore => true,
            ExitCheck::RequireSuccess => status.success(),
            ExitCheck::Allow(codes) => status.code().is_some_and(|c| codes.contains(&c)),
        }
    }
}

/// Final outcome of one process run. Produced exactly once per process.
#[derive(Debug, Clone)]
pub struct ProcessResult {
    pub command: String,
    pub status: ExitStatus,
    pub stdout: Captured,
    pub stderr: Captured,
}

impl ProcessResult {
    pub fn success(&self) -> bool {
        self.status.success()
    }

    pub fn stdout_bytes(&self) -> Result<&[u8], ProcessError> {
        self.stdout.bytes()
    }

    pub fn stderr_bytes(&self) -> Result<&[u8], ProcessError> {
        self.stderr.bytes()
    }

    pub fn stdout_str(&self) -> Result<&str, ProcessError> {
        self.decode(StreamKind::Stdout)
    }

    pub fn stderr_str(&self) -> Result<&str, ProcessError> {
        self.decode(StreamKind::Stderr)
    }

    fn decode(&self, stream: StreamKind) -> Result<&str, ProcessError> {
        let bytes = match stream {
            StreamKind::Stdout => self.stdout.bytes()?,
            StreamKind::Stderr => self.stderr.bytes()?,
        };
        std::str::from_utf8(bytes).map_err(|source| ProcessError::Decode {
            command: self.command.clone(),
            stream,
            source,
        })
    }

    /// Turn a rejected exit status into [`ProcessError::UnexpectedExit`].
    pub fn check(&self, check: &ExitCheck) -> Result<(), ProcessError> {
        if check.accepts(self.status) {
            Ok(())
        } else {
            Err(ProcessError::UnexpectedExit {
                command: self.command.clone(),
                status: self.status,
            })
        }
    }
}
