// src/exec/process.rs

//! The process state machine.
//!
//! ```text
//! Idle ──launch──▶ ReadingOutput ──last reader done──▶ OutputReady ──reap──▶ Complete
//!   │                    │                                   │
//!   │              reader panic                              │
//!   │                    ▼                                   │
//!   └──spawn error──▶ Failed ◀──────wait error / reader panic┘
//! ```
//!
//! The child is reaped only after every reader has drained its pipe, so no
//! trailing output is lost. A reader that panicked still counts as drained;
//! the child is reaped and the run ends as `Failed` with that reader's error. Both wait flavours go through the same mutex
//! guarded state, which makes double-reaping impossible; the async flavour
//! parks on a `watch` channel until draining finishes and then performs the
//! blocking reap on Tokio's blocking pool.

use std::fmt;
use std::io::{self, Read};
use std::process::{Child, Stdio};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, OnceLock, PoisonError};
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::command::{Command, OutputMode};
use super::error::ProcessError;
use super::reader::{spawn_reader, Destination};
use super::result::{Captured, ExitStatus, ProcessResult, StreamKind};
use crate::sink::MemorySink;

#[cfg(unix)]
pub use nix::sys::signal::Signal;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    /// Constructed, not yet launched.
    Idle,
    /// Readers are draining the child's pipes.
    ReadingOutput,
    /// All pipes hit end-of-file; the exit status has not been collected.
    OutputReady,
    /// Reaped; the result is cached.
    Complete,
    /// Spawning or reaping failed; the error is cached.
    Failed,
}

struct Inner {
    state: ProcessState,
    pending_readers: usize,
    child: Option<Child>,
    stdout: Option<Captured>,
    stderr: Option<Captured>,
    outcome: Option<Result<ProcessResult, ProcessError>>,
    /// First reader panic; turns an otherwise successful reap into a failure.
    fault: Option<ProcessError>,
    /// A waiter is polling for the exit status with the lock released.
    reaping: bool,
}

struct Shared {
    command: Command,
    display: String,
    inner: Mutex<Inner>,
    drained: Condvar,
    state_tx: watch::Sender<ProcessState>,
    pid: OnceLock<u32>,
}

/// One run of an external program.
///
/// Cloning yields another handle to the same run, so several tasks may wait
/// on it. Launching is allowed once.
#[derive(Clone)]
pub struct Process {
    shared: Arc<Shared>,
}

impl Process {
    pub fn new(command: Command) -> Result<Self, ProcessError> {
        match command.program() {
            Some(program) if !program.is_empty() => {}
            _ => return Err(ProcessError::EmptyCommand),
        }

        let (state_tx, _) = watch::channel(ProcessState::Idle);
        let display = command.display();
        Ok(Self {
            shared: Arc::new(Shared {
                command,
                display,
                inner: Mutex::new(Inner {
                    state: ProcessState::Idle,
                    pending_readers: 0,
                    child: None,
                    stdout: None,
                    stderr: None,
                    outcome: None,
                    fault: None,
                    reaping: false,
                }),
                drained: Condvar::new(),
                state_tx,
                pid: OnceLock::new(),
            }),
        })
    }

    pub fn command(&self) -> &Command {
        &self.shared.command
    }

    /// Current state, read without taking the state mutex.
    pub fn state(&self) -> ProcessState {
        *self.shared.state_tx.borrow()
    }

    /// OS process id, once launched.
    pub fn pid(&self) -> Option<u32> {
        self.shared.pid.get().copied()
    }

    /// Spawn the child and start one reader thread per captured stream.
    pub fn launch(&self) -> Result<(), ProcessError> {
        let shared = &self.shared;
        let mut inner = shared.lock();
        if inner.state != ProcessState::Idle {
            return Err(ProcessError::AlreadyLaunched {
                command: shared.display.clone(),
            });
        }

        if let Err(err) = shared.spawn(&mut inner) {
            warn!(command = %shared.display, error = %err, "failed to launch process");
            inner.state = ProcessState::Failed;
            inner.outcome = Some(Err(err.clone()));
            shared.drained.notify_all();
            shared.publish(ProcessState::Failed);
            return Err(err);
        }
        Ok(())
    }

    /// Block until the process has exited and its output has been drained.
    ///
    /// Repeated calls return the cached result.
    pub fn wait(&self) -> Result<ProcessResult, ProcessError> {
        self.shared.wait()
    }

    /// Async counterpart of [`Process::wait`]. Requires a Tokio runtime.
    pub async fn wait_async(&self) -> Result<ProcessResult, ProcessError> {
        let mut rx = self.shared.state_tx.subscribe();
        let state = rx
            .wait_for(|state| *state != ProcessState::ReadingOutput)
            .await
            .map(|state| *state)
            .map_err(|_| self.internal("state channel closed"))?;

        match state {
            ProcessState::OutputReady => {
                let shared = Arc::clone(&self.shared);
                tokio::task::spawn_blocking(move || shared.wait())
                    .await
                    .map_err(|err| self.internal(&format!("reaper task failed: {err}")))?
            }
            _ => self.shared.wait(),
        }
    }

    /// Send `signal` to the child, or to its whole process group when one
    /// was created.
    ///
    /// Delivery is best-effort: a child that has already exited is not an
    /// error.
    #[cfg(unix)]
    pub fn signal(&self, signal: Signal) -> Result<(), ProcessError> {
        use nix::errno::Errno;
        use nix::sys::signal::{kill, killpg};
        use nix::unistd::Pid;

        // Held across the check and the kill: the pid stays ours until a
        // reap under this lock observes the exit.
        let inner = self.shared.lock();
        let Some(pid) = self.pid() else {
            return Err(ProcessError::NotLaunched {
                command: self.shared.display.clone(),
            });
        };
        if matches!(inner.state, ProcessState::Complete | ProcessState::Failed) {
            debug!(command = %self.shared.display, pid, %signal, "process already reaped; not signalling");
            return Ok(());
        }

        let group = self.shared.command.uses_process_group();
        let target = Pid::from_raw(pid as i32);
        let sent = if group {
            killpg(target, signal)
        } else {
            kill(target, signal)
        };

        let result = match sent {
            Ok(()) => {
                info!(command = %self.shared.display, pid, %signal, group, "signal sent");
                Ok(())
            }
            Err(Errno::ESRCH) => {
                debug!(command = %self.shared.display, pid, %signal, "process already gone");
                Ok(())
            }
            Err(errno) => Err(ProcessError::Signal {
                command: self.shared.display.clone(),
                pid,
                signal: signal.to_string(),
                source: Arc::new(io::Error::from_raw_os_error(errno as i32)),
            }),
        };
        drop(inner);
        result
    }

    fn internal(&self, message: &str) -> ProcessError {
        ProcessError::Internal {
            command: self.shared.display.clone(),
            message: message.to_string(),
        }
    }
}

impl fmt::Debug for Process {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Process")
            .field("command", &self.shared.display)
            .field("state", &self.state())
            .field("pid", &self.pid())
            .finish()
    }
}

/// Launch `command` and block until it completes.
pub fn run(command: Command) -> Result<ProcessResult, ProcessError> {
    let process = Process::new(command)?;
    process.launch()?;
    process.wait()
}

/// Launch `command` and await its completion.
pub async fn run_async(command: Command) -> Result<ProcessResult, ProcessError> {
    let process = Process::new(command)?;
    process.launch()?;
    process.wait_async().await
}

type Pipe = Box<dyn Read + Send>;

const REAP_POLL_MIN: Duration = Duration::from_millis(1);
const REAP_POLL_MAX: Duration = Duration::from_millis(50);

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, state: ProcessState) {
        self.state_tx.send_replace(state);
    }

    fn spawn(self: &Arc<Self>, inner: &mut Inner) -> Result<(), ProcessError> {
        let spawn_error = |source: io::Error| ProcessError::Spawn {
            command: self.display.clone(),
            cwd: self.command.cwd().map(|p| p.to_path_buf()),
            source: Arc::new(source),
        };

        let argv = self.command.argv();
        let mut cmd = std::process::Command::new(&argv[0]);
        cmd.args(&argv[1..]).stdin(Stdio::null());
        if !self.command.inherits_env() {
            cmd.env_clear();
        }
        cmd.envs(self.command.env_vars());
        if let Some(dir) = self.command.cwd() {
            cmd.current_dir(dir);
        }
        #[cfg(unix)]
        if self.command.uses_process_group() {
            use std::os::unix::process::CommandExt;
            cmd.process_group(0);
        }

        let mode = self.command.output_mode().clone();
        let mut merged: Option<io::PipeReader> = None;
        match &mode {
            OutputMode::Discard => {
                cmd.stdout(Stdio::null()).stderr(Stdio::null());
            }
            m if m.merges_stderr() => {
                let (reader, writer) = io::pipe().map_err(spawn_error)?;
                let stderr_writer = writer.try_clone().map_err(spawn_error)?;
                cmd.stdout(writer).stderr(stderr_writer);
                merged = Some(reader);
            }
            _ => {
                cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
            }
        }

        let mut child = cmd.spawn().map_err(spawn_error)?;
        // Our copies of the merged pipe's write end live in `cmd`; the reader
        // only sees end-of-file once they are gone.
        drop(cmd);

        let pid = child.id();
        let _ = self.pid.set(pid);

        let mut readers: Vec<(StreamKind, Pipe, Destination)> = Vec::new();
        match mode {
            OutputMode::Discard => {
                inner.stdout = Some(Captured::Discarded);
                inner.stderr = Some(Captured::Discarded);
            }
            OutputMode::Collect { merge_stderr } => {
                if merge_stderr {
                    if let Some(reader) = merged.take() {
                        readers.push((StreamKind::Stdout, Box::new(reader), collector()));
                    }
                    inner.stderr = Some(Captured::Merged);
                } else {
                    if let Some(out) = child.stdout.take() {
                        readers.push((StreamKind::Stdout, Box::new(out), collector()));
                    }
                    if let Some(err) = child.stderr.take() {
                        readers.push((StreamKind::Stderr, Box::new(err), collector()));
                    }
                }
            }
            OutputMode::Stream {
                on_stdout,
                on_stderr,
            } => match on_stderr {
                None => {
                    if let Some(reader) = merged.take() {
                        readers.push((
                            StreamKind::Stdout,
                            Box::new(reader),
                            Destination::Deliver(on_stdout),
                        ));
                    }
                    inner.stderr = Some(Captured::Merged);
                }
                Some(on_stderr) => {
                    if let Some(out) = child.stdout.take() {
                        readers.push((
                            StreamKind::Stdout,
                            Box::new(out),
                            Destination::Deliver(on_stdout),
                        ));
                    }
                    if let Some(err) = child.stderr.take() {
                        readers.push((
                            StreamKind::Stderr,
                            Box::new(err),
                            Destination::Deliver(on_stderr),
                        ));
                    }
                }
            },
        }

        inner.child = Some(child);
        inner.pending_readers = readers.len();
        inner.state = if readers.is_empty() {
            ProcessState::OutputReady
        } else {
            ProcessState::ReadingOutput
        };

        for (stream, pipe, destination) in readers {
            let shared = Arc::clone(self);
            let spawned = spawn_reader(
                self.display.clone(),
                stream,
                pipe,
                destination,
                move |stream, captured| shared.finish_reader(stream, captured),
            );
            if let Err(err) = spawned {
                warn!(command = %self.display, %stream, error = %err, "could not start reader thread");
                let failed = Captured::Failed(ProcessError::Pipe {
                    command: self.display.clone(),
                    stream,
                    source: Arc::new(err),
                });
                Self::record_reader(inner, stream, failed);
            }
        }

        info!(
            command = %self.display,
            pid,
            mode = ?self.command.output_mode(),
            process_group = self.command.uses_process_group(),
            "process launched"
        );
        self.publish(inner.state);
        Ok(())
    }

    /// Store one reader's outcome; returns true when it was the last one.
    fn record_reader(inner: &mut Inner, stream: StreamKind, captured: Captured) -> bool {
        if let Captured::Failed(err @ ProcessError::Internal { .. }) = &captured {
            inner.fault.get_or_insert_with(|| err.clone());
        }
        match stream {
            StreamKind::Stdout => inner.stdout = Some(captured),
            StreamKind::Stderr => inner.stderr = Some(captured),
        }
        inner.pending_readers = inner.pending_readers.saturating_sub(1);
        if inner.pending_readers == 0 && inner.state == ProcessState::ReadingOutput {
            inner.state = ProcessState::OutputReady;
            true
        } else {
            false
        }
    }

    fn finish_reader(&self, stream: StreamKind, captured: Captured) {
        let mut inner = self.lock();
        if Self::record_reader(&mut inner, stream, captured) {
            debug!(command = %self.display, "all output drained");
            self.drained.notify_all();
            self.publish(ProcessState::OutputReady);
        }
    }

    fn wait(&self) -> Result<ProcessResult, ProcessError> {
        let mut inner = self.lock();
        loop {
            match inner.state {
                ProcessState::Idle => {
                    return Err(ProcessError::NotLaunched {
                        command: self.display.clone(),
                    });
                }
                ProcessState::ReadingOutput => {
                    inner = self
                        .drained
                        .wait(inner)
                        .unwrap_or_else(PoisonError::into_inner);
                }
                ProcessState::OutputReady if inner.reaping => {
                    inner = self
                        .drained
                        .wait(inner)
                        .unwrap_or_else(PoisonError::into_inner);
                }
                ProcessState::OutputReady => return self.reap(inner),
                ProcessState::Complete | ProcessState::Failed => {
                    return inner.outcome.clone().unwrap_or_else(|| {
                        Err(ProcessError::Internal {
                            command: self.display.clone(),
                            message: "finished without an outcome".to_string(),
                        })
                    });
                }
            }
        }
    }

    /// Collect the exit status. Runs once, for the first waiter to see
    /// `OutputReady`.
    ///
    /// The child is polled rather than waited on so the lock is released
    /// between polls and `signal` can still reach a child that closed its
    /// output but keeps running.
    fn reap<'a>(
        &'a self,
        mut inner: MutexGuard<'a, Inner>,
    ) -> Result<ProcessResult, ProcessError> {
        inner.reaping = true;
        let mut pause = REAP_POLL_MIN;
        let waited = loop {
            let Some(child) = inner.child.as_mut() else {
                break None;
            };
            match child.try_wait() {
                Ok(Some(status)) => break Some(Ok(status)),
                Ok(None) => {
                    inner = self
                        .drained
                        .wait_timeout(inner, pause)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0;
                    pause = (pause * 2).min(REAP_POLL_MAX);
                }
                Err(source) => break Some(Err(source)),
            }
        };
        inner.reaping = false;
        inner.child = None;

        let outcome = match (waited, inner.fault.take()) {
            (Some(Ok(_)), Some(fault)) => Err(fault),
            (Some(Ok(status)), None) => Ok(ProcessResult {
                command: self.display.clone(),
                status: ExitStatus::from(status),
                stdout: inner.stdout.take().unwrap_or(Captured::Discarded),
                stderr: inner.stderr.take().unwrap_or(Captured::Discarded),
            }),
            (Some(Err(source)), _) => Err(ProcessError::Wait {
                command: self.display.clone(),
                source: Arc::new(source),
            }),
            (None, _) => Err(ProcessError::Internal {
                command: self.display.clone(),
                message: "no child left to reap".to_string(),
            }),
        };

        match &outcome {
            Ok(result) => {
                inner.state = ProcessState::Complete;
                info!(command = %self.display, status = %result.status, "process exited");
            }
            Err(err) => {
                inner.state = ProcessState::Failed;
                warn!(command = %self.display, error = %err, "process failed");
            }
        }
        inner.outcome = Some(outcome.clone());
        self.drained.notify_all();
        self.publish(inner.state);
        outcome
    }
}

fn collector() -> Destination {
    Destination::Collect(MemorySink::new())
}
