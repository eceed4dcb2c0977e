// src/exec/mod.rs

//! Process execution layer.
//!
//! This module runs one external program to completion while making its
//! output available either as a captured blob or as incremental callbacks.
//!
//! - [`command`] describes what to run and where its output goes.
//! - [`process`] owns the launch / drain / reap state machine.
//! - [`reader`] contains the per-pipe reader threads.
//! - [`result`] holds exit statuses, captured output and exit checks.
//! - [`error`] is the closed error enum for this layer.

pub mod command;
pub mod error;
pub mod process;
pub(crate) mod reader;
pub mod result;

pub use command::{ChunkHandler, Command, OutputMode};
pub use error::ProcessError;
pub use process::{run, run_async, Process, ProcessState};
#[cfg(unix)]
pub use process::Signal;
pub use result::{Captured, ExitCheck, ExitStatus, ProcessResult, StreamKind};
pub use crate::stream::run_streaming;
