// src/sink/mod.rs

//! Byte sinks used to capture process output and write log artifacts.
//!
//! Every backend honours the same contract:
//!
//! - [`ByteSink::write`] never fails inline. Backends that talk to the OS
//!   record the first error and keep dropping data afterwards.
//! - [`ByteSink::flush`] drains any internal buffer to the backend.
//! - [`ByteSink::close`] drains the buffer and returns the deferred error, if
//!   any. A given error is returned by exactly one `close` call.
//!
//! Backends:
//! - [`MemorySink`]: growable in-memory buffer, used to materialise captured
//!   output as a value.
//! - [`WriterSink`] / [`FileSink`]: block-buffered writes over any
//!   `io::Write`, including files and the terminal.
//! - [`SharedSink`]: serialises concurrent producers onto one sink.

use std::io;

use thiserror::Error;

pub mod file;
pub mod memory;
pub mod shared;
pub mod writer;

pub use file::FileSink;
pub use memory::MemorySink;
pub use shared::SharedSink;
pub use writer::WriterSink;

/// Bytes accumulated by buffered backends before they hit the OS.
pub const BLOCK_SIZE: usize = 8 * 1024;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("writing to {target}: {source}")]
    Io {
        target: String,
        #[source]
        source: io::Error,
    },

    #[error("write to {target} after it was closed")]
    Closed { target: String },
}

impl SinkError {
    /// OS error code of the underlying failure, if there is one.
    pub fn os_code(&self) -> Option<i32> {
        match self {
            SinkError::Io { source, .. } => source.raw_os_error(),
            SinkError::Closed { .. } => None,
        }
    }
}

/// Uniform "write bytes, flush, close" contract.
pub trait ByteSink: Send {
    fn write(&mut self, bytes: &[u8]);

    fn flush(&mut self);

    fn close(&mut self) -> Result<(), SinkError>;

    /// Write `line` followed by a newline.
    ///
    /// Implementations shared between threads override this so that the
    /// line and its terminator land together.
    fn write_line(&mut self, line: &str) {
        self.write(line.as_bytes());
        self.write(b"\n");
    }
}

impl<S: ByteSink + ?Sized> ByteSink for Box<S> {
    fn write(&mut self, bytes: &[u8]) {
        (**self).write(bytes)
    }

    fn flush(&mut self) {
        (**self).flush()
    }

    fn close(&mut self) -> Result<(), SinkError> {
        (**self).close()
    }

    fn write_line(&mut self, line: &str) {
        (**self).write_line(line)
    }
}
