// src/sink/writer.rs

use std::io::{self, Write};

use tracing::{debug, warn};

use super::{ByteSink, SinkError, BLOCK_SIZE};

/// Block-buffered sink over any [`io::Write`].
///
/// Writes accumulate until `block_size` bytes are pending, then go to the
/// backend in one call. The first backend error is kept and returned from
/// [`ByteSink::close`]; everything written after it is discarded.
pub struct WriterSink<W: Write + Send> {
    inner: Option<W>,
    target: String,
    buf: Vec<u8>,
    block_size: usize,
    deferred: Option<SinkError>,
}

impl<W: Write + Send> WriterSink<W> {
    /// Wrap `inner`. `target` names the backend in error messages.
    pub fn new(inner: W, target: impl Into<String>) -> Self {
        Self::with_block_size(inner, target, BLOCK_SIZE)
    }

    pub fn with_block_size(inner: W, target: impl Into<String>, block_size: usize) -> Self {
        let block_size = block_size.max(1);
        Self {
            inner: Some(inner),
            target: target.into(),
            buf: Vec::with_capacity(block_size),
            block_size,
            deferred: None,
        }
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    /// Bytes accepted but not yet handed to the backend.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.is_none()
    }

    pub fn has_failed(&self) -> bool {
        self.deferred.is_some()
    }

    fn defer(&mut self, err: SinkError) {
        if self.deferred.is_none() {
            warn!(target_sink = %self.target, error = %err, "sink write failed; error deferred to close");
            self.deferred = Some(err);
        }
    }

    fn drain_buffer(&mut self) {
        if self.buf.is_empty() {
            return;
        }
        if self.deferred.is_some() {
            self.buf.clear();
            return;
        }
        let Some(inner) = self.inner.as_mut() else {
            self.buf.clear();
            return;
        };
        if let Err(source) = inner.write_all(&self.buf) {
            let target = self.target.clone();
            self.defer(SinkError::Io { target, source });
        }
        self.buf.clear();
    }
}

impl WriterSink<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout(), "<stdout>")
    }
}

impl WriterSink<io::Stderr> {
    pub fn stderr() -> Self {
        Self::new(io::stderr(), "<stderr>")
    }
}

impl<W: Write + Send> ByteSink for WriterSink<W> {
    fn write(&mut self, bytes: &[u8]) {
        if self.inner.is_none() {
            let target = self.target.clone();
            self.defer(SinkError::Closed { target });
            return;
        }
        if self.deferred.is_some() {
            return;
        }
        self.buf.extend_from_slice(bytes);
        if self.buf.len() >= self.block_size {
            self.drain_buffer();
        }
    }

    fn flush(&mut self) {
        self.drain_buffer();
        if self.deferred.is_some() {
            return;
        }
        if let Some(inner) = self.inner.as_mut() {
            if let Err(source) = inner.flush() {
                let target = self.target.clone();
                self.defer(SinkError::Io { target, source });
            }
        }
    }

    fn close(&mut self) -> Result<(), SinkError> {
        if self.inner.is_some() {
            self.flush();
            self.inner = None;
            debug!(target_sink = %self.target, "sink closed");
        }
        match self.deferred.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl<W: Write + Send> Drop for WriterSink<W> {
    fn drop(&mut self) {
        if self.inner.is_some() {
            self.flush();
        }
    }
}

impl<W: Write + Send> std::fmt::Debug for WriterSink<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WriterSink")
            .field("target", &self.target)
            .field("buffered", &self.buf.len())
            .field("block_size", &self.block_size)
            .field("closed", &self.inner.is_none())
            .field("failed", &self.deferred.is_some())
            .finish()
    }
}
