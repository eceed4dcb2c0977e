// src/sink/shared.rs

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::{ByteSink, SinkError};

/// Thread-safe handle to a single sink.
///
/// Clones share the same backend; each call holds the lock for its whole
/// duration, so concurrent `write_line` calls never interleave.
#[derive(Debug)]
pub struct SharedSink<S: ByteSink> {
    inner: Arc<Mutex<S>>,
}

impl<S: ByteSink> SharedSink<S> {
    pub fn new(sink: S) -> Self {
        Self {
            inner: Arc::new(Mutex::new(sink)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, S> {
        // A panicking writer leaves the byte buffer intact; keep going.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `f` with exclusive access to the underlying sink.
    pub fn with<R>(&self, f: impl FnOnce(&mut S) -> R) -> R {
        f(&mut self.lock())
    }

    /// Recover the backend once every other handle is gone.
    pub fn try_into_inner(self) -> Result<S, Self> {
        match Arc::try_unwrap(self.inner) {
            Ok(mutex) => Ok(mutex.into_inner().unwrap_or_else(PoisonError::into_inner)),
            Err(inner) => Err(Self { inner }),
        }
    }
}

impl<S: ByteSink> Clone for SharedSink<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: ByteSink> ByteSink for SharedSink<S> {
    fn write(&mut self, bytes: &[u8]) {
        self.lock().write(bytes);
    }

    fn flush(&mut self) {
        self.lock().flush();
    }

    fn close(&mut self) -> Result<(), SinkError> {
        self.lock().close()
    }

    fn write_line(&mut self, line: &str) {
        self.lock().write_line(line);
    }
}
