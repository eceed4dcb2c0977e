// src/sink/memory.rs

use std::io;

use super::{ByteSink, SinkError};

/// Growable in-memory buffer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemorySink {
    bytes: Vec<u8>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            bytes: Vec::with_capacity(capacity),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Decode the captured bytes as UTF-8.
    ///
    /// Invalid input is reported rather than replaced.
    pub fn to_text(&self) -> Result<&str, std::str::Utf8Error> {
        std::str::from_utf8(&self.bytes)
    }
}

impl ByteSink for MemorySink {
    fn write(&mut self, bytes: &[u8]) {
        self.bytes.extend_from_slice(bytes);
    }

    fn flush(&mut self) {}

    fn close(&mut self) -> Result<(), SinkError> {
        Ok(())
    }
}

impl io::Write for MemorySink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.bytes.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl From<MemorySink> for Vec<u8> {
    fn from(sink: MemorySink) -> Self {
        sink.bytes
    }
}
