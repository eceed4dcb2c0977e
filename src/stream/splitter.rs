// src/stream/splitter.rs

/// Incremental separator-based framing over arbitrary byte chunks.
///
/// Bytes after the last separator are carried over to the next chunk. A
/// fragment that is never terminated is never emitted.
#[derive(Debug, Clone)]
pub struct LineSplitter {
    separator: u8,
    carry: Vec<u8>,
}

impl LineSplitter {
    pub fn new(separator: u8) -> Self {
        Self {
            separator,
            carry: Vec::new(),
        }
    }

    pub fn separator(&self) -> u8 {
        self.separator
    }

    /// Bytes seen since the last separator.
    pub fn pending(&self) -> &[u8] {
        &self.carry
    }

    /// Feed one chunk, calling `emit` once per completed unit, in order.
    pub fn push(&mut self, chunk: &[u8], mut emit: impl FnMut(Vec<u8>)) {
        let mut rest = chunk;
        while let Some(pos) = rest.iter().position(|&b| b == self.separator) {
            let mut unit = std::mem::take(&mut self.carry);
            unit.extend_from_slice(&rest[..pos]);
            emit(unit);
            rest = &rest[pos + 1..];
        }
        self.carry.extend_from_slice(rest);
    }

    /// Collecting variant of [`LineSplitter::push`].
    pub fn split(&mut self, chunk: &[u8]) -> Vec<Vec<u8>> {
        let mut units = Vec::new();
        self.push(chunk, |unit| units.push(unit));
        units
    }
}

impl Default for LineSplitter {
    fn default() -> Self {
        Self::new(b'\n')
    }
}
