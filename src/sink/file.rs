// src/sink/file.rs

use std::fs::{self, File, OpenOptions};
use std::path::Path;

use super::{SinkError, WriterSink};

/// Buffered sink writing to a file on disk.
pub type FileSink = WriterSink<File>;

impl WriterSink<File> {
    /// Create (or truncate) `path`, creating parent directories as needed.
    pub fn create(path: impl AsRef<Path>) -> Result<Self, SinkError> {
        let path = path.as_ref();
        ensure_parent(path)?;
        let file = File::create(path).map_err(|source| SinkError::Io {
            target: path.display().to_string(),
            source,
        })?;
        Ok(Self::new(file, path.display().to_string()))
    }

    /// Open `path` for appending, creating it if missing.
    pub fn append(path: impl AsRef<Path>) -> Result<Self, SinkError> {
        let path = path.as_ref();
        ensure_parent(path)?;
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|source| SinkError::Io {
                target: path.display().to_string(),
                source,
            })?;
        Ok(Self::new(file, path.display().to_string()))
    }
}

fn ensure_parent(path: &Path) -> Result<(), SinkError> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            fs::create_dir_all(parent).map_err(|source| SinkError::Io {
                target: parent.display().to_string(),
                source,
            })
        }
        _ => Ok(()),
    }
}
