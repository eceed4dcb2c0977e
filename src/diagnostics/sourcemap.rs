// src/diagnostics/sourcemap.rs

//! Position maps from generated code back to the original source.
//!
//! A map sits beside the generated file it describes, named
//! `.<stem><suffix>` (for `out/Main.kt`: `out/.Main.sourcemap`). It is read
//! again on every lookup, so a rebuilt map is picked up without any cache
//! invalidation.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, trace, warn};

use super::issue::SourceLocation;
use crate::fs::{FileSystem, RealFileSystem};

pub const DEFAULT_SOURCE_MAP_SUFFIX: &str = ".sourcemap";

#[derive(Debug, Error)]
pub enum SourceMapError {
    #[error("reading position map {}: {message}", .path.display())]
    Read { path: PathBuf, message: String },

    #[error("parsing position map {}: {source}", .path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub line: u32,
    pub column: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Range {
    pub start: Position,
    pub end: Position,
}

impl Range {
    pub fn lines(start: u32, end: u32) -> Self {
        Self {
            start: Position {
                line: start,
                column: 1,
            },
            end: Position {
                line: end,
                column: 1,
            },
        }
    }

    pub fn contains_line(&self, line: u32) -> bool {
        self.start.line <= line && line <= self.end.line
    }

    /// Number of lines covered, counting both ends.
    pub fn line_count(&self) -> u32 {
        self.end.line.saturating_sub(self.start.line) + 1
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFile {
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapEntry {
    pub source_file: SourceFile,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_range: Option<Range>,
    /// Span in the generated file.
    pub range: Range,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceMap {
    #[serde(default)]
    pub entries: Vec<MapEntry>,
}

impl SourceMap {
    pub fn parse(path: &Path, contents: &str) -> Result<Self, SourceMapError> {
        serde_json::from_str(contents).map_err(|source| SourceMapError::Json {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load the map at `path`. A missing file is `Ok(None)`.
    pub fn load(fs: &dyn FileSystem, path: &Path) -> Result<Option<Self>, SourceMapError> {
        if !fs.is_file(path) {
            return Ok(None);
        }
        let contents = fs
            .read_to_string(path)
            .map_err(|err| SourceMapError::Read {
                path: path.to_path_buf(),
                message: format!("{err:#}"),
            })?;
        Self::parse(path, &contents).map(Some)
    }

    /// The narrowest entry whose generated range contains `line`.
    ///
    /// Entries without a source range are never candidates. When two
    /// candidates cover the same number of lines the earlier one wins.
    pub fn lookup(&self, line: u32) -> Option<&MapEntry> {
        let mut best: Option<&MapEntry> = None;
        for entry in &self.entries {
            if entry.source_range.is_none() || !entry.range.contains_line(line) {
                continue;
            }
            match best {
                Some(current) if current.range.line_count() <= entry.range.line_count() => {}
                _ => best = Some(entry),
            }
        }
        best
    }

    /// Original-source position for generated `line`.
    ///
    /// Relative source paths are resolved against `base`, normally the
    /// directory holding the map.
    pub fn resolve(&self, line: u32, base: Option<&Path>) -> Option<SourceLocation> {
        let entry = self.lookup(line)?;
        let start = entry.source_range?.start;
        let path = match base {
            Some(base) if entry.source_file.path.is_relative() => {
                base.join(&entry.source_file.path)
            }
            _ => entry.source_file.path.clone(),
        };
        Some(SourceLocation {
            path,
            line: start.line,
            column: start.column,
        })
    }
}

/// Map file expected beside `generated`.
pub fn source_map_path(generated: &Path, suffix: &str) -> PathBuf {
    let stem = generated
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = format!(".{stem}{suffix}");
    match generated.parent() {
        Some(parent) => parent.join(name),
        None => PathBuf::from(name),
    }
}

/// Resolves generated-code locations through their position maps.
#[derive(Debug, Clone)]
pub struct Remapper {
    fs: Arc<dyn FileSystem>,
    suffix: String,
}

impl Default for Remapper {
    fn default() -> Self {
        Self::new(Arc::new(RealFileSystem))
    }
}

impl Remapper {
    pub fn new(fs: Arc<dyn FileSystem>) -> Self {
        Self {
            fs,
            suffix: DEFAULT_SOURCE_MAP_SUFFIX.to_string(),
        }
    }

    pub fn with_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = suffix.into();
        self
    }

    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    pub fn try_remap(
        &self,
        location: &SourceLocation,
    ) -> Result<Option<SourceLocation>, SourceMapError> {
        let map_path = source_map_path(&location.path, &self.suffix);
        let Some(map) = SourceMap::load(self.fs.as_ref(), &map_path)? else {
            trace!(map = %map_path.display(), "no position map");
            return Ok(None);
        };
        let resolved = map.resolve(location.line, map_path.parent());
        debug!(
            generated = %location,
            map = %map_path.display(),
            resolved = ?resolved.as_ref().map(ToString::to_string),
            "position map lookup"
        );
        Ok(resolved)
    }

    /// Like [`Remapper::try_remap`], but an unreadable map only logs a warning.
    pub fn remap(&self, location: &SourceLocation) -> Option<SourceLocation> {
        match self.try_remap(location) {
            Ok(resolved) => resolved,
            Err(err) => {
                warn!(error = %err, "ignoring unusable position map");
                None
            }
        }
    }
}
