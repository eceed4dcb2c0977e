// src/diagnostics/issue.rs

use std::fmt;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IssueKind {
    Error,
    Warning,
}

impl IssueKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueKind::Error => "error",
            IssueKind::Warning => "warning",
        }
    }
}

impl fmt::Display for IssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A file position, 1-based in both line and column.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceLocation {
    pub path: PathBuf,
    pub line: u32,
    pub column: u32,
}

impl SourceLocation {
    pub fn new(path: impl Into<PathBuf>, line: u32, column: u32) -> Self {
        Self {
            path: path.into(),
            line,
            column,
        }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.path.display(), self.line, self.column)
    }
}

/// One classified build error or warning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GradleIssue {
    pub kind: IssueKind,
    pub message: String,
    pub location: Option<SourceLocation>,
}

impl GradleIssue {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: IssueKind::Error,
            message: message.into(),
            location: None,
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            kind: IssueKind::Warning,
            message: message.into(),
            location: None,
        }
    }

    pub fn at(mut self, location: SourceLocation) -> Self {
        self.location = Some(location);
        self
    }

    /// Same issue, reported at a different position.
    pub fn relocated(&self, location: SourceLocation) -> Self {
        Self {
            kind: self.kind,
            message: self.message.clone(),
            location: Some(location),
        }
    }

    /// `path:line:col: kind: message`, or `kind: message` without a location.
    pub fn render(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for GradleIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.location {
            Some(location) => write!(f, "{}: {}: {}", location, self.kind, self.message),
            None => write!(f, "{}: {}", self.kind, self.message),
        }
    }
}
