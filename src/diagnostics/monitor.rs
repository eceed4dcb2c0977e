// src/diagnostics/monitor.rs

use tracing::{debug, warn};

use super::classifier::IssueClassifier;
use super::issue::{GradleIssue, IssueKind};
use super::sourcemap::Remapper;
use crate::exec::{ProcessError, ProcessResult};
use crate::sink::ByteSink;
use crate::stream::LineStream;

#[derive(Debug, Clone, Copy)]
pub struct MonitorOptions {
    /// Forward every raw line to the sink before any diagnostics for it.
    pub echo_output: bool,
}

impl Default for MonitorOptions {
    fn default() -> Self {
        Self { echo_output: true }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IssueCounts {
    pub errors: usize,
    pub warnings: usize,
}

impl IssueCounts {
    fn record(&mut self, kind: IssueKind) {
        match kind {
            IssueKind::Error => self.errors += 1,
            IssueKind::Warning => self.warnings += 1,
        }
    }
}

/// Watches build output and writes classified diagnostics to a sink.
///
/// The sink is an explicit value so callers (and tests) decide where
/// diagnostics end up.
pub struct OutputMonitor<S: ByteSink> {
    sink: S,
    classifier: IssueClassifier,
    remapper: Option<Remapper>,
    options: MonitorOptions,
    counts: IssueCounts,
}

impl<S: ByteSink> OutputMonitor<S> {
    pub fn new(sink: S, remapper: Option<Remapper>, options: MonitorOptions) -> Self {
        Self {
            sink,
            classifier: IssueClassifier::new(),
            remapper,
            options,
            counts: IssueCounts::default(),
        }
    }

    /// Process one line of output.
    ///
    /// Returns the diagnostics written for it: nothing, the issue at its
    /// reported position, or that plus a copy at the original source position.
    pub fn observe(&mut self, line: &str) -> Vec<GradleIssue> {
        if self.options.echo_output {
            self.sink.write_line(line);
        }
        let Some(issue) = self.classifier.classify(line) else {
            return Vec::new();
        };
        self.counts.record(issue.kind);

        let remapped = match (&self.remapper, &issue.location) {
            (Some(remapper), Some(location)) => remapper
                .remap(location)
                .map(|source| issue.relocated(source)),
            _ => None,
        };

        let mut issues = vec![issue];
        issues.extend(remapped);
        for issue in &issues {
            self.sink.write_line(&issue.render());
        }
        issues
    }

    /// Drain `lines` through [`OutputMonitor::observe`] and return the
    /// process outcome.
    ///
    /// Lines that fail to decode are logged and skipped.
    pub async fn consume(
        &mut self,
        lines: &mut LineStream<String>,
    ) -> Result<ProcessResult, ProcessError> {
        while let Some(item) = lines.next_line().await {
            match item {
                Ok(line) => {
                    self.observe(&line);
                }
                Err(_) if lines.is_finished() => {}
                Err(err) => warn!(error = %err, "skipping undecodable output line"),
            }
        }
        self.sink.flush();
        debug!(
            errors = self.counts.errors,
            warnings = self.counts.warnings,
            "output monitor finished"
        );

        match lines.outcome() {
            Some(outcome) => outcome.clone(),
            None => Err(ProcessError::Internal {
                command: lines.process().command().display(),
                message: "output ended without a process outcome".to_string(),
            }),
        }
    }

    pub fn counts(&self) -> IssueCounts {
        self.counts
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }
}
