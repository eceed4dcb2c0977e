// src/stream/lines.rs

//! Asynchronous, backpressured line sequences over a running process.
//!
//! Reader threads split chunks into lines and push them into a bounded
//! channel; when the channel is full the reader blocks, which in turn stops
//! draining the pipe and throttles the child. A Tokio task awaits the
//! process, applies the [`ExitCheck`] and appends a terminal item, so the
//! consumer always sees every line before the final status.

use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll};

use serde::de::DeserializeOwned;
use tokio::sync::mpsc;
use tokio_stream::Stream;
use tracing::{debug, trace};

use super::splitter::LineSplitter;
use crate::exec::{
    ChunkHandler, Command, ExitCheck, OutputMode, Process, ProcessError, ProcessResult, StreamKind,
};
use crate::sink::{ByteSink, FileSink, SharedSink};

/// Turns one raw line into a consumer value.
///
/// Receives the rendered command line and the originating stream for error
/// context.
pub type LineDecoder<T> =
    Arc<dyn Fn(&str, StreamKind, Vec<u8>) -> Result<T, ProcessError> + Send + Sync>;

#[derive(Debug, Clone)]
pub struct LineOptions {
    pub separator: u8,
    /// Route stderr through the stdout pipe (default). Otherwise both streams
    /// feed the same sequence with no ordering guarantee between them.
    pub merge_stderr: bool,
    /// Lines buffered before readers block.
    pub capacity: usize,
    pub exit_check: ExitCheck,
    /// Raw copy of every chunk, e.g. a build log on disk.
    pub tee: Option<SharedSink<FileSink>>,
}

impl Default for LineOptions {
    fn default() -> Self {
        Self {
            separator: b'\n',
            merge_stderr: true,
            capacity: 64,
            exit_check: ExitCheck::RequireSuccess,
            tee: None,
        }
    }
}

impl LineOptions {
    pub fn separator(mut self, separator: u8) -> Self {
        self.separator = separator;
        self
    }

    pub fn merge_stderr(mut self, merge: bool) -> Self {
        self.merge_stderr = merge;
        self
    }

    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn exit_check(mut self, check: ExitCheck) -> Self {
        self.exit_check = check;
        self
    }

    pub fn tee(mut self, sink: SharedSink<FileSink>) -> Self {
        self.tee = Some(sink);
        self
    }
}

enum Item<T> {
    Line(Result<T, ProcessError>),
    Finished(Result<ProcessResult, ProcessError>),
}

/// Lines (or decoded values) of a running process, in emission order.
///
/// Ends with `None` after a successful, accepted exit. A rejected exit
/// status or a reaping failure is yielded as one final `Err` before `None`.
/// Per-line decode failures are yielded as `Err` items without ending the
/// sequence.
pub struct LineStream<T> {
    rx: mpsc::Receiver<Item<T>>,
    process: Process,
    outcome: Option<Result<ProcessResult, ProcessError>>,
}

impl<T: Send + 'static> LineStream<T> {
    /// Launch `command` with its output redirected into this stream.
    ///
    /// Any output mode already set on `command` is replaced. Must be called
    /// from within a Tokio runtime.
    pub fn spawn(
        command: Command,
        options: LineOptions,
        decode: LineDecoder<T>,
    ) -> Result<Self, ProcessError> {
        let command_line = command.display();
        let runtime =
            tokio::runtime::Handle::try_current().map_err(|_| ProcessError::Internal {
                command: command_line.clone(),
                message: "line streaming requires a Tokio runtime".to_string(),
            })?;

        let (tx, rx) = mpsc::channel(options.capacity.max(1));
        let on_stdout = line_handler(
            command_line.clone(),
            StreamKind::Stdout,
            &options,
            Arc::clone(&decode),
            tx.clone(),
        );
        let on_stderr = (!options.merge_stderr).then(|| {
            line_handler(
                command_line.clone(),
                StreamKind::Stderr,
                &options,
                Arc::clone(&decode),
                tx.clone(),
            )
        });

        let process = Process::new(command.output(OutputMode::Stream {
            on_stdout,
            on_stderr,
        }))?;
        process.launch()?;

        let waiter = process.clone();
        let check = options.exit_check.clone();
        runtime.spawn(async move {
            let outcome = waiter.wait_async().await.and_then(|result| {
                result.check(&check)?;
                Ok(result)
            });
            if let Err(err) = &outcome {
                debug!(command = %command_line, error = %err, "line stream ends with an error");
            }
            let _ = tx.send(Item::Finished(outcome)).await;
        });

        Ok(Self {
            rx,
            process,
            outcome: None,
        })
    }
}

impl<T> LineStream<T> {
    pub fn process(&self) -> &Process {
        &self.process
    }

    /// Final outcome, available once the sequence has ended.
    pub fn outcome(&self) -> Option<&Result<ProcessResult, ProcessError>> {
        self.outcome.as_ref()
    }

    pub fn is_finished(&self) -> bool {
        self.outcome.is_some()
    }

    pub async fn next_line(&mut self) -> Option<Result<T, ProcessError>> {
        if self.outcome.is_some() {
            return None;
        }
        match self.rx.recv().await {
            Some(Item::Line(line)) => Some(line),
            Some(Item::Finished(outcome)) => self.finish_with(outcome),
            None => self.finish_with(Err(self.closed_early())),
        }
    }

    /// Discard any remaining lines and return the final outcome.
    pub async fn finish(mut self) -> Result<ProcessResult, ProcessError> {
        while self.next_line().await.is_some() {}
        match self.outcome.take() {
            Some(outcome) => outcome,
            None => Err(self.closed_early()),
        }
    }

    fn finish_with(
        &mut self,
        outcome: Result<ProcessResult, ProcessError>,
    ) -> Option<Result<T, ProcessError>> {
        let last = outcome.as_ref().err().cloned().map(Err);
        self.outcome = Some(outcome);
        last
    }

    fn closed_early(&self) -> ProcessError {
        ProcessError::Internal {
            command: self.process.command().display(),
            message: "line stream closed before the process finished".to_string(),
        }
    }
}

impl<T> Stream for LineStream<T> {
    type Item = Result<T, ProcessError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.outcome.is_some() {
            return Poll::Ready(None);
        }
        match this.rx.poll_recv(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Some(Item::Line(line))) => Poll::Ready(Some(line)),
            Poll::Ready(Some(Item::Finished(outcome))) => Poll::Ready(this.finish_with(outcome)),
            Poll::Ready(None) => {
                let err = this.closed_early();
                Poll::Ready(this.finish_with(Err(err)))
            }
        }
    }
}

impl<T> std::fmt::Debug for LineStream<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LineStream")
            .field("process", &self.process)
            .field("finished", &self.outcome.is_some())
            .finish()
    }
}

fn line_handler<T: Send + 'static>(
    command: String,
    stream: StreamKind,
    options: &LineOptions,
    decode: LineDecoder<T>,
    tx: mpsc::Sender<Item<T>>,
) -> ChunkHandler {
    let splitter = Mutex::new(LineSplitter::new(options.separator));
    let tee = options.tee.clone();
    Arc::new(move |chunk: &[u8]| {
        if let Some(tee) = &tee {
            tee.with(|sink| sink.write(chunk));
        }
        let mut splitter = splitter.lock().unwrap_or_else(PoisonError::into_inner);
        splitter.push(chunk, |raw| {
            // Runs on a plain reader thread, so blocking here is the backpressure.
            if tx.blocking_send(Item::Line(decode(&command, stream, raw))).is_err() {
                trace!(command = %command, %stream, "line consumer went away; dropping line");
            }
        });
    })
}

/// Stream `command`'s merged output as UTF-8 lines.
pub fn lines(command: Command, options: LineOptions) -> Result<LineStream<String>, ProcessError> {
    let decode: LineDecoder<String> = Arc::new(decode_utf8);
    LineStream::spawn(command, options, decode)
}

/// Stream `command`'s output as one JSON document per line.
pub fn json_lines<T>(command: Command, options: LineOptions) -> Result<LineStream<T>, ProcessError>
where
    T: DeserializeOwned + Send + 'static,
{
    let decode: LineDecoder<T> = Arc::new(decode_json::<T>);
    LineStream::spawn(command, options, decode)
}

/// Stream merged output lines, applying `exit_check` when the process ends.
pub fn run_streaming(
    command: Command,
    exit_check: ExitCheck,
) -> Result<LineStream<String>, ProcessError> {
    lines(command, LineOptions::default().exit_check(exit_check))
}

fn decode_utf8(command: &str, stream: StreamKind, raw: Vec<u8>) -> Result<String, ProcessError> {
    String::from_utf8(raw).map_err(|source| ProcessError::LineDecode {
        command: command.to_string(),
        stream,
        source,
    })
}

fn decode_json<T: DeserializeOwned>(
    command: &str,
    stream: StreamKind,
    raw: Vec<u8>,
) -> Result<T, ProcessError> {
    serde_json::from_slice(&raw).map_err(|source| ProcessError::Json {
        command: command.to_string(),
        stream,
        source: Arc::new(source),
    })
}
