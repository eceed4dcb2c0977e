// src/exec/reader.rs

//! Reader threads draining one pipe each.

use std::any::Any;
use std::io::{self, Read};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tracing::{debug, trace, warn};

use super::command::ChunkHandler;
use super::error::ProcessError;
use super::result::{Captured, StreamKind};
use crate::sink::{ByteSink, MemorySink};

const READ_CHUNK: usize = 8 * 1024;

/// Where a reader sends what it drains.
pub(crate) enum Destination {
    Collect(MemorySink),
    Deliver(ChunkHandler),
}

/// Spawn a thread that drains `pipe` to end-of-file and hands the outcome to
/// `on_done`.
///
/// Read errors stop this reader only; they are reported through
/// [`Captured::Failed`] so the other stream keeps draining. A panic while
/// draining (usually inside a chunk handler) is reported the same way, as
/// [`ProcessError::Internal`], so `on_done` always runs. The pipe is closed
/// before `on_done` so a child still writing to it gets `EPIPE` instead of
/// blocking the reap.
pub(crate) fn spawn_reader<R>(
    command: String,
    stream: StreamKind,
    mut pipe: R,
    destination: Destination,
    on_done: impl FnOnce(StreamKind, Captured) + Send + 'static,
) -> io::Result<JoinHandle<()>>
where
    R: Read + Send + 'static,
{
    thread::Builder::new()
        .name(format!("buildrelay-{stream}"))
        .spawn(move || {
            debug!(command = %command, %stream, "reader started");
            let drained = panic::catch_unwind(AssertUnwindSafe(|| {
                drain(&command, stream, &mut pipe, destination)
            }));
            drop(pipe);
            let captured = drained.unwrap_or_else(|payload| {
                let message = panic_message(payload.as_ref());
                warn!(command = %command, %stream, panic = %message, "reader panicked");
                Captured::Failed(ProcessError::Internal {
                    command: command.clone(),
                    message: format!("{stream} reader panicked: {message}"),
                })
            });
            debug!(
                command = %command,
                %stream,
                failed = captured.is_failed(),
                "reader reached end of stream"
            );
            on_done(stream, captured);
        })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

fn drain<R: Read>(
    command: &str,
    stream: StreamKind,
    pipe: &mut R,
    mut destination: Destination,
) -> Captured {
    let mut buf = vec![0u8; READ_CHUNK];
    loop {
        match pipe.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => {
                trace!(%stream, bytes = n, "chunk read");
                match &mut destination {
                    Destination::Collect(sink) => sink.write(&buf[..n]),
                    Destination::Deliver(handler) => handler(&buf[..n]),
                }
            }
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => {
                warn!(command = %command, %stream, error = %err, "pipe read failed");
                return Captured::Failed(ProcessError::Pipe {
                    command: command.to_string(),
                    stream,
                    source: Arc::new(err),
                });
            }
        }
    }

    match destination {
        Destination::Collect(mut sink) => {
            sink.flush();
            Captured::Bytes(sink.into_bytes())
        }
        Destination::Deliver(_) => Captured::Delivered,
    }
}
