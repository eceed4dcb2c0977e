// src/stream/mod.rs

//! Line streaming on top of the execution engine.
//!
//! - [`splitter`] frames raw chunks into separator-terminated units.
//! - [`lines`] wires a [`LineSplitter`] per stream into a bounded channel and
//!   exposes the result as a [`LineStream`].

pub mod lines;
pub mod splitter;

pub use lines::{json_lines, lines, run_streaming, LineDecoder, LineOptions, LineStream};
pub use splitter::LineSplitter;
