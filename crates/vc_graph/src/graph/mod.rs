//! One encode or decode of an object graph.
//!
//! Every value is written as a [`Marker`](crate::wire::Marker), optionally a
//! type descriptor, and a payload produced by the value's driver. Reference
//! objects get an id the first time they are written; later occurrences are
//! back-references to that id.
//!
//! Deep graphs are flattened: once the writer is nested
//! [`deferral_threshold`](crate::CodecOptions::deferral_threshold) levels
//! deep, reference objects are written as deferred markers and their
//! payloads follow after the root, drained last in first out. The reader
//! mirrors this with placeholders, so neither side recurses without bound.

// -----------------------------------------------------------------------------
// Modules

mod cells;
mod mutation;
mod reader;
mod trail;
mod writer;

// -----------------------------------------------------------------------------
// Exports

pub use reader::{Fixup, GraphReader};
pub use writer::GraphWriter;

pub(crate) use mutation::MutationLog;

// -----------------------------------------------------------------------------
// Tests
