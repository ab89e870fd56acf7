//! Byte sources a decode can restart from the beginning.
//!
//! A decode that meets a reference/value conversion needs a second pass
//! over the same bytes. How the bytes come back depends on the source:
//!
//! - [`RestartStrategy::Seek`]: seek back to the recorded start.
//! - [`RestartStrategy::Recreate`]: seek the base back and rebuild the
//!   wrapper around it, e.g. a decompressor over a file.
//! - [`RestartStrategy::Tee`]: copy every byte of the first pass into an
//!   anonymous temporary file and replay it.

// -----------------------------------------------------------------------------
// Modules

mod rewind;
mod spool;

// -----------------------------------------------------------------------------
// Exports

pub use rewind::{BaseReader, Pass, ReadSeek, RestartStrategy, RewindableStream};
