//! Wire-level building blocks: the stream header, value markers, primitive
//! encodings and the debug sentinel protocol.

// -----------------------------------------------------------------------------
// Modules

mod header;
mod marker;
mod primitive;
mod sentinel;
mod varint;

// -----------------------------------------------------------------------------
// Exports

pub use header::{CURRENT_VERSION, Header, HeaderFlags, MIN_VERSION};
pub use marker::Marker;
pub use primitive::{Endian, PrimReader, PrimWriter};

pub(crate) use sentinel::{SENTINEL_MAGIC, SENTINEL_OFF, SENTINEL_ON, Sentinel};
