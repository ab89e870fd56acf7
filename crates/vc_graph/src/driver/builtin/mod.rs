//! Drivers for the types every registry understands.

// -----------------------------------------------------------------------------
// Modules

mod abstract_object;
mod enumeration;
mod fields;
mod primitive;
mod sequence;

// -----------------------------------------------------------------------------
// Exports

pub use abstract_object::AbstractDriver;
pub use enumeration::EnumDriver;
pub use fields::{ObjectDriver, RecordDriver, read_fields, write_fields};
pub use primitive::PrimitiveDriver;
pub use sequence::{ArrayDriver, ListDriver};
