//! The runtime object model that graphs are made of.

// -----------------------------------------------------------------------------
// Modules

mod known;
mod prim;
mod reference;
mod ty;
mod type_registry;
mod value;

// -----------------------------------------------------------------------------
// Exports

pub use known::KnownObjects;
pub use prim::Prim;
pub use reference::{Body, Object, ObjectRef};
pub use ty::{Type, TypeKind};
pub use type_registry::TypeRegistry;
pub use value::{EnumValue, Fields, Record, Value};
