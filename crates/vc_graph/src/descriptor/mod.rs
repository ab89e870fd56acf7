//! Type descriptors: how a stream names the types of its values.
//!
//! A descriptor is written in full the first time a type appears in a
//! session and as a bare index afterwards. Readers turn descriptors into
//! [`TypeReadInfo`]s, which bind lazily to a local type and driver and can be
//! redirected by [`RetargetHook`]s.

// -----------------------------------------------------------------------------
// Modules

mod kind_tag;
mod read;
mod read_info;
mod retarget;
mod write;

// -----------------------------------------------------------------------------
// Exports

pub use kind_tag::KindTag;
pub use read_info::TypeReadInfo;
pub use retarget::{Retarget, RetargetHook, TypeRename};

pub(crate) use read::DescriptorTable;
pub(crate) use write::write_descriptor;
