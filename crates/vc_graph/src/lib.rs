#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_cfg))]

// -----------------------------------------------------------------------------
// Extern Crates

extern crate alloc;

// -----------------------------------------------------------------------------
// Modules

mod codec;
mod error;
mod options;

pub mod descriptor;
pub mod driver;
pub mod graph;
pub mod object;
pub mod stream;
pub mod wire;

// -----------------------------------------------------------------------------
// Top-Level exports

pub use codec::{Codec, Decoded, Session};
pub use error::{Action, GraphError, RegisterError, SessionError};
pub use options::{CodecOptions, DEFAULT_DEFERRAL_THRESHOLD, DEFAULT_MAX_DEPTH};

pub use descriptor::{Retarget, RetargetHook, TypeReadInfo, TypeRename};
pub use driver::{CacheTier, Driver, DriverContext, DriverExt, DriverQuery};
pub use driver::{DriverRegistry, DriverRegistryBuilder, DriverResolver, Drivers, Semantics};
pub use graph::{GraphReader, GraphWriter};
pub use object::{Body, EnumValue, Fields, KnownObjects, ObjectRef, Prim, Record};
pub use object::{Type, TypeKind, TypeRegistry, Value};
pub use stream::{Pass, RestartStrategy, RewindableStream};
