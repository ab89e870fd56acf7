//! Drivers: the per-type read and write logic, and how they are found.
//!
//! A [`DriverRegistry`] asks its [`DriverResolver`]s for a driver the first
//! time a type is needed, then caches the answer according to the driver's
//! [`CacheTier`]: process-wide, per [`DriverContext`], or not at all.

// -----------------------------------------------------------------------------
// Modules

mod context;
mod nullable;
mod query;
mod registry;
mod resolver;
mod traits;

#[cfg(feature = "auto_register")]
mod auto_register;

pub mod builtin;

// -----------------------------------------------------------------------------
// Exports

pub use context::{ContextLease, DriverContext};
pub use nullable::NullableDriver;
pub use query::DriverQuery;
pub use registry::{DriverRegistry, DriverRegistryBuilder, Drivers};
pub use resolver::{DriverResolver, StandardResolver};
pub use traits::{CacheTier, Driver, DriverExt, NO_VERSION, Semantics, same_driver};

#[cfg(feature = "auto_register")]
pub use auto_register::AutoDriver;
#[cfg(feature = "auto_register")]
pub use inventory;

pub(crate) use query::CacheKey;
