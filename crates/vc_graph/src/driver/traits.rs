use alloc::sync::Arc;

use super::NullableDriver;
use crate::GraphError;
use crate::descriptor::TypeReadInfo;
use crate::graph::{GraphReader, GraphWriter};
use crate::object::{ObjectRef, Value};

/// Version reported by drivers that do not version their payload.
pub const NO_VERSION: i32 = -1;

// -----------------------------------------------------------------------------
// CacheTier

/// How long a resolved driver may be reused.
///
/// Ordered from most to least restrictive, so a composite driver takes the
/// minimum over itself and its parts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CacheTier {
    /// Resolved again for every request.
    Never,
    /// Reused within one [`DriverContext`](super::DriverContext).
    Context,
    /// Reused by every session of the registry.
    Shared,
}

/// Whether a driver's values carry identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Semantics {
    /// Copied on write, read with [`Driver::read`]. No id is assigned.
    Value,
    /// Tracked by identity, read with [`Driver::create`] then [`Driver::fill`].
    Reference,
}

// -----------------------------------------------------------------------------
// Driver

/// Reads and writes the payload of one type.
///
/// Value drivers implement [`read`](Driver::read). Reference drivers
/// implement [`create`](Driver::create) and [`fill`](Driver::fill): the reader
/// tracks the created object before filling it, which is what lets a
/// payload refer back to its own object.
///
/// A reference driver can also read value-shaped data, and a value driver
/// can read reference-shaped data if [`reference_fallback`] allows it. The
/// latter may cost the reader a second pass over the stream.
///
/// [`reference_fallback`]: Driver::reference_fallback
pub trait Driver: Send + Sync + 'static {
    /// Written into descriptors. Also the key for named lookup.
    fn name(&self) -> &str;

    fn version(&self) -> i32 {
        NO_VERSION
    }

    fn cache_tier(&self) -> CacheTier {
        CacheTier::Shared
    }

    fn semantics(&self) -> Semantics;

    fn write(&self, writer: &mut GraphWriter<'_>, value: &Value) -> Result<(), GraphError>;

    fn read(&self, reader: &mut GraphReader<'_>, info: &TypeReadInfo) -> Result<Value, GraphError> {
        let _ = reader;
        Err(GraphError::custom(format_args!(
            "driver `{}` cannot read `{info}` as a value",
            self.name()
        )))
    }

    fn create(&self, reader: &mut GraphReader<'_>, info: &TypeReadInfo) -> Result<ObjectRef, GraphError> {
        let _ = reader;
        Err(GraphError::custom(format_args!(
            "driver `{}` cannot create `{info}`",
            self.name()
        )))
    }

    fn fill(
        &self,
        reader: &mut GraphReader<'_>,
        info: &TypeReadInfo,
        object: &ObjectRef,
    ) -> Result<(), GraphError> {
        let _ = (reader, object);
        Err(GraphError::custom(format_args!(
            "driver `{}` cannot fill `{info}`",
            self.name()
        )))
    }

    /// Whether a value driver accepts data written by a reference driver.
    fn reference_fallback(&self) -> bool {
        true
    }

    /// Abstract drivers stand for open slot types. Values in such slots are
    /// written with their own descriptor and exact driver.
    fn is_abstract(&self) -> bool {
        false
    }

    /// The wrapped driver, if this is a nullable wrapper.
    fn nullable_inner(&self) -> Option<&Arc<dyn Driver>> {
        None
    }
}

/// Compares drivers by address.
#[inline]
pub fn same_driver(a: &Arc<dyn Driver>, b: &Arc<dyn Driver>) -> bool {
    core::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

// -----------------------------------------------------------------------------
// DriverExt

/// Nullable wrapping for shared drivers.
pub trait DriverExt {
    /// Wraps the driver so it accepts null. Already nullable drivers are
    /// returned as is.
    fn nullable(&self) -> Arc<dyn Driver>;

    /// Unwraps a nullable driver. Other drivers are returned as is.
    fn non_nullable(&self) -> Arc<dyn Driver>;
}

impl DriverExt for Arc<dyn Driver> {
    fn nullable(&self) -> Arc<dyn Driver> {
        if self.nullable_inner().is_some() {
            return self.clone();
        }
        Arc::new(NullableDriver::new(self.clone()))
    }

    fn non_nullable(&self) -> Arc<dyn Driver> {
        match self.nullable_inner() {
            Some(inner) => inner.clone(),
            None => self.clone(),
        }
    }
}
