use alloc::sync::Arc;

use super::{CacheTier, Driver, Semantics};
use crate::GraphError;
use crate::descriptor::TypeReadInfo;
use crate::graph::{GraphReader, GraphWriter};
use crate::object::{ObjectRef, Value};

/// Makes a value driver accept null.
///
/// Null itself never reaches the driver: it is written as a marker. The
/// wrapper only forwards, but its name differs from the inner driver's so
/// descriptors of `Option<T>` and `T` stay distinct.
pub struct NullableDriver {
    inner: Arc<dyn Driver>,
    name: String,
}

impl NullableDriver {
    pub fn new(inner: Arc<dyn Driver>) -> Self {
        let name = format!("core::option::Option<{}>", inner.name());
        Self { inner, name }
    }

    #[inline]
    pub fn inner(&self) -> &Arc<dyn Driver> {
        &self.inner
    }
}

impl Driver for NullableDriver {
    fn name(&self) -> &str {
        &self.name
    }

    fn version(&self) -> i32 {
        self.inner.version()
    }

    fn cache_tier(&self) -> CacheTier {
        self.inner.cache_tier()
    }

    fn semantics(&self) -> Semantics {
        self.inner.semantics()
    }

    fn write(&self, writer: &mut GraphWriter<'_>, value: &Value) -> Result<(), GraphError> {
        self.inner.write(writer, value)
    }

    fn read(&self, reader: &mut GraphReader<'_>, info: &TypeReadInfo) -> Result<Value, GraphError> {
        self.inner.read(reader, info.non_nullable())
    }

    fn create(&self, reader: &mut GraphReader<'_>, info: &TypeReadInfo) -> Result<ObjectRef, GraphError> {
        self.inner.create(reader, info.non_nullable())
    }

    fn fill(
        &self,
        reader: &mut GraphReader<'_>,
        info: &TypeReadInfo,
        object: &ObjectRef,
    ) -> Result<(), GraphError> {
        self.inner.fill(reader, info.non_nullable(), object)
    }

    fn reference_fallback(&self) -> bool {
        self.inner.reference_fallback()
    }

    fn is_abstract(&self) -> bool {
        self.inner.is_abstract()
    }

    fn nullable_inner(&self) -> Option<&Arc<dyn Driver>> {
        Some(&self.inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::builtin::PrimitiveDriver;
    use crate::driver::{DriverExt, same_driver};
    use crate::object::Prim;

    #[test]
    fn wrapping_is_idempotent() {
        let inner: Arc<dyn Driver> = Arc::new(PrimitiveDriver::new(Prim::I32));
        let nullable = inner.nullable();

        assert_eq!(nullable.name(), "core::option::Option<core::i32>");
        assert!(same_driver(&nullable.nullable(), &nullable));
        assert!(same_driver(&nullable.non_nullable(), &inner));
        assert!(same_driver(&inner.non_nullable(), &inner));
    }
}
