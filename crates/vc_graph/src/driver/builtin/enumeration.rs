use alloc::sync::Arc;
use core::fmt;

use super::super::{Driver, Semantics};
use crate::GraphError;
use crate::descriptor::TypeReadInfo;
use crate::graph::{GraphReader, GraphWriter};
use crate::object::{EnumValue, Prim, Type, Value};

type Renumber = dyn Fn(i128) -> Option<i128> + Send + Sync;

/// Driver of an enumeration, stored as its underlying integer.
///
/// Reads with the underlying type the stream names and range-checks against
/// the local one. A renumbering function can map old discriminants to new
/// ones; discriminants it does not map pass through unchanged.
#[derive(Clone)]
pub struct EnumDriver {
    ty: Type,
    name: String,
    underlying: Prim,
    renumber: Option<Arc<Renumber>>,
}

impl EnumDriver {
    /// Returns `None` if `ty` is not an enum over an integer primitive.
    pub fn new(ty: Type) -> Option<Self> {
        let underlying = ty.underlying().filter(|prim| prim.is_integer())?;
        Some(Self {
            name: ty.path(),
            ty,
            underlying,
            renumber: None,
        })
    }

    pub fn with_renumber(mut self, renumber: impl Fn(i128) -> Option<i128> + Send + Sync + 'static) -> Self {
        self.renumber = Some(Arc::new(renumber));
        self
    }

    #[inline]
    pub fn ty(&self) -> &Type {
        &self.ty
    }

    #[inline]
    pub fn underlying(&self) -> Prim {
        self.underlying
    }
}

impl fmt::Debug for EnumDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnumDriver")
            .field("ty", &self.ty)
            .field("underlying", &self.underlying)
            .field("renumber", &self.renumber.is_some())
            .finish()
    }
}

impl Driver for EnumDriver {
    fn name(&self) -> &str {
        &self.name
    }

    fn semantics(&self) -> Semantics {
        Semantics::Value
    }

    fn write(&self, writer: &mut GraphWriter<'_>, value: &Value) -> Result<(), GraphError> {
        let raw = value.as_i128().ok_or_else(|| {
            GraphError::custom(format_args!("`{}` expects an enum value, found {value:?}", self.ty))
        })?;
        let stored = self
            .underlying
            .int(raw)
            .ok_or_else(|| GraphError::overflow(raw, &self.ty, self.underlying.path()))?;
        writer.prim().write_prim(self.underlying, &stored)
    }

    fn read(&self, reader: &mut GraphReader<'_>, info: &TypeReadInfo) -> Result<Value, GraphError> {
        let info = info.non_nullable();
        let wire = info
            .underlying()
            .or_else(|| info.wire_prim())
            .unwrap_or(self.underlying);
        let raw = reader.prim().read_prim(wire)?.as_i128().ok_or_else(|| {
            GraphError::invalid_data(format!("`{info}` is not stored as an integer"))
        })?;

        let raw = match &self.renumber {
            Some(renumber) => renumber(raw).unwrap_or(raw),
            None => raw,
        };
        if self.underlying.int(raw).is_none() {
            return Err(GraphError::overflow(raw, info, &self.ty));
        }
        Ok(Value::Enum(EnumValue::new(self.ty.clone(), raw)))
    }
}
