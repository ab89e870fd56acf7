use super::super::{Driver, Semantics};
use crate::GraphError;
use crate::descriptor::TypeReadInfo;
use crate::graph::{GraphReader, GraphWriter};
use crate::object::{Prim, Value};

/// Driver of one primitive type.
///
/// Reads whatever primitive the descriptor names and converts it with
/// [`Prim::coerce`], so a field that changed from `i32` to `u8` still reads
/// as long as each value fits.
#[derive(Debug, Clone, Copy)]
pub struct PrimitiveDriver {
    prim: Prim,
}

impl PrimitiveDriver {
    #[inline]
    pub const fn new(prim: Prim) -> Self {
        Self { prim }
    }

    #[inline]
    pub const fn prim(&self) -> Prim {
        self.prim
    }
}

impl Driver for PrimitiveDriver {
    fn name(&self) -> &str {
        self.prim.path()
    }

    fn semantics(&self) -> Semantics {
        Semantics::Value
    }

    fn write(&self, writer: &mut GraphWriter<'_>, value: &Value) -> Result<(), GraphError> {
        let value = self.prim.coerce(value.clone())?;
        writer.prim().write_prim(self.prim, &value)
    }

    fn read(&self, reader: &mut GraphReader<'_>, info: &TypeReadInfo) -> Result<Value, GraphError> {
        let info = info.non_nullable();
        let wire = info
            .wire_prim()
            .or_else(|| info.underlying())
            .unwrap_or(self.prim);
        let value = reader.prim().read_prim(wire)?;
        self.prim.coerce(value)
    }
}
