use super::super::{Driver, Semantics};
use crate::GraphError;
use crate::descriptor::TypeReadInfo;
use crate::graph::{GraphReader, GraphWriter};
use crate::object::Value;

/// Stands for an open slot type such as `core::Object` or an interface.
///
/// Writers that meet it write the value with its own descriptor and exact
/// driver instead. Readers do the same for descriptors that are open.
#[derive(Debug, Default, Clone, Copy)]
pub struct AbstractDriver;

impl Driver for AbstractDriver {
    fn name(&self) -> &str {
        "core::any::Any"
    }

    fn semantics(&self) -> Semantics {
        Semantics::Reference
    }

    fn is_abstract(&self) -> bool {
        true
    }

    fn write(&self, writer: &mut GraphWriter<'_>, value: &Value) -> Result<(), GraphError> {
        writer.write_object(value)
    }

    fn read(&self, reader: &mut GraphReader<'_>, _: &TypeReadInfo) -> Result<Value, GraphError> {
        reader.read_object()
    }
}
