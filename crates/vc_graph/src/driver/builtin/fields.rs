use super::super::{Driver, Semantics};
use crate::GraphError;
use crate::descriptor::TypeReadInfo;
use crate::graph::{GraphReader, GraphWriter};
use crate::object::{Body, Fields, ObjectRef, Record, Type, Value};

// -----------------------------------------------------------------------------
// Field payloads

/// Writes a field count, then each field as an interned name followed by
/// the value with its own descriptor.
pub fn write_fields(writer: &mut GraphWriter<'_>, fields: &Fields) -> Result<(), GraphError> {
    writer.prim().write_len(fields.len())?;
    for (name, value) in fields.iter() {
        writer.prim().write_interned(name)?;
        writer.write_object(value)?;
    }
    Ok(())
}

/// Reads what [`write_fields`] wrote.
pub fn read_fields(reader: &mut GraphReader<'_>) -> Result<Fields, GraphError> {
    let len = reader.prim().read_len()?;
    // The count comes from the stream; do not trust it for the allocation.
    let mut fields = Fields::with_capacity(len.min(64));
    for _ in 0..len {
        let name = reader.prim().read_interned()?;
        let value = reader.read_object()?;
        fields.push(name, value);
    }
    Ok(fields)
}

fn write_object_fields(writer: &mut GraphWriter<'_>, ty: &Type, value: &Value) -> Result<(), GraphError> {
    match value {
        Value::Record(record) => write_fields(writer, record.fields()),
        Value::Object(object) => match &*object.body() {
            Body::Fields(fields) => write_fields(writer, fields),
            Body::Empty => writer.prim().write_len(0),
            Body::Pending => Err(GraphError::custom(format_args!(
                "cannot write `{ty}`: the object was never filled"
            ))),
            Body::Items(_) | Body::Grid { .. } => Err(GraphError::custom(format_args!(
                "cannot write `{ty}`: the object holds items, not fields"
            ))),
        },
        other => Err(GraphError::custom(format_args!(
            "`{ty}` expects a record or object, found {other:?}"
        ))),
    }
}

// -----------------------------------------------------------------------------
// RecordDriver

/// Driver of a value type with named fields.
#[derive(Debug, Clone)]
pub struct RecordDriver {
    ty: Type,
    name: String,
}

impl RecordDriver {
    pub fn new(ty: Type) -> Self {
        Self { name: ty.path(), ty }
    }

    #[inline]
    pub fn ty(&self) -> &Type {
        &self.ty
    }
}

impl Driver for RecordDriver {
    fn name(&self) -> &str {
        &self.name
    }

    fn semantics(&self) -> Semantics {
        Semantics::Value
    }

    fn write(&self, writer: &mut GraphWriter<'_>, value: &Value) -> Result<(), GraphError> {
        write_object_fields(writer, &self.ty, value)
    }

    fn read(&self, reader: &mut GraphReader<'_>, info: &TypeReadInfo) -> Result<Value, GraphError> {
        let ty = reader.target_type(info)?;
        let fields = read_fields(reader)?;
        Ok(Value::Record(Record::from_fields(ty, fields)))
    }
}

// -----------------------------------------------------------------------------
// ObjectDriver

/// Driver of a reference type with named fields.
#[derive(Debug, Clone)]
pub struct ObjectDriver {
    ty: Type,
    name: String,
}

impl ObjectDriver {
    pub fn new(ty: Type) -> Self {
        Self { name: ty.path(), ty }
    }

    #[inline]
    pub fn ty(&self) -> &Type {
        &self.ty
    }
}

impl Driver for ObjectDriver {
    fn name(&self) -> &str {
        &self.name
    }

    fn semantics(&self) -> Semantics {
        Semantics::Reference
    }

    fn write(&self, writer: &mut GraphWriter<'_>, value: &Value) -> Result<(), GraphError> {
        write_object_fields(writer, &self.ty, value)
    }

    fn create(&self, reader: &mut GraphReader<'_>, info: &TypeReadInfo) -> Result<ObjectRef, GraphError> {
        Ok(ObjectRef::placeholder(reader.target_type(info)?))
    }

    fn fill(
        &self,
        reader: &mut GraphReader<'_>,
        _: &TypeReadInfo,
        object: &ObjectRef,
    ) -> Result<(), GraphError> {
        let fields = read_fields(reader)?;
        object.fill(Body::Fields(fields));
        Ok(())
    }
}
