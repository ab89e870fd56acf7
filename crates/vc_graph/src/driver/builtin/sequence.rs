use alloc::sync::Arc;

use super::super::{CacheTier, Driver, Semantics};
use crate::GraphError;
use crate::descriptor::TypeReadInfo;
use crate::graph::{GraphReader, GraphWriter};
use crate::object::{Body, ObjectRef, Type, TypeKind, Value};

// -----------------------------------------------------------------------------
// Shared payload

// Payload of both lists and arrays: one length per dimension, then the items
// in row-major order, each written with the element driver.

fn write_items(
    writer: &mut GraphWriter<'_>,
    elem: &Arc<dyn Driver>,
    dims: &[usize],
    items: &[Value],
) -> Result<(), GraphError> {
    for &dim in dims {
        writer.prim().write_len(dim)?;
    }
    for item in items {
        writer.write_typed(item, elem)?;
    }
    Ok(())
}

/// Reads dimensions and items. The element descriptor of `info` is used when
/// present; otherwise every item carries its own.
fn read_items(
    reader: &mut GraphReader<'_>,
    info: &TypeReadInfo,
) -> Result<(Vec<usize>, Vec<Value>), GraphError> {
    let info = info.non_nullable();
    let rank = match info.kind() {
        TypeKind::Array => info.rank().max(1),
        _ => 1,
    };

    let mut dims = Vec::with_capacity(usize::from(rank));
    let mut count = 1_usize;
    for _ in 0..rank {
        let dim = reader.prim().read_len()?;
        count = count
            .checked_mul(dim)
            .ok_or_else(|| GraphError::invalid_data(format!("`{info}` dimensions overflow")))?;
        dims.push(dim);
    }

    let elem = info.element().cloned();
    let mut items = Vec::with_capacity(count.min(1024));
    for _ in 0..count {
        let item = match &elem {
            Some(elem) => reader.read_typed(elem)?,
            None => reader.read_object()?,
        };
        items.push(item);
    }
    Ok((dims, items))
}

fn expect_items<'v>(ty: &Type, body: &'v Body) -> Result<(Option<&'v [usize]>, &'v [Value]), GraphError> {
    match body {
        Body::Items(items) => Ok((None, items)),
        Body::Grid { dims, items } => Ok((Some(dims), items)),
        Body::Empty => Ok((None, &[])),
        Body::Pending => Err(GraphError::custom(format_args!(
            "cannot write `{ty}`: the object was never filled"
        ))),
        Body::Fields(_) => Err(GraphError::custom(format_args!(
            "cannot write `{ty}`: the object holds fields, not items"
        ))),
    }
}

fn not_a_sequence(ty: &Type, value: &Value) -> GraphError {
    GraphError::custom(format_args!("`{ty}` expects a sequence object, found {value:?}"))
}

// -----------------------------------------------------------------------------
// ListDriver

/// Driver of `alloc::vec::Vec<T>`.
///
/// Can be cached no longer than its element driver.
pub struct ListDriver {
    ty: Type,
    elem: Arc<dyn Driver>,
}

impl ListDriver {
    pub fn new(ty: Type, elem: Arc<dyn Driver>) -> Self {
        Self { ty, elem }
    }

    #[inline]
    pub fn element_driver(&self) -> &Arc<dyn Driver> {
        &self.elem
    }
}

impl Driver for ListDriver {
    fn name(&self) -> &str {
        "alloc::vec::Vec"
    }

    fn cache_tier(&self) -> CacheTier {
        CacheTier::Shared.min(self.elem.cache_tier())
    }

    fn semantics(&self) -> Semantics {
        Semantics::Reference
    }

    fn write(&self, writer: &mut GraphWriter<'_>, value: &Value) -> Result<(), GraphError> {
        let object = value.as_object().ok_or_else(|| not_a_sequence(&self.ty, value))?;
        let body = object.body();
        let items = match expect_items(&self.ty, &body)? {
            (None, items) => items,
            (Some(_), _) => {
                return Err(GraphError::custom(format_args!(
                    "cannot write a multi-dimensional array as `{}`",
                    self.ty
                )));
            }
        };
        write_items(writer, &self.elem, &[items.len()], items)
    }

    fn create(&self, reader: &mut GraphReader<'_>, info: &TypeReadInfo) -> Result<ObjectRef, GraphError> {
        Ok(ObjectRef::placeholder(reader.target_type(info)?))
    }

    fn fill(
        &self,
        reader: &mut GraphReader<'_>,
        info: &TypeReadInfo,
        object: &ObjectRef,
    ) -> Result<(), GraphError> {
        // A multi-dimensional array read as a list flattens.
        let (_, items) = read_items(reader, info)?;
        object.fill(Body::Items(items));
        Ok(())
    }
}

// -----------------------------------------------------------------------------
// ArrayDriver

/// Driver of arrays of any rank.
///
/// Rank one arrays hold [`Body::Items`], higher ranks [`Body::Grid`].
pub struct ArrayDriver {
    ty: Type,
    elem: Arc<dyn Driver>,
}

impl ArrayDriver {
    pub fn new(ty: Type, elem: Arc<dyn Driver>) -> Self {
        Self { ty, elem }
    }

    #[inline]
    pub fn rank(&self) -> u8 {
        self.ty.rank().max(1)
    }
}

impl Driver for ArrayDriver {
    fn name(&self) -> &str {
        "core::array"
    }

    fn cache_tier(&self) -> CacheTier {
        CacheTier::Shared.min(self.elem.cache_tier())
    }

    fn semantics(&self) -> Semantics {
        Semantics::Reference
    }

    fn write(&self, writer: &mut GraphWriter<'_>, value: &Value) -> Result<(), GraphError> {
        let object = value.as_object().ok_or_else(|| not_a_sequence(&self.ty, value))?;
        let body = object.body();
        let (dims, items) = expect_items(&self.ty, &body)?;
        let rank = usize::from(self.rank());

        match dims {
            None if rank == 1 => write_items(writer, &self.elem, &[items.len()], items),
            Some(dims) if dims.len() == rank && dims.iter().product::<usize>() == items.len() => {
                write_items(writer, &self.elem, dims, items)
            }
            _ => Err(GraphError::custom(format_args!(
                "the shape of the object does not match `{}`",
                self.ty
            ))),
        }
    }

    fn create(&self, reader: &mut GraphReader<'_>, info: &TypeReadInfo) -> Result<ObjectRef, GraphError> {
        Ok(ObjectRef::placeholder(reader.target_type(info)?))
    }

    fn fill(
        &self,
        reader: &mut GraphReader<'_>,
        info: &TypeReadInfo,
        object: &ObjectRef,
    ) -> Result<(), GraphError> {
        let (dims, items) = read_items(reader, info)?;
        let body = match usize::from(self.rank()) {
            1 => Body::Items(items),
            rank if rank == dims.len() => Body::Grid { dims, items },
            rank => {
                return Err(GraphError::invalid_data(format!(
                    "`{info}` has rank {}, expected rank {rank}",
                    dims.len()
                )));
            }
        };
        object.fill(body);
        Ok(())
    }
}
