use vc_utils::IndexTable;

use super::KindTag;
use crate::GraphError;
use crate::driver::{DriverQuery, Drivers};
use crate::object::{Type, TypeKind};
use crate::wire::PrimWriter;

fn write_names(out: &mut PrimWriter<'_>, ty: &Type) -> Result<(), GraphError> {
    out.write_interned(ty.namespace().unwrap_or_default())?;
    out.write_interned(ty.name())?;
    match ty.origin() {
        Some(origin) => {
            out.write_u8(1)?;
            out.write_interned(origin)
        }
        None => out.write_u8(0),
    }
}

fn write_driver(out: &mut PrimWriter<'_>, drivers: Drivers<'_>, ty: &Type) -> Result<(), GraphError> {
    match drivers.find(&DriverQuery::exact(ty)) {
        Some(driver) => {
            out.write_u8(1)?;
            out.write_interned(driver.name())?;
            out.write_signed(i64::from(driver.version()))
        }
        None => out.write_u8(0),
    }
}

/// Writes the descriptor of `ty`: its session index, followed by the full
/// shape if this is the first time the session sees it.
///
/// The full shape embeds the name and version of the driver that writes the
/// type, so readers can tell which layout the payload has.
pub(crate) fn write_descriptor(
    table: &mut IndexTable<Type>,
    out: &mut PrimWriter<'_>,
    drivers: Drivers<'_>,
    ty: &Type,
) -> Result<(), GraphError> {
    let (index, fresh) = table.get_or_insert(ty.clone());
    out.write_varint(u64::from(index))?;
    if !fresh {
        return Ok(());
    }

    let tag = KindTag::of(ty);
    out.write_u8(tag as u8)?;

    match ty.kind() {
        TypeKind::Nullable | TypeKind::ByRef | TypeKind::Pointer => {
            let inner = ty
                .element()
                .ok_or_else(|| GraphError::custom(format_args!("`{ty}` has no inner type")))?;
            write_descriptor(table, out, drivers, inner)
        }
        TypeKind::Array => {
            out.write_u8(ty.rank())?;
            match ty.element() {
                Some(elem) => write_descriptor(table, out, drivers, elem),
                None => Ok(()),
            }
        }
        TypeKind::Enum => {
            write_names(out, ty)?;
            write_driver(out, drivers, ty)?;
            let underlying = ty
                .args()
                .first()
                .ok_or_else(|| GraphError::custom(format_args!("enum `{ty}` has no underlying type")))?;
            write_descriptor(table, out, drivers, underlying)
        }
        TypeKind::GenericDefinition => {
            write_names(out, ty)?;
            out.write_u8(ty.arity())
        }
        TypeKind::Value | TypeKind::SealedRef | TypeKind::OpenRef | TypeKind::Interface => {
            write_names(out, ty)?;
            write_driver(out, drivers, ty)?;
            if tag.is_generic() {
                let argc = u8::try_from(ty.args().len()).map_err(|_| {
                    GraphError::custom(format_args!("`{ty}` has too many generic arguments"))
                })?;
                out.write_u8(argc)?;
                for arg in ty.args() {
                    write_descriptor(table, out, drivers, arg)?;
                }
            }
            match ty.base() {
                Some(base) => {
                    out.write_u8(1)?;
                    write_descriptor(table, out, drivers, base)
                }
                None => out.write_u8(0),
            }
        }
    }
}
