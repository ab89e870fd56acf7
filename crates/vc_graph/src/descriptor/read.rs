use alloc::rc::Rc;

use super::{KindTag, TypeReadInfo};
use crate::GraphError;
use crate::wire::PrimReader;

/// Descriptors read so far in a session, by index.
///
/// A slot is `None` while its descriptor is being parsed, so a descriptor
/// that refers to itself is rejected instead of looping.
#[derive(Default)]
pub(crate) struct DescriptorTable {
    infos: Vec<Option<Rc<TypeReadInfo>>>,
}

impl DescriptorTable {
    /// Reads a descriptor reference, parsing the full shape on first sight.
    pub fn read(&mut self, input: &mut PrimReader<'_>) -> Result<Rc<TypeReadInfo>, GraphError> {
        let index = input.read_index()?;
        let slot = index as usize;

        if let Some(existing) = self.infos.get(slot) {
            return existing.clone().ok_or_else(|| {
                GraphError::invalid_data(format!("descriptor {index} refers to itself"))
            });
        }
        if slot != self.infos.len() {
            return Err(GraphError::invalid_data(format!(
                "descriptor index {index} skips ahead of {} known descriptors",
                self.infos.len()
            )));
        }

        self.infos.push(None);
        let info = Rc::new(self.read_shape(input, index)?);
        self.infos[slot] = Some(info.clone());
        Ok(info)
    }

    fn read_shape(&mut self, input: &mut PrimReader<'_>, index: u32) -> Result<TypeReadInfo, GraphError> {
        let byte = input.read_u8()?;
        let tag = KindTag::from_u8(byte)
            .ok_or_else(|| GraphError::invalid_data(format!("unknown descriptor tag {byte:#04x}")))?;
        let mut info = TypeReadInfo::new(index, tag);

        match tag {
            KindTag::Nullable | KindTag::ByRef | KindTag::Pointer => {
                info.sub_types.push(self.read(input)?);
            }
            KindTag::Array => {
                info.rank = read_rank(input)?;
                info.sub_types.push(self.read(input)?);
            }
            KindTag::OpenArray => {
                info.rank = read_rank(input)?;
            }
            KindTag::Enum => {
                read_names(input, &mut info)?;
                read_driver(input, &mut info)?;
                info.sub_types.push(self.read(input)?);
            }
            KindTag::GenericDefinition => {
                read_names(input, &mut info)?;
                info.arity = input.read_u8()?;
            }
            _ => {
                read_names(input, &mut info)?;
                read_driver(input, &mut info)?;
                if tag.is_generic() {
                    let argc = input.read_u8()?;
                    info.sub_types.reserve(usize::from(argc));
                    for _ in 0..argc {
                        info.sub_types.push(self.read(input)?);
                    }
                }
                if input.read_bool()? {
                    info.base = Some(self.read(input)?);
                }
            }
        }

        Ok(info)
    }
}

fn read_rank(input: &mut PrimReader<'_>) -> Result<u8, GraphError> {
    match input.read_u8()? {
        0 => Err(GraphError::invalid_data("array descriptor with rank 0")),
        rank => Ok(rank),
    }
}

fn read_names(input: &mut PrimReader<'_>, info: &mut TypeReadInfo) -> Result<(), GraphError> {
    let namespace = input.read_interned()?;
    info.namespace = (!namespace.is_empty()).then_some(namespace);
    info.name = input.read_interned()?;
    if input.read_bool()? {
        info.origin = Some(input.read_interned()?);
    }
    Ok(())
}

fn read_driver(input: &mut PrimReader<'_>, info: &mut TypeReadInfo) -> Result<(), GraphError> {
    if input.read_bool()? {
        info.driver_name = Some(input.read_interned()?);
        let version = input.read_signed()?;
        info.version = i32::try_from(version)
            .map_err(|_| GraphError::invalid_data(format!("driver version {version} out of range")))?;
    }
    Ok(())
}

// -----------------------------------------------------------------------------
// Tests

#[cfg(test)]
mod tests {
    use vc_utils::IndexTable;

    use super::*;
    use crate::descriptor::write_descriptor;
    use crate::driver::DriverRegistry;
    use crate::object::{Prim, Type};
    use crate::wire::{Endian, PrimWriter};

    fn written(types: &[Type]) -> Vec<u8> {
        let registry = DriverRegistry::builder().build();
        let mut bytes = Vec::new();
        let mut out = PrimWriter::new(&mut bytes, Endian::Little);
        let mut table = IndexTable::new();
        for ty in types {
            write_descriptor(&mut table, &mut out, registry.drivers(None), ty).unwrap();
        }
        bytes
    }

    #[test]
    fn repeated_type_costs_one_index() {
        let list = Type::list(Type::prim(Prim::I32));
        let once = written(core::slice::from_ref(&list));
        let twice = written(&[list.clone(), list]);
        assert_eq!(twice.len(), once.len() + 1);
        assert_eq!(twice[twice.len() - 1], 0);
    }

    #[test]
    fn shapes_survive() {
        let base = Type::open("zoo", "Animal").with_origin("zoo_lib");
        let types = [
            Type::list(Type::prim(Prim::String)),
            Type::array(Type::prim(Prim::F64), 2),
            Type::nullable(Type::enumeration("app", "Color", Prim::U8)),
            Type::sealed("zoo", "Dog").with_base(base),
            Type::generic_definition("alloc::vec", "Vec", 1),
            Type::open_array(1),
        ];
        let bytes = written(&types);

        let mut input = &bytes[..];
        let mut reader = PrimReader::new(&mut input, Endian::Little);
        let mut table = DescriptorTable::default();
        let infos: Vec<_> = types.iter().map(|_| table.read(&mut reader).unwrap()).collect();

        assert_eq!(infos[0].to_string(), "alloc::vec::Vec<alloc::string::String>");
        assert_eq!(infos[0].driver_name(), Some("alloc::vec::Vec"));
        assert_eq!(infos[1].rank(), 2);
        assert_eq!(infos[2].non_nullable().underlying(), Some(Prim::U8));
        assert_eq!(infos[3].base().unwrap().origin(), Some("zoo_lib"));
        assert_eq!(infos[4].arity(), 1);
        assert!(infos[5].is_open());
        assert!(!infos[3].is_open());
    }

    #[test]
    fn rejects_forward_and_self_references() {
        let bytes = [5_u8];
        let mut input = &bytes[..];
        let mut reader = PrimReader::new(&mut input, Endian::Little);
        assert!(DescriptorTable::default().read(&mut reader).is_err());

        // Index 0, nullable, inner descriptor index 0 again.
        let bytes = [0_u8, b'N', 0];
        let mut input = &bytes[..];
        let mut reader = PrimReader::new(&mut input, Endian::Little);
        assert!(matches!(
            DescriptorTable::default().read(&mut reader),
            Err(GraphError::InvalidData { .. })
        ));
    }
}
