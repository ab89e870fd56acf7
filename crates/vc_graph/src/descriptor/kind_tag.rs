use crate::object::{Type, TypeKind};

/// First byte of a full descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum KindTag {
    Nullable = b'N',
    Enum = b'E',
    Array = b'A',
    OpenArray = b'a',
    GenericDefinition = b'G',
    Value = b'V',
    SealedRef = b'S',
    OpenRef = b'O',
    Interface = b'I',
    GenericValue = b'v',
    GenericSealedRef = b's',
    GenericOpenRef = b'o',
    GenericInterface = b'i',
    ByRef = b'R',
    Pointer = b'P',
}

impl KindTag {
    pub fn of(ty: &Type) -> Self {
        let generic = ty.is_generic();
        match ty.kind() {
            TypeKind::Nullable => Self::Nullable,
            TypeKind::Enum => Self::Enum,
            TypeKind::Array if ty.element().is_some() => Self::Array,
            TypeKind::Array => Self::OpenArray,
            TypeKind::GenericDefinition => Self::GenericDefinition,
            TypeKind::ByRef => Self::ByRef,
            TypeKind::Pointer => Self::Pointer,
            TypeKind::Value if generic => Self::GenericValue,
            TypeKind::Value => Self::Value,
            TypeKind::SealedRef if generic => Self::GenericSealedRef,
            TypeKind::SealedRef => Self::SealedRef,
            TypeKind::OpenRef if generic => Self::GenericOpenRef,
            TypeKind::OpenRef => Self::OpenRef,
            TypeKind::Interface if generic => Self::GenericInterface,
            TypeKind::Interface => Self::Interface,
        }
    }

    pub const fn from_u8(byte: u8) -> Option<Self> {
        Some(match byte {
            b'N' => Self::Nullable,
            b'E' => Self::Enum,
            b'A' => Self::Array,
            b'a' => Self::OpenArray,
            b'G' => Self::GenericDefinition,
            b'V' => Self::Value,
            b'S' => Self::SealedRef,
            b'O' => Self::OpenRef,
            b'I' => Self::Interface,
            b'v' => Self::GenericValue,
            b's' => Self::GenericSealedRef,
            b'o' => Self::GenericOpenRef,
            b'i' => Self::GenericInterface,
            b'R' => Self::ByRef,
            b'P' => Self::Pointer,
            _ => return None,
        })
    }

    pub const fn kind(self) -> TypeKind {
        match self {
            Self::Nullable => TypeKind::Nullable,
            Self::Enum => TypeKind::Enum,
            Self::Array | Self::OpenArray => TypeKind::Array,
            Self::GenericDefinition => TypeKind::GenericDefinition,
            Self::Value | Self::GenericValue => TypeKind::Value,
            Self::SealedRef | Self::GenericSealedRef => TypeKind::SealedRef,
            Self::OpenRef | Self::GenericOpenRef => TypeKind::OpenRef,
            Self::Interface | Self::GenericInterface => TypeKind::Interface,
            Self::ByRef => TypeKind::ByRef,
            Self::Pointer => TypeKind::Pointer,
        }
    }

    /// Named kinds with bound generic arguments.
    pub const fn is_generic(self) -> bool {
        matches!(
            self,
            Self::GenericValue | Self::GenericSealedRef | Self::GenericOpenRef | Self::GenericInterface
        )
    }
}

#[cfg(test)]
mod tests {
    use super::KindTag;
    use crate::object::{Prim, Type};

    #[test]
    fn tags_of_types() {
        assert_eq!(KindTag::of(&Type::prim(Prim::I32)), KindTag::Value);
        assert_eq!(KindTag::of(&Type::list(Type::object())), KindTag::GenericSealedRef);
        assert_eq!(KindTag::of(&Type::object()), KindTag::OpenRef);
        assert_eq!(KindTag::of(&Type::open_array(1)), KindTag::OpenArray);

        for byte in b"NEAaGVSOIvsoiRP" {
            assert_eq!(KindTag::from_u8(*byte).unwrap() as u8, *byte);
        }
        assert_eq!(KindTag::from_u8(b'x'), None);
    }
}
