use core::fmt;

/// The one-byte tag that starts every value in a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Marker {
    Null = 0,
    /// Descriptor, then the payload of a reference object. Assigns an id.
    ObjectData = 1,
    /// Descriptor, then the payload of a value. No id.
    ValueData = 2,
    /// Id of an object written earlier in the same stream.
    BackReference = 3,
    /// A descriptor carried as data.
    TypeValue = 4,
    /// Descriptor only. The payload follows once the root has been written.
    DeferredData = 5,
    /// Descriptor of an object without state. Assigns an id.
    EmptyObject = 6,
    /// Interned key of an object both sides registered up front.
    KnownObjectRef = 7,
}

impl Marker {
    #[inline]
    pub const fn from_u8(byte: u8) -> Option<Self> {
        Some(match byte {
            0 => Self::Null,
            1 => Self::ObjectData,
            2 => Self::ValueData,
            3 => Self::BackReference,
            4 => Self::TypeValue,
            5 => Self::DeferredData,
            6 => Self::EmptyObject,
            7 => Self::KnownObjectRef,
            _ => return None,
        })
    }

    /// Whether the marker is followed by a descriptor when read untyped.
    #[inline]
    pub const fn has_descriptor(self) -> bool {
        matches!(
            self,
            Self::ObjectData | Self::ValueData | Self::DeferredData | Self::EmptyObject
        )
    }
}

impl fmt::Display for Marker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::Marker;

    #[test]
    fn byte_values() {
        for byte in 0..=7 {
            let marker = Marker::from_u8(byte).unwrap();
            assert_eq!(marker as u8, byte);
        }
        assert_eq!(Marker::from_u8(8), None);
        assert_eq!(Marker::from_u8(0xF0), None);
    }
}
