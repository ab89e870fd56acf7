use std::io::{self, Read, Write};

use bitflags::bitflags;

use super::{Endian, varint};
use crate::GraphError;

/// Oldest stream version this crate reads.
pub const MIN_VERSION: u32 = 1;
/// Version written by this crate.
pub const CURRENT_VERSION: u32 = 3;

bitflags! {
    /// Environment flags recorded by the writer.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct HeaderFlags: u8 {
        /// Fixed-width primitives are little-endian.
        const LITTLE_ENDIAN = 0b01;
        /// The writer's platform line terminator is CRLF.
        const CRLF = 0b10;
    }
}

// -----------------------------------------------------------------------------
// Header

/// Stream preamble: a varint version followed by one flags byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub version: u32,
    pub flags: HeaderFlags,
}

impl Header {
    pub fn current(endian: Endian, crlf: bool) -> Self {
        let mut flags = HeaderFlags::empty();
        flags.set(HeaderFlags::LITTLE_ENDIAN, endian == Endian::Little);
        flags.set(HeaderFlags::CRLF, crlf);
        Self {
            version: CURRENT_VERSION,
            flags,
        }
    }

    #[inline]
    pub fn endian(&self) -> Endian {
        if self.flags.contains(HeaderFlags::LITTLE_ENDIAN) {
            Endian::Little
        } else {
            Endian::Big
        }
    }

    pub fn write(&self, out: &mut dyn Write) -> io::Result<()> {
        varint::write(out, u64::from(self.version))?;
        out.write_all(&[self.flags.bits()])
    }

    /// Reads and validates a header. Unknown flag bits are rejected.
    pub fn read(input: &mut dyn Read) -> Result<Self, GraphError> {
        let version = match varint::read(input) {
            Ok(Some(version)) => version,
            Ok(None) => return Err(GraphError::InvalidHeader("malformed version".into())),
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                return Err(GraphError::InvalidHeader("stream ends before version".into()));
            }
            Err(e) => return Err(e.into()),
        };

        if !(u64::from(MIN_VERSION)..=u64::from(CURRENT_VERSION)).contains(&version) {
            return Err(GraphError::InvalidHeader(format!(
                "unsupported version {version}, expected {MIN_VERSION}..={CURRENT_VERSION}"
            )));
        }

        let mut flags = [0];
        match input.read_exact(&mut flags) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                return Err(GraphError::InvalidHeader("stream ends before flags".into()));
            }
            Err(e) => return Err(e.into()),
        }

        let Some(flags) = HeaderFlags::from_bits(flags[0]) else {
            return Err(GraphError::InvalidHeader(format!(
                "unknown flag bits {:#04x}",
                flags[0]
            )));
        };

        Ok(Self {
            version: version as u32,
            flags,
        })
    }
}

// -----------------------------------------------------------------------------
// Tests

#[cfg(test)]
mod tests {
    use super::*;

    fn read(bytes: &[u8]) -> Result<Header, GraphError> {
        let mut input = bytes;
        Header::read(&mut input)
    }

    #[test]
    fn current_header_bytes() {
        let mut out = Vec::new();
        Header::current(Endian::Little, true).write(&mut out).unwrap();
        assert_eq!(out, [3, 0b11]);

        let header = read(&out).unwrap();
        assert_eq!(header.version, CURRENT_VERSION);
        assert_eq!(header.endian(), Endian::Little);
        assert!(header.flags.contains(HeaderFlags::CRLF));
    }

    #[test]
    fn older_versions_are_accepted() {
        assert_eq!(read(&[1, 0]).unwrap().endian(), Endian::Big);
        assert_eq!(read(&[2, 1]).unwrap().version, 2);
    }

    #[test]
    fn rejects_bad_headers() {
        assert!(matches!(read(&[0, 1]), Err(GraphError::InvalidHeader(_))));
        assert!(matches!(read(&[4, 1]), Err(GraphError::InvalidHeader(_))));
        assert!(matches!(read(&[]), Err(GraphError::InvalidHeader(_))));
        assert!(matches!(read(&[3]), Err(GraphError::InvalidHeader(_))));
        assert!(matches!(read(&[3, 0x84]), Err(GraphError::InvalidHeader(_))));
    }
}
