use alloc::sync::Arc;
use std::io::{self, Read, Write};

use serde::{Deserialize, Serialize};
use vc_utils::IndexTable;

use super::{Marker, varint};
use crate::GraphError;
use crate::object::{Prim, Value};

/// Byte order of fixed-width primitives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Endian {
    Little,
    Big,
}

/// Strings longer than this are read in chunks so a corrupt length cannot
/// force one huge allocation.
const STRING_CHUNK: usize = 8 * 1024;

macro_rules! fixed_width {
    ($($write:ident, $read:ident: $ty:ty;)*) => {
        impl PrimWriter<'_> {
            $(
                #[inline]
                pub fn $write(&mut self, value: $ty) -> Result<(), GraphError> {
                    let bytes = match self.endian {
                        Endian::Little => value.to_le_bytes(),
                        Endian::Big => value.to_be_bytes(),
                    };
                    self.write_bytes(&bytes)
                }
            )*
        }

        impl PrimReader<'_> {
            $(
                #[inline]
                pub fn $read(&mut self) -> Result<$ty, GraphError> {
                    let mut bytes = [0; size_of::<$ty>()];
                    self.read_bytes(&mut bytes)?;
                    Ok(match self.endian {
                        Endian::Little => <$ty>::from_le_bytes(bytes),
                        Endian::Big => <$ty>::from_be_bytes(bytes),
                    })
                }
            )*
        }
    };
}

fixed_width! {
    write_i8, read_i8: i8;
    write_i16, read_i16: i16;
    write_i32, read_i32: i32;
    write_i64, read_i64: i64;
    write_u16, read_u16: u16;
    write_u32, read_u32: u32;
    write_u64, read_u64: u64;
    write_f32, read_f32: f32;
    write_f64, read_f64: f64;
}

// -----------------------------------------------------------------------------
// PrimWriter

/// Writes primitives and session-interned strings to a byte sink.
pub struct PrimWriter<'a> {
    out: &'a mut dyn Write,
    endian: Endian,
    strings: IndexTable<Arc<str>>,
}

impl<'a> PrimWriter<'a> {
    pub fn new(out: &'a mut dyn Write, endian: Endian) -> Self {
        Self {
            out,
            endian,
            strings: IndexTable::new(),
        }
    }

    #[inline]
    pub fn endian(&self) -> Endian {
        self.endian
    }

    #[inline]
    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), GraphError> {
        self.out.write_all(bytes).map_err(GraphError::from)
    }

    #[inline]
    pub fn write_u8(&mut self, value: u8) -> Result<(), GraphError> {
        self.write_bytes(&[value])
    }

    #[inline]
    pub fn write_bool(&mut self, value: bool) -> Result<(), GraphError> {
        self.write_u8(value as u8)
    }

    #[inline]
    pub fn write_char(&mut self, value: char) -> Result<(), GraphError> {
        self.write_u32(value as u32)
    }

    #[inline]
    pub fn write_marker(&mut self, marker: Marker) -> Result<(), GraphError> {
        self.write_u8(marker as u8)
    }

    /// Unsigned LEB128.
    #[inline]
    pub fn write_varint(&mut self, value: u64) -> Result<(), GraphError> {
        varint::write(&mut *self.out, value).map_err(GraphError::from)
    }

    /// Zigzag-mapped LEB128.
    #[inline]
    pub fn write_signed(&mut self, value: i64) -> Result<(), GraphError> {
        self.write_varint(varint::zigzag(value))
    }

    #[inline]
    pub fn write_len(&mut self, len: usize) -> Result<(), GraphError> {
        self.write_varint(len as u64)
    }

    /// Length-prefixed UTF-8.
    pub fn write_str(&mut self, value: &str) -> Result<(), GraphError> {
        self.write_len(value.len())?;
        self.write_bytes(value.as_bytes())
    }

    /// Writes `0` and the string the first time it is seen in this session,
    /// `index + 1` afterwards.
    pub fn write_interned(&mut self, value: &str) -> Result<(), GraphError> {
        if let Some(index) = self.strings.get(value) {
            return self.write_varint(u64::from(index) + 1);
        }
        self.strings.get_or_insert(Arc::from(value));
        self.write_varint(0)?;
        self.write_str(value)
    }

    /// Writes `value` with the wire encoding of `prim`.
    ///
    /// The value must already have the matching variant; callers convert with
    /// [`Prim::coerce`] first.
    pub fn write_prim(&mut self, prim: Prim, value: &Value) -> Result<(), GraphError> {
        match (prim, value) {
            (Prim::Bool, Value::Bool(v)) => self.write_bool(*v),
            (Prim::Char, Value::Char(v)) => self.write_char(*v),
            (Prim::I8, Value::I8(v)) => self.write_i8(*v),
            (Prim::I16, Value::I16(v)) => self.write_i16(*v),
            (Prim::I32, Value::I32(v)) => self.write_i32(*v),
            (Prim::I64, Value::I64(v)) => self.write_i64(*v),
            (Prim::U8, Value::U8(v)) => self.write_u8(*v),
            (Prim::U16, Value::U16(v)) => self.write_u16(*v),
            (Prim::U32, Value::U32(v)) => self.write_u32(*v),
            (Prim::U64, Value::U64(v)) => self.write_u64(*v),
            (Prim::F32, Value::F32(v)) => self.write_f32(*v),
            (Prim::F64, Value::F64(v)) => self.write_f64(*v),
            (Prim::String, Value::Str(v)) => self.write_str(v),
            _ => Err(GraphError::custom(format_args!(
                "cannot write {value:?} as `{}`",
                prim.path()
            ))),
        }
    }

    pub fn flush(&mut self) -> Result<(), GraphError> {
        self.out.flush().map_err(GraphError::from)
    }
}

// -----------------------------------------------------------------------------
// PrimReader

/// Reads primitives and session-interned strings from a byte source.
///
/// Holds at most one byte of pushback, used to look for the sentinel
/// announcement after the header.
pub struct PrimReader<'a> {
    input: &'a mut dyn Read,
    endian: Endian,
    peeked: Option<u8>,
    strings: Vec<Arc<str>>,
}

fn eof(e: io::Error) -> GraphError {
    if e.kind() == io::ErrorKind::UnexpectedEof {
        GraphError::invalid_data("unexpected end of stream")
    } else {
        GraphError::Io(e)
    }
}

impl<'a> PrimReader<'a> {
    pub fn new(input: &'a mut dyn Read, endian: Endian) -> Self {
        Self {
            input,
            endian,
            peeked: None,
            strings: Vec::new(),
        }
    }

    #[inline]
    pub fn endian(&self) -> Endian {
        self.endian
    }

    pub fn read_bytes(&mut self, buf: &mut [u8]) -> Result<(), GraphError> {
        if buf.is_empty() {
            return Ok(());
        }
        let buf = match self.peeked.take() {
            Some(byte) => {
                buf[0] = byte;
                &mut buf[1..]
            }
            None => buf,
        };
        self.input.read_exact(buf).map_err(eof)
    }

    #[inline]
    pub fn read_u8(&mut self) -> Result<u8, GraphError> {
        let mut byte = [0];
        self.read_bytes(&mut byte)?;
        Ok(byte[0])
    }

    /// Reads one byte and keeps it for the next read.
    pub fn peek_u8(&mut self) -> Result<u8, GraphError> {
        let byte = self.read_u8()?;
        self.peeked = Some(byte);
        Ok(byte)
    }

    /// Drops a byte returned by [`peek_u8`](Self::peek_u8).
    #[inline]
    pub fn consume_peeked(&mut self) {
        self.peeked = None;
    }

    pub fn read_bool(&mut self) -> Result<bool, GraphError> {
        match self.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(GraphError::invalid_data(format!("invalid bool byte {other}"))),
        }
    }

    pub fn read_char(&mut self) -> Result<char, GraphError> {
        let scalar = self.read_u32()?;
        char::from_u32(scalar)
            .ok_or_else(|| GraphError::invalid_data(format!("invalid char scalar {scalar:#x}")))
    }

    pub fn read_marker(&mut self) -> Result<Marker, GraphError> {
        let byte = self.read_u8()?;
        Marker::from_u8(byte)
            .ok_or_else(|| GraphError::invalid_data(format!("unknown marker byte {byte:#04x}")))
    }

    pub fn read_varint(&mut self) -> Result<u64, GraphError> {
        varint::decode(|| self.read_u8())?
            .ok_or_else(|| GraphError::invalid_data("overlong varint"))
    }

    pub fn read_signed(&mut self) -> Result<i64, GraphError> {
        self.read_varint().map(varint::unzigzag)
    }

    /// A varint that must fit the 32-bit index space of the session tables.
    pub fn read_index(&mut self) -> Result<u32, GraphError> {
        let value = self.read_varint()?;
        u32::try_from(value).map_err(|_| GraphError::invalid_data(format!("index {value} out of range")))
    }

    pub fn read_len(&mut self) -> Result<usize, GraphError> {
        let value = self.read_varint()?;
        usize::try_from(value).map_err(|_| GraphError::invalid_data(format!("length {value} out of range")))
    }

    pub fn read_string(&mut self) -> Result<String, GraphError> {
        let len = self.read_len()?;
        let mut bytes = Vec::with_capacity(len.min(STRING_CHUNK));
        let mut chunk = [0; STRING_CHUNK];
        let mut remaining = len;
        while remaining > 0 {
            let step = remaining.min(STRING_CHUNK);
            self.read_bytes(&mut chunk[..step])?;
            bytes.extend_from_slice(&chunk[..step]);
            remaining -= step;
        }
        String::from_utf8(bytes).map_err(|_| GraphError::invalid_data("string is not valid UTF-8"))
    }

    /// Counterpart of [`PrimWriter::write_interned`].
    pub fn read_interned(&mut self) -> Result<Arc<str>, GraphError> {
        match self.read_varint()? {
            0 => {
                let value: Arc<str> = Arc::from(self.read_string()?);
                self.strings.push(value.clone());
                Ok(value)
            }
            index => usize::try_from(index - 1)
                .ok()
                .and_then(|index| self.strings.get(index))
                .cloned()
                .ok_or_else(|| {
                    GraphError::invalid_data(format!(
                        "string index {} out of range ({} interned)",
                        index - 1,
                        self.strings.len()
                    ))
                }),
        }
    }

    /// Reads a value with the wire encoding of `prim`.
    pub fn read_prim(&mut self, prim: Prim) -> Result<Value, GraphError> {
        Ok(match prim {
            Prim::Bool => Value::Bool(self.read_bool()?),
            Prim::Char => Value::Char(self.read_char()?),
            Prim::I8 => Value::I8(self.read_i8()?),
            Prim::I16 => Value::I16(self.read_i16()?),
            Prim::I32 => Value::I32(self.read_i32()?),
            Prim::I64 => Value::I64(self.read_i64()?),
            Prim::U8 => Value::U8(self.read_u8()?),
            Prim::U16 => Value::U16(self.read_u16()?),
            Prim::U32 => Value::U32(self.read_u32()?),
            Prim::U64 => Value::U64(self.read_u64()?),
            Prim::F32 => Value::F32(self.read_f32()?),
            Prim::F64 => Value::F64(self.read_f64()?),
            Prim::String => Value::Str(Arc::from(self.read_string()?)),
        })
    }
}

// -----------------------------------------------------------------------------
// Tests

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interned_strings_are_indexed() {
        let mut bytes = Vec::new();
        let mut writer = PrimWriter::new(&mut bytes, Endian::Little);
        writer.write_interned("Node").unwrap();
        writer.write_interned("Edge").unwrap();
        writer.write_interned("Node").unwrap();

        assert_eq!(bytes[..6], [0, 4, b'N', b'o', b'd', b'e']);
        assert_eq!(bytes[bytes.len() - 1], 1);

        let mut input = &bytes[..];
        let mut reader = PrimReader::new(&mut input, Endian::Little);
        assert_eq!(&*reader.read_interned().unwrap(), "Node");
        assert_eq!(&*reader.read_interned().unwrap(), "Edge");
        assert_eq!(&*reader.read_interned().unwrap(), "Node");
    }

    #[test]
    fn unknown_string_index() {
        let bytes = [3_u8];
        let mut input = &bytes[..];
        let mut reader = PrimReader::new(&mut input, Endian::Little);
        assert!(matches!(
            reader.read_interned(),
            Err(GraphError::InvalidData { .. })
        ));
    }

    #[test]
    fn endianness_is_honored() {
        let mut bytes = Vec::new();
        let mut writer = PrimWriter::new(&mut bytes, Endian::Big);
        writer.write_u32(0x0102_0304).unwrap();
        assert_eq!(bytes, [1, 2, 3, 4]);

        let mut input = &bytes[..];
        let mut reader = PrimReader::new(&mut input, Endian::Little);
        assert_eq!(reader.read_u32().unwrap(), 0x0403_0201);
    }

    #[test]
    fn peeked_byte_is_replayed() {
        let bytes = [7_u8, 1, 0];
        let mut input = &bytes[..];
        let mut reader = PrimReader::new(&mut input, Endian::Little);
        assert_eq!(reader.peek_u8().unwrap(), 7);
        assert_eq!(reader.read_u16().unwrap(), 0x0107);
        assert_eq!(reader.read_u8().unwrap(), 0);
        assert!(matches!(reader.read_u8(), Err(GraphError::InvalidData { .. })));
    }

    #[test]
    fn truncated_string() {
        let bytes = [5_u8, b'a', b'b'];
        let mut input = &bytes[..];
        let mut reader = PrimReader::new(&mut input, Endian::Little);
        assert!(reader.read_string().is_err());
    }
}
