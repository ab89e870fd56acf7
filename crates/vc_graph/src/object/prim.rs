use core::fmt;

use super::Value;
use crate::GraphError;

/// The primitive types with a fixed wire encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Prim {
    Bool,
    Char,
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
    String,
}

impl Prim {
    pub const ALL: [Prim; 13] = [
        Prim::Bool,
        Prim::Char,
        Prim::I8,
        Prim::I16,
        Prim::I32,
        Prim::I64,
        Prim::U8,
        Prim::U16,
        Prim::U32,
        Prim::U64,
        Prim::F32,
        Prim::F64,
        Prim::String,
    ];

    #[inline]
    pub const fn namespace(self) -> &'static str {
        match self {
            Prim::String => "alloc::string",
            _ => "core",
        }
    }

    #[inline]
    pub const fn name(self) -> &'static str {
        match self {
            Prim::Bool => "bool",
            Prim::Char => "char",
            Prim::I8 => "i8",
            Prim::I16 => "i16",
            Prim::I32 => "i32",
            Prim::I64 => "i64",
            Prim::U8 => "u8",
            Prim::U16 => "u16",
            Prim::U32 => "u32",
            Prim::U64 => "u64",
            Prim::F32 => "f32",
            Prim::F64 => "f64",
            Prim::String => "String",
        }
    }

    /// `namespace::name`, as used in descriptors and driver names.
    pub const fn path(self) -> &'static str {
        match self {
            Prim::Bool => "core::bool",
            Prim::Char => "core::char",
            Prim::I8 => "core::i8",
            Prim::I16 => "core::i16",
            Prim::I32 => "core::i32",
            Prim::I64 => "core::i64",
            Prim::U8 => "core::u8",
            Prim::U16 => "core::u16",
            Prim::U32 => "core::u32",
            Prim::U64 => "core::u64",
            Prim::F32 => "core::f32",
            Prim::F64 => "core::f64",
            Prim::String => "alloc::string::String",
        }
    }

    pub fn from_name(namespace: Option<&str>, name: &str) -> Option<Prim> {
        Prim::ALL
            .into_iter()
            .find(|prim| namespace == Some(prim.namespace()) && name == prim.name())
    }

    #[inline]
    pub const fn is_integer(self) -> bool {
        matches!(
            self,
            Prim::I8
                | Prim::I16
                | Prim::I32
                | Prim::I64
                | Prim::U8
                | Prim::U16
                | Prim::U32
                | Prim::U64
        )
    }

    #[inline]
    pub const fn is_float(self) -> bool {
        matches!(self, Prim::F32 | Prim::F64)
    }

    /// Builds an integer value of this type, or `None` if `raw` does not fit.
    pub fn int(self, raw: i128) -> Option<Value> {
        Some(match self {
            Prim::I8 => Value::I8(raw.try_into().ok()?),
            Prim::I16 => Value::I16(raw.try_into().ok()?),
            Prim::I32 => Value::I32(raw.try_into().ok()?),
            Prim::I64 => Value::I64(raw.try_into().ok()?),
            Prim::U8 => Value::U8(raw.try_into().ok()?),
            Prim::U16 => Value::U16(raw.try_into().ok()?),
            Prim::U32 => Value::U32(raw.try_into().ok()?),
            Prim::U64 => Value::U64(raw.try_into().ok()?),
            _ => return None,
        })
    }

    /// Converts a primitive value to this type.
    ///
    /// Narrowing is checked: a value that does not fit fails with
    /// [`GraphError::Overflow`] instead of being truncated. A float converts to
    /// an integer only when it is integral and in range. Conversions into
    /// `f32` or `f64` check the range but round to the nearest representable
    /// value, so a large `u64` or a precise `f64` may lose low digits.
    /// Booleans and strings only convert to themselves.
    pub fn coerce(self, value: Value) -> Result<Value, GraphError> {
        let Some(source) = value.prim() else {
            return Err(GraphError::custom(format_args!(
                "expected a primitive for `{}`, found {value:?}",
                self.path()
            )));
        };
        if source == self {
            return Ok(value);
        }
        if matches!(source, Prim::Bool | Prim::String) || matches!(self, Prim::Bool | Prim::String) {
            return Err(GraphError::custom(format_args!(
                "cannot convert `{}` to `{}`",
                source.path(),
                self.path()
            )));
        }

        let overflow = |value: &Value| GraphError::overflow(value, source.path(), self.path());

        let converted = match self {
            target if target.is_integer() => match value.as_i128() {
                Some(raw) => target.int(raw),
                None => value
                    .as_f64()
                    .filter(|v| v.fract() == 0.0 && v.abs() < 1e38)
                    .and_then(|v| target.int(v as i128)),
            },
            Prim::F64 => value
                .as_f64()
                .or_else(|| value.as_i128().map(|raw| raw as f64))
                .map(Value::F64),
            Prim::F32 => match value.as_f64() {
                Some(v) if v.is_finite() && v.abs() > f64::from(f32::MAX) => None,
                Some(v) => Some(Value::F32(v as f32)),
                None => value.as_i128().map(|raw| Value::F32(raw as f32)),
            },
            Prim::Char => value
                .as_i128()
                .and_then(|raw| u32::try_from(raw).ok())
                .and_then(char::from_u32)
                .map(Value::Char),
            _ => None,
        };

        converted.ok_or_else(|| overflow(&value))
    }
}

impl fmt::Display for Prim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// -----------------------------------------------------------------------------
// Tests
