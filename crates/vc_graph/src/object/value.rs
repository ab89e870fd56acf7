use alloc::sync::Arc;
use core::fmt;

use super::{ObjectRef, Prim, Type};

// -----------------------------------------------------------------------------
// Fields

/// Named members of a record or object, in declaration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fields(Vec<(Arc<str>, Value)>);

impl Fields {
    #[inline]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    #[inline]
    pub fn with_capacity(capacity: usize) -> Self {
        Self(Vec::with_capacity(capacity))
    }

    /// Appends a field without checking for duplicates.
    #[inline]
    pub fn push(&mut self, name: impl Into<Arc<str>>, value: Value) {
        self.0.push((name.into(), value));
    }

    /// Replaces the value of `name`, or appends it.
    pub fn set(&mut self, name: &str, value: Value) {
        match self.0.iter_mut().find(|(key, _)| &**key == name) {
            Some((_, slot)) => *slot = value,
            None => self.0.push((Arc::from(name), value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0
            .iter()
            .find(|(key, _)| &**key == name)
            .map(|(_, value)| value)
    }

    #[inline]
    pub fn iter(&self) -> impl ExactSizeIterator<Item = (&str, &Value)> {
        self.0.iter().map(|(key, value)| (&**key, value))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[inline]
    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut Value> {
        self.0.iter_mut().map(|(_, value)| value)
    }

    pub(crate) fn into_values(self) -> impl Iterator<Item = Value> {
        self.0.into_iter().map(|(_, value)| value)
    }
}

impl<K: Into<Arc<str>>> FromIterator<(K, Value)> for Fields {
    fn from_iter<T: IntoIterator<Item = (K, Value)>>(iter: T) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

// -----------------------------------------------------------------------------
// EnumValue

/// An enumeration value, stored as its raw discriminant.
#[derive(Debug, Clone, PartialEq)]
pub struct EnumValue {
    ty: Type,
    raw: i128,
}

impl EnumValue {
    #[inline]
    pub fn new(ty: Type, raw: i128) -> Self {
        Self { ty, raw }
    }

    #[inline]
    pub fn ty(&self) -> &Type {
        &self.ty
    }

    #[inline]
    pub fn raw(&self) -> i128 {
        self.raw
    }
}

// -----------------------------------------------------------------------------
// Record

/// An instance of a named value type.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    ty: Type,
    fields: Fields,
}

impl Record {
    #[inline]
    pub fn new(ty: Type) -> Self {
        Self {
            ty,
            fields: Fields::new(),
        }
    }

    #[inline]
    pub fn from_fields(ty: Type, fields: Fields) -> Self {
        Self { ty, fields }
    }

    /// Builder-style [`Fields::set`].
    pub fn with(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.fields.set(name, value.into());
        self
    }

    #[inline]
    pub fn ty(&self) -> &Type {
        &self.ty
    }

    #[inline]
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    #[inline]
    pub fn fields(&self) -> &Fields {
        &self.fields
    }

    #[inline]
    pub fn fields_mut(&mut self) -> &mut Fields {
        &mut self.fields
    }

    pub(crate) fn into_fields(self) -> Fields {
        self.fields
    }
}

// -----------------------------------------------------------------------------
// Value

/// A node of an object graph.
///
/// Everything except [`Value::Object`] is copied by value. Objects are shared
/// handles and compare by identity.
#[derive(Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Char(char),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    F32(f32),
    F64(f64),
    Str(Arc<str>),
    Enum(EnumValue),
    Record(Record),
    Object(ObjectRef),
    /// A type carried as data.
    Type(Type),
}

impl Value {
    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// The primitive type of a primitive value.
    pub fn prim(&self) -> Option<Prim> {
        Some(match self {
            Value::Bool(_) => Prim::Bool,
            Value::Char(_) => Prim::Char,
            Value::I8(_) => Prim::I8,
            Value::I16(_) => Prim::I16,
            Value::I32(_) => Prim::I32,
            Value::I64(_) => Prim::I64,
            Value::U8(_) => Prim::U8,
            Value::U16(_) => Prim::U16,
            Value::U32(_) => Prim::U32,
            Value::U64(_) => Prim::U64,
            Value::F32(_) => Prim::F32,
            Value::F64(_) => Prim::F64,
            Value::Str(_) => Prim::String,
            _ => return None,
        })
    }

    /// The exact type of the value. `None` for null.
    pub fn runtime_type(&self) -> Option<Type> {
        match self {
            Value::Null => None,
            Value::Enum(value) => Some(value.ty.clone()),
            Value::Record(record) => Some(record.ty.clone()),
            Value::Object(object) => Some(object.ty().clone()),
            Value::Type(_) => Some(Type::value("core::any", "Type")),
            other => other.prim().map(Type::prim),
        }
    }

    /// Integer view of integer, char and enum values.
    pub fn as_i128(&self) -> Option<i128> {
        Some(match *self {
            Value::Char(v) => i128::from(u32::from(v)),
            Value::I8(v) => i128::from(v),
            Value::I16(v) => i128::from(v),
            Value::I32(v) => i128::from(v),
            Value::I64(v) => i128::from(v),
            Value::U8(v) => i128::from(v),
            Value::U16(v) => i128::from(v),
            Value::U32(v) => i128::from(v),
            Value::U64(v) => i128::from(v),
            Value::Enum(ref v) => v.raw,
            _ => return None,
        })
    }

    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Value::F32(v) => Some(f64::from(v)),
            Value::F64(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match *self {
            Value::Bool(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Value::Object(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Value::Record(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_enum(&self) -> Option<&EnumValue> {
        match self {
            Value::Enum(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_type(&self) -> Option<&Type> {
        match self {
            Value::Type(v) => Some(v),
            _ => None,
        }
    }

    /// Field of a record or of an object with fields.
    pub fn field(&self, name: &str) -> Option<Value> {
        match self {
            Value::Record(record) => record.field(name).cloned(),
            Value::Object(object) => object.field(name),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Char(a), Value::Char(b)) => a == b,
            (Value::I8(a), Value::I8(b)) => a == b,
            (Value::I16(a), Value::I16(b)) => a == b,
            (Value::I32(a), Value::I32(b)) => a == b,
            (Value::I64(a), Value::I64(b)) => a == b,
            (Value::U8(a), Value::U8(b)) => a == b,
            (Value::U16(a), Value::U16(b)) => a == b,
            (Value::U32(a), Value::U32(b)) => a == b,
            (Value::U64(a), Value::U64(b)) => a == b,
            (Value::F32(a), Value::F32(b)) => a == b,
            (Value::F64(a), Value::F64(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Enum(a), Value::Enum(b)) => a == b,
            (Value::Record(a), Value::Record(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => ObjectRef::ptr_eq(a, b),
            (Value::Type(a), Value::Type(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("Null"),
            Value::Bool(v) => write!(f, "Bool({v})"),
            Value::Char(v) => write!(f, "Char({v:?})"),
            Value::I8(v) => write!(f, "I8({v})"),
            Value::I16(v) => write!(f, "I16({v})"),
            Value::I32(v) => write!(f, "I32({v})"),
            Value::I64(v) => write!(f, "I64({v})"),
            Value::U8(v) => write!(f, "U8({v})"),
            Value::U16(v) => write!(f, "U16({v})"),
            Value::U32(v) => write!(f, "U32({v})"),
            Value::U64(v) => write!(f, "U64({v})"),
            Value::F32(v) => write!(f, "F32({v})"),
            Value::F64(v) => write!(f, "F64({v})"),
            Value::Str(v) => write!(f, "Str({v:?})"),
            Value::Enum(v) => write!(f, "Enum({} = {})", v.ty, v.raw),
            Value::Record(v) => f
                .debug_struct("Record")
                .field("ty", &v.ty)
                .field("fields", &v.fields)
                .finish(),
            Value::Object(v) => fmt::Debug::fmt(v, f),
            Value::Type(v) => fmt::Debug::fmt(v, f),
        }
    }
}

/// Short rendering used in error messages.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::Char(v) => write!(f, "{v:?}"),
            Value::Str(v) => write!(f, "{v:?}"),
            Value::Enum(v) => write!(f, "{}({})", v.ty, v.raw),
            Value::Record(v) => write!(f, "{} {{ .. }}", v.ty),
            Value::Object(v) => write!(f, "{} @ {:#x}", v.ty(), v.addr()),
            Value::Type(v) => write!(f, "{v}"),
            other => match (other.as_i128(), other.as_f64()) {
                (Some(raw), _) => write!(f, "{raw}"),
                (_, Some(float)) => write!(f, "{float}"),
                _ => Ok(()),
            },
        }
    }
}

macro_rules! impl_from {
    ($($ty:ty => $variant:ident,)*) => {
        $(
            impl From<$ty> for Value {
                #[inline]
                fn from(value: $ty) -> Self {
                    Value::$variant(value)
                }
            }
        )*
    };
}

impl_from! {
    bool => Bool,
    char => Char,
    i8 => I8,
    i16 => I16,
    i32 => I32,
    i64 => I64,
    u8 => U8,
    u16 => U16,
    u32 => U32,
    u64 => U64,
    f32 => F32,
    f64 => F64,
    Arc<str> => Str,
    EnumValue => Enum,
    Record => Record,
    ObjectRef => Object,
    Type => Type,
}

impl From<&str> for Value {
    #[inline]
    fn from(value: &str) -> Self {
        Value::Str(Arc::from(value))
    }
}

impl From<String> for Value {
    #[inline]
    fn from(value: String) -> Self {
        Value::Str(Arc::from(value))
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

// -----------------------------------------------------------------------------
// Tests

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fields_keep_order() {
        let mut fields = Fields::new();
        fields.set("b", Value::from(1_i32));
        fields.set("a", Value::from(2_i32));
        fields.set("b", Value::from(3_i32));

        let names: Vec<_> = fields.iter().map(|(name, _)| name).collect();
        assert_eq!(names, ["b", "a"]);
        assert_eq!(fields.get("b"), Some(&Value::I32(3)));
    }

    #[test]
    fn objects_compare_by_identity() {
        let ty = Type::sealed("test", "Thing");
        let a = ObjectRef::empty(ty.clone());
        let b = ObjectRef::empty(ty);

        assert_eq!(Value::from(a.clone()), Value::from(a));
        assert_ne!(Value::from(b.clone()), Value::Object(ObjectRef::empty(b.ty().clone())));
    }

    #[test]
    fn runtime_types() {
        assert_eq!(Value::from(1_u16).runtime_type(), Some(Type::prim(Prim::U16)));
        assert_eq!(Value::from("x").runtime_type(), Some(Type::prim(Prim::String)));
        assert_eq!(Value::Null.runtime_type(), None);
        assert_eq!(Value::from(None::<i32>), Value::Null);
    }
}
