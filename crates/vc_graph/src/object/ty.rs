use alloc::sync::Arc;
use core::fmt;
use core::hash::{Hash, Hasher};
use std::sync::OnceLock;

use super::Prim;

// -----------------------------------------------------------------------------
// TypeKind

/// The structural category of a [`Type`].
///
/// The kind decides the descriptor shape and whether instances are tracked
/// by identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeKind {
    /// A named value type. Instances are copied, never shared.
    Value,
    /// A named reference type without subtypes.
    SealedRef,
    /// A named reference type that may have subtypes.
    OpenRef,
    /// A named abstract contract. Has no instances of its own.
    Interface,
    /// A named enumeration over an integer primitive.
    Enum,
    /// `[T]` of some rank. Without an element it stands for any array.
    Array,
    /// An unbound generic like `Vec<_>`.
    GenericDefinition,
    /// `Option<T>` over a value type.
    Nullable,
    ByRef,
    Pointer,
}

impl TypeKind {
    /// Kinds whose instances carry identity.
    #[inline]
    pub const fn is_reference(self) -> bool {
        matches!(
            self,
            Self::SealedRef | Self::OpenRef | Self::Interface | Self::Array
        )
    }

    /// Kinds that carry a namespace and name.
    #[inline]
    pub const fn is_named(self) -> bool {
        matches!(
            self,
            Self::Value
                | Self::SealedRef
                | Self::OpenRef
                | Self::Interface
                | Self::Enum
                | Self::GenericDefinition
        )
    }
}

// -----------------------------------------------------------------------------
// Type

#[derive(Clone, PartialEq, Eq, Hash)]
struct TypeDef {
    kind: TypeKind,
    namespace: Option<Arc<str>>,
    name: Arc<str>,
    origin: Option<Arc<str>>,
    base: Option<Type>,
    args: Vec<Type>,
    rank: u8,
    arity: u8,
}

/// A runtime type handle.
///
/// Cheap to clone. Equality and hashing are structural, so two handles built
/// separately for `alloc::vec::Vec<core::i32>` are the same type.
///
/// Named types carry an optional `origin`, the name of the module or library
/// that defines them. It takes part in equality and lets two libraries define
/// types with the same path.
#[derive(Clone)]
pub struct Type(Arc<TypeDef>);

impl PartialEq for Type {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0) || self.0 == other.0
    }
}

impl Eq for Type {}

impl Hash for Type {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.hash(state);
    }
}

fn non_empty(value: &str) -> Option<Arc<str>> {
    (!value.is_empty()).then(|| Arc::from(value))
}

impl Type {
    fn from_def(def: TypeDef) -> Self {
        Self(Arc::new(def))
    }

    fn structural(kind: TypeKind, args: Vec<Type>, rank: u8) -> Self {
        Self::from_def(TypeDef {
            kind,
            namespace: None,
            name: Arc::from(""),
            origin: None,
            base: None,
            args,
            rank,
            arity: 0,
        })
    }

    /// A named type of the given kind. An empty namespace means none.
    pub fn named(kind: TypeKind, namespace: &str, name: &str) -> Self {
        Self::from_def(TypeDef {
            kind,
            namespace: non_empty(namespace),
            name: Arc::from(name),
            origin: None,
            base: None,
            args: Vec::new(),
            rank: 0,
            arity: 0,
        })
    }

    #[inline]
    pub fn value(namespace: &str, name: &str) -> Self {
        Self::named(TypeKind::Value, namespace, name)
    }

    #[inline]
    pub fn sealed(namespace: &str, name: &str) -> Self {
        Self::named(TypeKind::SealedRef, namespace, name)
    }

    #[inline]
    pub fn open(namespace: &str, name: &str) -> Self {
        Self::named(TypeKind::OpenRef, namespace, name)
    }

    #[inline]
    pub fn interface(namespace: &str, name: &str) -> Self {
        Self::named(TypeKind::Interface, namespace, name)
    }

    /// An enumeration stored as `underlying` on the wire.
    pub fn enumeration(namespace: &str, name: &str, underlying: Prim) -> Self {
        let mut def = Self::named(TypeKind::Enum, namespace, name).into_def();
        def.args = vec![Self::prim(underlying)];
        Self::from_def(def)
    }

    /// An unbound generic with `arity` parameters, usable as a type value.
    pub fn generic_definition(namespace: &str, name: &str, arity: u8) -> Self {
        let mut def = Self::named(TypeKind::GenericDefinition, namespace, name).into_def();
        def.arity = arity;
        Self::from_def(def)
    }

    /// The shared handle of a primitive type.
    pub fn prim(prim: Prim) -> Self {
        static PRIMS: OnceLock<Vec<Type>> = OnceLock::new();
        let prims = PRIMS.get_or_init(|| {
            Prim::ALL
                .into_iter()
                .map(|p| Self::value(p.namespace(), p.name()))
                .collect()
        });
        prims[prim as usize].clone()
    }

    /// The root reference type. Every open type derives from it implicitly.
    pub fn object() -> Self {
        static OBJECT: OnceLock<Type> = OnceLock::new();
        OBJECT
            .get_or_init(|| Self::open("core", "Object"))
            .clone()
    }

    /// `alloc::vec::Vec<elem>`, the built-in growable list.
    pub fn list(elem: Type) -> Self {
        Self::sealed("alloc::vec", "Vec").with_args([elem])
    }

    pub fn array(elem: Type, rank: u8) -> Self {
        Self::structural(TypeKind::Array, vec![elem], rank.max(1))
    }

    /// An array of unknown element type. Slots of this type are polymorphic.
    pub fn open_array(rank: u8) -> Self {
        Self::structural(TypeKind::Array, Vec::new(), rank.max(1))
    }

    pub fn nullable(inner: Type) -> Self {
        Self::structural(TypeKind::Nullable, vec![inner], 0)
    }

    pub fn by_ref(pointee: Type) -> Self {
        Self::structural(TypeKind::ByRef, vec![pointee], 0)
    }

    pub fn pointer(pointee: Type) -> Self {
        Self::structural(TypeKind::Pointer, vec![pointee], 0)
    }

    fn into_def(self) -> TypeDef {
        Arc::unwrap_or_clone(self.0)
    }

    pub fn with_origin(self, origin: &str) -> Self {
        let mut def = self.into_def();
        def.origin = non_empty(origin);
        Self::from_def(def)
    }

    /// Sets the base type. The root object type is never recorded as a base.
    pub fn with_base(self, base: Type) -> Self {
        let mut def = self.into_def();
        def.base = (base != Self::object()).then_some(base);
        Self::from_def(def)
    }

    /// Binds generic arguments of a named type.
    pub fn with_args(self, args: impl IntoIterator<Item = Type>) -> Self {
        let mut def = self.into_def();
        def.args = args.into_iter().collect();
        Self::from_def(def)
    }

    #[inline]
    pub fn kind(&self) -> TypeKind {
        self.0.kind
    }

    #[inline]
    pub fn namespace(&self) -> Option<&str> {
        self.0.namespace.as_deref()
    }

    /// The simple name. Empty for structural kinds.
    #[inline]
    pub fn name(&self) -> &str {
        &self.0.name
    }

    #[inline]
    pub fn origin(&self) -> Option<&str> {
        self.0.origin.as_deref()
    }

    #[inline]
    pub fn base(&self) -> Option<&Type> {
        self.0.base.as_ref()
    }

    /// Generic arguments of a named type, the underlying primitive of an
    /// enum, or the single inner type of a structural kind.
    #[inline]
    pub fn args(&self) -> &[Type] {
        &self.0.args
    }

    /// Inner type of arrays, nullables, references and pointers.
    #[inline]
    pub fn element(&self) -> Option<&Type> {
        match self.kind() {
            TypeKind::Array | TypeKind::Nullable | TypeKind::ByRef | TypeKind::Pointer => {
                self.0.args.first()
            }
            _ => None,
        }
    }

    #[inline]
    pub fn rank(&self) -> u8 {
        self.0.rank
    }

    #[inline]
    pub fn arity(&self) -> u8 {
        self.0.arity
    }

    /// A named type with bound arguments.
    #[inline]
    pub fn is_generic(&self) -> bool {
        matches!(
            self.kind(),
            TypeKind::Value | TypeKind::SealedRef | TypeKind::OpenRef | TypeKind::Interface
        ) && !self.0.args.is_empty()
    }

    #[inline]
    pub fn is_reference(&self) -> bool {
        self.kind().is_reference()
    }

    /// Slots of this type may hold instances of other types.
    #[inline]
    pub fn is_open(&self) -> bool {
        match self.kind() {
            TypeKind::OpenRef | TypeKind::Interface => true,
            TypeKind::Array => self.0.args.is_empty(),
            _ => false,
        }
    }

    pub fn as_prim(&self) -> Option<Prim> {
        if self.kind() != TypeKind::Value || !self.0.args.is_empty() {
            return None;
        }
        Prim::from_name(self.namespace(), self.name())
    }

    /// Underlying primitive of an enum.
    pub fn underlying(&self) -> Option<Prim> {
        match self.kind() {
            TypeKind::Enum => self.0.args.first().and_then(Type::as_prim),
            _ => None,
        }
    }

    /// Whether `self` is `ancestor` or derives from it.
    pub fn derives_from(&self, ancestor: &Type) -> bool {
        if *ancestor == Self::object() && self.is_reference() {
            return true;
        }
        let mut current = Some(self);
        while let Some(ty) = current {
            if ty == ancestor {
                return true;
            }
            current = ty.base();
        }
        false
    }

    /// `namespace::name` without generic arguments.
    pub fn path(&self) -> String {
        match self.namespace() {
            Some(namespace) => format!("{namespace}::{}", self.name()),
            None => self.name().to_owned(),
        }
    }

    #[inline]
    pub fn ptr_eq(&self, other: &Type) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, args: &[Type]) -> fmt::Result {
    for (index, arg) in args.iter().enumerate() {
        if index > 0 {
            f.write_str(", ")?;
        }
        fmt::Display::fmt(arg, f)?;
    }
    Ok(())
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let def = &*self.0;
        match def.kind {
            TypeKind::Array => {
                f.write_str("[")?;
                match def.args.first() {
                    Some(elem) => write!(f, "{elem}")?,
                    None => f.write_str("_")?,
                }
                match def.rank {
                    1 => f.write_str("]"),
                    rank => write!(f, "; rank {rank}]"),
                }
            }
            TypeKind::Nullable => {
                f.write_str("Option<")?;
                write_list(f, &def.args)?;
                f.write_str(">")
            }
            TypeKind::ByRef => {
                f.write_str("&")?;
                write_list(f, &def.args)
            }
            TypeKind::Pointer => {
                f.write_str("*")?;
                write_list(f, &def.args)
            }
            TypeKind::GenericDefinition => {
                f.write_str(&self.path())?;
                f.write_str("<")?;
                for index in 0..def.arity {
                    f.write_str(if index == 0 { "_" } else { ", _" })?;
                }
                f.write_str(">")
            }
            TypeKind::Enum => f.write_str(&self.path()),
            _ => {
                f.write_str(&self.path())?;
                if !def.args.is_empty() {
                    f.write_str("<")?;
                    write_list(f, &def.args)?;
                    f.write_str(">")?;
                }
                Ok(())
            }
        }
    }
}

impl fmt::Debug for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Type({self})")
    }
}

// -----------------------------------------------------------------------------
// Tests

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structural_equality() {
        let a = Type::list(Type::prim(Prim::I32));
        let b = Type::list(Type::prim(Prim::I32));
        assert_eq!(a, b);
        assert!(!a.ptr_eq(&b));
        assert_ne!(a, Type::list(Type::prim(Prim::I64)));

        let lib_a = Type::sealed("shapes", "Point").with_origin("lib_a");
        let lib_b = Type::sealed("shapes", "Point").with_origin("lib_b");
        assert_ne!(lib_a, lib_b);
    }

    #[test]
    fn display() {
        assert_eq!(Type::list(Type::prim(Prim::U8)).to_string(), "alloc::vec::Vec<core::u8>");
        assert_eq!(Type::array(Type::prim(Prim::F32), 2).to_string(), "[core::f32; rank 2]");
        assert_eq!(Type::open_array(1).to_string(), "[_]");
        assert_eq!(
            Type::nullable(Type::prim(Prim::I32)).to_string(),
            "Option<core::i32>"
        );
        assert_eq!(
            Type::generic_definition("alloc::vec", "Vec", 1).to_string(),
            "alloc::vec::Vec<_>"
        );
    }

    #[test]
    fn classification() {
        assert_eq!(Type::prim(Prim::I32).as_prim(), Some(Prim::I32));
        assert!(Type::prim(Prim::I32).ptr_eq(&Type::prim(Prim::I32)));
        assert_eq!(Type::value("geo", "i32").as_prim(), None);
        assert!(Type::object().is_open());
        assert!(Type::open_array(1).is_open());
        assert!(!Type::array(Type::object(), 1).is_open());
        assert!(Type::list(Type::object()).is_generic());
        assert_eq!(
            Type::enumeration("app", "Color", Prim::U8).underlying(),
            Some(Prim::U8)
        );
    }

    #[test]
    fn base_chain() {
        let animal = Type::open("zoo", "Animal");
        let dog = Type::open("zoo", "Dog").with_base(animal.clone());
        let puppy = Type::sealed("zoo", "Puppy").with_base(dog.clone());

        assert!(puppy.derives_from(&animal));
        assert!(puppy.derives_from(&Type::object()));
        assert!(!animal.derives_from(&dog));
        assert_eq!(Type::open("zoo", "Cat").with_base(Type::object()).base(), None);
    }
}
