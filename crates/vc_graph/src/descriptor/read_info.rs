use alloc::rc::Rc;
use alloc::sync::Arc;
use core::cell::OnceCell;
use core::fmt;

use super::{KindTag, Retarget};
use crate::GraphError;
use crate::driver::{Driver, DriverQuery, Drivers};
use crate::object::{Prim, Type, TypeKind};

/// A cached resolution failure. Kept as text so it can be handed out again.
#[derive(Clone)]
enum Failure {
    TypeLoad(String),
    DriverNotFound(String),
    Other(String),
}

impl From<GraphError> for Failure {
    fn from(value: GraphError) -> Self {
        match value {
            GraphError::TypeLoad(name) => Failure::TypeLoad(name),
            GraphError::DriverNotFound(name) => Failure::DriverNotFound(name),
            other => Failure::Other(other.to_string()),
        }
    }
}

impl From<Failure> for GraphError {
    fn from(value: Failure) -> Self {
        match value {
            Failure::TypeLoad(name) => GraphError::TypeLoad(name),
            Failure::DriverNotFound(name) => GraphError::DriverNotFound(name),
            Failure::Other(message) => GraphError::Custom(message),
        }
    }
}

// -----------------------------------------------------------------------------
// TypeReadInfo

/// A type descriptor as read from a stream.
///
/// Carries the writer's view of the type: names, origin, the name and
/// version of the driver that wrote it, and nested descriptors. The local
/// type and driver are resolved on first use and cached, failures included.
/// [`RetargetHook`](super::RetargetHook)s run once, before either is resolved.
pub struct TypeReadInfo {
    pub(super) index: u32,
    pub(super) tag: KindTag,
    pub(super) namespace: Option<Arc<str>>,
    pub(super) name: Arc<str>,
    pub(super) origin: Option<Arc<str>>,
    pub(super) driver_name: Option<Arc<str>>,
    pub(super) version: i32,
    pub(super) base: Option<Rc<TypeReadInfo>>,
    pub(super) sub_types: Vec<Rc<TypeReadInfo>>,
    pub(super) rank: u8,
    pub(super) arity: u8,
    retarget: OnceCell<Retarget>,
    target: OnceCell<Result<Type, Failure>>,
    driver: OnceCell<Result<Arc<dyn Driver>, Failure>>,
}

impl TypeReadInfo {
    pub(super) fn new(index: u32, tag: KindTag) -> Self {
        Self {
            index,
            tag,
            namespace: None,
            name: Arc::from(""),
            origin: None,
            driver_name: None,
            version: crate::driver::NO_VERSION,
            base: None,
            sub_types: Vec::new(),
            rank: 0,
            arity: 0,
            retarget: OnceCell::new(),
            target: OnceCell::new(),
            driver: OnceCell::new(),
        }
    }

    /// Session index of the descriptor.
    #[inline]
    pub fn index(&self) -> u32 {
        self.index
    }

    #[inline]
    pub fn tag(&self) -> KindTag {
        self.tag
    }

    #[inline]
    pub fn kind(&self) -> TypeKind {
        self.tag.kind()
    }

    #[inline]
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    /// Simple name. Empty for structural kinds.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn origin(&self) -> Option<&str> {
        self.origin.as_deref()
    }

    /// `namespace::name` as written, without generic arguments.
    pub fn path(&self) -> String {
        match self.namespace() {
            Some(namespace) => format!("{namespace}::{}", self.name),
            None => self.name.to_string(),
        }
    }

    /// Name of the driver that wrote the payload, if the writer had one.
    #[inline]
    pub fn driver_name(&self) -> Option<&str> {
        self.driver_name.as_deref()
    }

    /// Version of the writing driver, [`NO_VERSION`](crate::driver::NO_VERSION)
    /// if it had none.
    #[inline]
    pub fn version(&self) -> i32 {
        self.version
    }

    #[inline]
    pub fn base(&self) -> Option<&Rc<TypeReadInfo>> {
        self.base.as_ref()
    }

    /// Generic arguments, the element of an array, the inner type of a
    /// nullable or pointer, or the underlying primitive of an enum.
    #[inline]
    pub fn sub_types(&self) -> &[Rc<TypeReadInfo>] {
        &self.sub_types
    }

    #[inline]
    pub fn element(&self) -> Option<&Rc<TypeReadInfo>> {
        self.sub_types.first()
    }

    #[inline]
    pub fn rank(&self) -> u8 {
        self.rank
    }

    #[inline]
    pub fn arity(&self) -> u8 {
        self.arity
    }

    #[inline]
    pub fn is_generic(&self) -> bool {
        self.tag.is_generic()
    }

    /// Values of this type are written with their own descriptor, because the
    /// declared type does not pin down the runtime type.
    #[inline]
    pub fn is_open(&self) -> bool {
        matches!(
            self.tag,
            KindTag::OpenRef
                | KindTag::Interface
                | KindTag::GenericOpenRef
                | KindTag::GenericInterface
                | KindTag::OpenArray
        )
    }

    /// The primitive this descriptor names, judged by the writer's names.
    pub fn wire_prim(&self) -> Option<Prim> {
        match self.tag {
            KindTag::Value => Prim::from_name(self.namespace(), &self.name),
            _ => None,
        }
    }

    /// The underlying primitive of an enum descriptor.
    pub fn underlying(&self) -> Option<Prim> {
        match self.tag {
            KindTag::Enum => self.element().and_then(|info| info.wire_prim()),
            _ => None,
        }
    }

    /// The inner descriptor of a nullable, or `self`.
    pub fn non_nullable(&self) -> &TypeReadInfo {
        match (self.tag, self.sub_types.first()) {
            (KindTag::Nullable, Some(inner)) => inner,
            _ => self,
        }
    }

    /// Runs the retarget hooks of the registry once and returns the outcome.
    pub fn retarget(&self, drivers: Drivers<'_>) -> &Retarget {
        self.retarget.get_or_init(|| {
            let mut retarget = Retarget::default();
            for hook in drivers.registry().hooks() {
                hook.retarget(self, &mut retarget);
            }
            if !retarget.is_empty() {
                log::debug!("retargeted `{self}`: {retarget:?}");
            }
            retarget
        })
    }

    /// The local type this descriptor binds to.
    ///
    /// Fails with [`GraphError::TypeLoad`] if no registered type matches and
    /// no hook provided one.
    pub fn target_type(&self, drivers: Drivers<'_>) -> Result<Type, GraphError> {
        self.target
            .get_or_init(|| self.resolve_type(drivers).map_err(Failure::from))
            .clone()
            .map_err(GraphError::from)
    }

    /// The local driver for this descriptor.
    ///
    /// A driver set by a hook wins, then a driver name set by a hook, then
    /// the exact driver of [`target_type`](Self::target_type).
    pub fn driver(&self, drivers: Drivers<'_>) -> Result<Arc<dyn Driver>, GraphError> {
        self.driver
            .get_or_init(|| self.resolve_driver(drivers).map_err(Failure::from))
            .clone()
            .map_err(GraphError::from)
    }

    fn sub_type(&self, index: usize, drivers: Drivers<'_>) -> Result<Type, GraphError> {
        match self.sub_types.get(index) {
            Some(info) => info.target_type(drivers),
            None => Err(GraphError::invalid_data(format!(
                "descriptor `{self}` lacks its inner type"
            ))),
        }
    }

    fn resolve_type(&self, drivers: Drivers<'_>) -> Result<Type, GraphError> {
        if let Some(ty) = self.retarget(drivers).target_type() {
            return Ok(ty.clone());
        }

        let types = drivers.registry().types();
        let found = match self.tag {
            KindTag::Nullable => Some(Type::nullable(self.sub_type(0, drivers)?)),
            KindTag::ByRef => Some(Type::by_ref(self.sub_type(0, drivers)?)),
            KindTag::Pointer => Some(Type::pointer(self.sub_type(0, drivers)?)),
            KindTag::Array => Some(Type::array(self.sub_type(0, drivers)?, self.rank)),
            KindTag::OpenArray => Some(Type::open_array(self.rank)),
            KindTag::GenericDefinition => {
                types.generic_definition(self.namespace(), &self.name, self.origin())
            }
            tag if tag.is_generic() => {
                let args = self
                    .sub_types
                    .iter()
                    .map(|info| info.target_type(drivers))
                    .collect::<Result<Vec<_>, _>>()?;
                types.instantiate(self.namespace(), &self.name, self.origin(), args)
            }
            _ => types.lookup(self.namespace(), &self.name, self.origin()),
        };

        found.ok_or_else(|| GraphError::TypeLoad(self.to_string()))
    }

    fn resolve_driver(&self, drivers: Drivers<'_>) -> Result<Arc<dyn Driver>, GraphError> {
        let retarget = self.retarget(drivers);
        if let Some(driver) = retarget.driver() {
            return Ok(driver.clone());
        }
        if let Some(name) = retarget.driver_name() {
            return drivers
                .find_named(name)
                .ok_or_else(|| GraphError::DriverNotFound(name.to_owned()));
        }

        let ty = self.target_type(drivers)?;
        drivers.resolve(&DriverQuery::exact(&ty))
    }
}

impl fmt::Display for TypeReadInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = |f: &mut fmt::Formatter<'_>| match self.sub_types.first() {
            Some(inner) => write!(f, "{inner}"),
            None => f.write_str("_"),
        };
        match self.tag {
            KindTag::Nullable => {
                f.write_str("Option<")?;
                inner(f)?;
                f.write_str(">")
            }
            KindTag::ByRef => {
                f.write_str("&")?;
                inner(f)
            }
            KindTag::Pointer => {
                f.write_str("*")?;
                inner(f)
            }
            KindTag::Array | KindTag::OpenArray => {
                f.write_str("[")?;
                inner(f)?;
                match self.rank {
                    1 => f.write_str("]"),
                    rank => write!(f, "; rank {rank}]"),
                }
            }
            KindTag::GenericDefinition => {
                f.write_str(&self.path())?;
                f.write_str("<")?;
                for index in 0..self.arity {
                    f.write_str(if index == 0 { "_" } else { ", _" })?;
                }
                f.write_str(">")
            }
            tag => {
                f.write_str(&self.path())?;
                if tag.is_generic() {
                    f.write_str("<")?;
                    for (index, arg) in self.sub_types.iter().enumerate() {
                        if index > 0 {
                            f.write_str(", ")?;
                        }
                        write!(f, "{arg}")?;
                    }
                    f.write_str(">")?;
                }
                Ok(())
            }
        }
    }
}

impl fmt::Debug for TypeReadInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeReadInfo")
            .field("index", &self.index)
            .field("type", &format_args!("{self}"))
            .field("origin", &self.origin)
            .field("driver", &self.driver_name)
            .field("version", &self.version)
            .finish()
    }
}
