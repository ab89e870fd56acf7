use alloc::sync::Arc;

use super::builtin::{AbstractDriver, ArrayDriver, EnumDriver, ListDriver};
use super::builtin::{ObjectDriver, PrimitiveDriver, RecordDriver};
use super::{Driver, DriverExt, DriverQuery, Drivers};
use crate::object::{Type, TypeKind};

// -----------------------------------------------------------------------------
// DriverResolver

/// Produces drivers for types on demand.
///
/// Resolvers are asked in registration order; the first `Some` wins. A
/// resolver that builds composite drivers resolves the parts through
/// `drivers`, which goes through the caches again.
///
/// Closures of the right shape are resolvers.
pub trait DriverResolver: Send + Sync + 'static {
    fn try_find_driver(&self, query: &DriverQuery<'_>, drivers: &Drivers<'_>) -> Option<Arc<dyn Driver>>;

    /// Finds a driver by the name it writes into descriptors.
    fn try_find_named(&self, name: &str, drivers: &Drivers<'_>) -> Option<Arc<dyn Driver>> {
        let _ = (name, drivers);
        None
    }
}

impl<F> DriverResolver for F
where
    F: Fn(&DriverQuery<'_>, &Drivers<'_>) -> Option<Arc<dyn Driver>> + Send + Sync + 'static,
{
    #[inline]
    fn try_find_driver(&self, query: &DriverQuery<'_>, drivers: &Drivers<'_>) -> Option<Arc<dyn Driver>> {
        self(query, drivers)
    }
}

// -----------------------------------------------------------------------------
// StandardResolver

/// Resolves the built-in drivers. Always consulted last.
///
/// | type                         | driver                              |
/// |------------------------------|-------------------------------------|
/// | primitive                    | [`PrimitiveDriver`]                 |
/// | enum                         | [`EnumDriver`]                      |
/// | `Option<T>`                  | nullable driver of `T`              |
/// | `[T]`                        | [`ArrayDriver`]                     |
/// | `alloc::vec::Vec<T>`         | [`ListDriver`]                      |
/// | open type, declared          | [`AbstractDriver`]                  |
/// | reference type, exact        | [`ObjectDriver`]                    |
/// | value type                   | [`RecordDriver`]                    |
#[derive(Debug, Default, Clone, Copy)]
pub struct StandardResolver;

fn is_list(ty: &Type) -> bool {
    ty.namespace() == Some("alloc::vec") && ty.name() == "Vec" && ty.args().len() == 1
}

impl DriverResolver for StandardResolver {
    fn try_find_driver(&self, query: &DriverQuery<'_>, drivers: &Drivers<'_>) -> Option<Arc<dyn Driver>> {
        let ty = query.ty();
        if let Some(prim) = ty.as_prim() {
            return Some(Arc::new(PrimitiveDriver::new(prim)));
        }
        if ty.is_open() && !query.is_exact() {
            return Some(Arc::new(AbstractDriver));
        }

        match ty.kind() {
            TypeKind::Enum => EnumDriver::new(ty.clone()).map(|d| Arc::new(d) as Arc<dyn Driver>),
            TypeKind::Nullable => {
                let inner = drivers.find(&DriverQuery::declared(ty.element()?))?;
                Some(inner.nullable())
            }
            TypeKind::Array => {
                let elem = match ty.element() {
                    Some(elem) => drivers.find(&DriverQuery::declared(elem))?,
                    None => Arc::new(AbstractDriver),
                };
                Some(Arc::new(ArrayDriver::new(ty.clone(), elem)))
            }
            TypeKind::SealedRef | TypeKind::OpenRef if is_list(ty) => {
                let elem = drivers.find(&DriverQuery::declared(&ty.args()[0]))?;
                Some(Arc::new(ListDriver::new(ty.clone(), elem)))
            }
            TypeKind::SealedRef | TypeKind::OpenRef => Some(Arc::new(ObjectDriver::new(ty.clone()))),
            TypeKind::Value => Some(Arc::new(RecordDriver::new(ty.clone()))),
            TypeKind::Interface
            | TypeKind::GenericDefinition
            | TypeKind::ByRef
            | TypeKind::Pointer => None,
        }
    }
}
