use alloc::sync::Arc;
use core::fmt;

use super::TypeReadInfo;
use crate::driver::Driver;
use crate::object::Type;

// -----------------------------------------------------------------------------
// Retarget

/// Overrides a hook may apply to a descriptor before it is resolved.
///
/// Every hook sees the overrides of the hooks before it.
#[derive(Clone, Default)]
pub struct Retarget {
    ty: Option<Type>,
    driver_name: Option<Arc<str>>,
    driver: Option<Arc<dyn Driver>>,
}

impl Retarget {
    /// Binds the descriptor to `ty` instead of the type it names.
    #[inline]
    pub fn set_type(&mut self, ty: Type) {
        self.ty = Some(ty);
    }

    /// Reads the payload with the registered named driver `name`.
    #[inline]
    pub fn set_driver_name(&mut self, name: &str) {
        self.driver_name = Some(Arc::from(name));
    }

    /// Reads the payload with `driver`.
    #[inline]
    pub fn set_driver(&mut self, driver: Arc<dyn Driver>) {
        self.driver = Some(driver);
    }

    #[inline]
    pub fn target_type(&self) -> Option<&Type> {
        self.ty.as_ref()
    }

    #[inline]
    pub fn driver_name(&self) -> Option<&str> {
        self.driver_name.as_deref()
    }

    #[inline]
    pub fn driver(&self) -> Option<&Arc<dyn Driver>> {
        self.driver.as_ref()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ty.is_none() && self.driver_name.is_none() && self.driver.is_none()
    }
}

impl fmt::Debug for Retarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Retarget")
            .field("ty", &self.ty)
            .field("driver_name", &self.driver_name)
            .field("driver", &self.driver.as_ref().map(|driver| driver.name()))
            .finish()
    }
}

// -----------------------------------------------------------------------------
// RetargetHook

/// Redirects descriptors to other local types or drivers.
///
/// Hooks are how a reader copes with schema changes: a renamed or moved
/// type, a list that became an array, a value type that became a reference
/// type, or an enum whose members were renumbered.
///
/// Closures of the right shape are hooks:
///
/// ```
/// use vc_graph::{DriverRegistry, Retarget, TypeReadInfo};
/// use vc_graph::object::{Prim, Type};
///
/// let registry = DriverRegistry::builder()
///     .hook(|info: &TypeReadInfo, retarget: &mut Retarget| {
///         if info.path() == "alloc::vec::Vec" {
///             retarget.set_type(Type::array(Type::prim(Prim::I32), 1));
///         }
///     })
///     .build();
/// # drop(registry);
/// ```
pub trait RetargetHook: Send + Sync + 'static {
    fn retarget(&self, info: &TypeReadInfo, retarget: &mut Retarget);
}

impl<F> RetargetHook for F
where
    F: Fn(&TypeReadInfo, &mut Retarget) + Send + Sync + 'static,
{
    #[inline]
    fn retarget(&self, info: &TypeReadInfo, retarget: &mut Retarget) {
        self(info, retarget);
    }
}

// -----------------------------------------------------------------------------
// TypeRename

/// Binds descriptors of a renamed or moved type to its new local type.
///
/// Matches non-generic descriptors by path. When an origin is set, only
/// descriptors from that origin match.
#[derive(Debug, Clone)]
pub struct TypeRename {
    from: String,
    origin: Option<String>,
    to: Type,
}

impl TypeRename {
    pub fn new(from: impl Into<String>, to: Type) -> Self {
        Self {
            from: from.into(),
            origin: None,
            to,
        }
    }

    pub fn from_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }
}

impl RetargetHook for TypeRename {
    fn retarget(&self, info: &TypeReadInfo, retarget: &mut Retarget) {
        if info.path() != self.from {
            return;
        }
        if let Some(origin) = &self.origin
            && info.origin() != Some(origin.as_str())
        {
            return;
        }
        if info.is_generic() {
            return;
        }
        retarget.set_type(self.to.clone());
    }
}
