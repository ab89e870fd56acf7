use crate::object::Type;

/// A request for the driver of a type.
///
/// An exact query asks for the driver of a runtime type. A declared query
/// asks for the driver of a slot, which for open types is an abstract driver
/// that defers to the runtime type of each value.
#[derive(Debug, Clone, Copy)]
pub struct DriverQuery<'a> {
    ty: &'a Type,
    exact: bool,
}

impl<'a> DriverQuery<'a> {
    #[inline]
    pub fn exact(ty: &'a Type) -> Self {
        Self { ty, exact: true }
    }

    #[inline]
    pub fn declared(ty: &'a Type) -> Self {
        Self { ty, exact: false }
    }

    #[inline]
    pub fn ty(&self) -> &'a Type {
        self.ty
    }

    #[inline]
    pub fn is_exact(&self) -> bool {
        self.exact
    }

    pub(crate) fn key(&self) -> CacheKey {
        CacheKey {
            ty: self.ty.clone(),
            exact: self.exact,
        }
    }
}

/// Cache key of a resolved driver.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct CacheKey {
    ty: Type,
    exact: bool,
}
