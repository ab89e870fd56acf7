use alloc::sync::Arc;
use core::fmt;
use std::sync::{PoisonError, RwLock};

use vc_utils::hash::{Entry, HashMap};

use super::{CacheKey, CacheTier, Driver, DriverContext, DriverQuery};
use super::{DriverResolver, StandardResolver};
use crate::GraphError;
use crate::descriptor::RetargetHook;
use crate::object::{Type, TypeRegistry};

// -----------------------------------------------------------------------------
// DriverRegistry

/// Resolvers, named drivers, retarget hooks and local types, plus the
/// process-wide driver cache.
///
/// Built once through [`DriverRegistry::builder`] and shared behind an
/// [`Arc`]. Resolution is safe from any number of threads. When two threads
/// resolve the same uncached type at once, both run the resolvers and the
/// first insert wins, so every caller ends up with the same instance.
///
/// # Examples
///
/// ```
/// use vc_graph::driver::{DriverRegistry, same_driver};
/// use vc_graph::object::{Prim, Type};
///
/// let registry = DriverRegistry::builder().build();
/// let ty = Type::list(Type::prim(Prim::I32));
///
/// let a = registry.resolve(&ty).unwrap();
/// let b = registry.resolve(&ty).unwrap();
/// assert!(same_driver(&a, &b));
/// assert_eq!(a.name(), "alloc::vec::Vec");
/// ```
pub struct DriverRegistry {
    resolvers: Vec<Box<dyn DriverResolver>>,
    named: HashMap<Arc<str>, Arc<dyn Driver>>,
    hooks: Vec<Box<dyn RetargetHook>>,
    types: TypeRegistry,
    shared: RwLock<HashMap<CacheKey, Arc<dyn Driver>>>,
}

impl DriverRegistry {
    #[inline]
    pub fn builder() -> DriverRegistryBuilder {
        DriverRegistryBuilder::new()
    }

    /// Local types readers bind descriptors to.
    #[inline]
    pub fn types(&self) -> &TypeRegistry {
        &self.types
    }

    #[inline]
    pub fn hooks(&self) -> &[Box<dyn RetargetHook>] {
        &self.hooks
    }

    /// A resolution handle, optionally backed by a context cache.
    #[inline]
    pub fn drivers<'a>(&'a self, context: Option<&'a DriverContext>) -> Drivers<'a> {
        Drivers {
            registry: self,
            context,
        }
    }

    /// The exact driver of `ty`, without a context.
    pub fn resolve(&self, ty: &Type) -> Result<Arc<dyn Driver>, GraphError> {
        self.drivers(None).resolve(&DriverQuery::exact(ty))
    }

    /// Number of drivers in the shared cache.
    pub fn shared_len(&self) -> usize {
        self.shared.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    fn find(&self, query: &DriverQuery<'_>, context: Option<&DriverContext>) -> Option<Arc<dyn Driver>> {
        let key = query.key();

        if let Some(driver) = self
            .shared
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
        {
            return Some(driver.clone());
        }
        if let Some(driver) = context.and_then(|context| context.get(&key)) {
            return Some(driver);
        }

        let drivers = self.drivers(context);
        let driver = self
            .resolvers
            .iter()
            .find_map(|resolver| resolver.try_find_driver(query, &drivers))?;

        log::trace!("resolved `{}` to driver `{}`", query.ty(), driver.name());

        Some(match driver.cache_tier() {
            CacheTier::Shared => self.cache_shared(key, driver),
            CacheTier::Context => match context {
                Some(context) => context.insert(key, driver),
                None => driver,
            },
            CacheTier::Never => driver,
        })
    }

    fn cache_shared(&self, key: CacheKey, driver: Arc<dyn Driver>) -> Arc<dyn Driver> {
        let mut shared = self.shared.write().unwrap_or_else(PoisonError::into_inner);
        match shared.entry(key) {
            Entry::Occupied(entry) => {
                log::debug!(
                    "driver `{}` was resolved concurrently, keeping the cached instance",
                    driver.name()
                );
                entry.get().clone()
            }
            Entry::Vacant(entry) => entry.insert(driver).clone(),
        }
    }

    fn find_named(&self, name: &str, context: Option<&DriverContext>) -> Option<Arc<dyn Driver>> {
        if let Some(driver) = self.named.get(name) {
            return Some(driver.clone());
        }
        let drivers = self.drivers(context);
        self.resolvers
            .iter()
            .find_map(|resolver| resolver.try_find_named(name, &drivers))
    }
}

impl fmt::Debug for DriverRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DriverRegistry")
            .field("resolvers", &self.resolvers.len())
            .field("named", &self.named.len())
            .field("hooks", &self.hooks.len())
            .field("types", &self.types.len())
            .field("shared", &self.shared_len())
            .finish()
    }
}

// -----------------------------------------------------------------------------
// Drivers

/// Resolution handle handed to resolvers, hooks and drivers.
#[derive(Clone, Copy)]
pub struct Drivers<'a> {
    registry: &'a DriverRegistry,
    context: Option<&'a DriverContext>,
}

impl<'a> Drivers<'a> {
    #[inline]
    pub fn registry(&self) -> &'a DriverRegistry {
        self.registry
    }

    #[inline]
    pub fn context(&self) -> Option<&'a DriverContext> {
        self.context
    }

    #[inline]
    pub fn types(&self) -> &'a TypeRegistry {
        &self.registry.types
    }

    #[inline]
    pub fn find(&self, query: &DriverQuery<'_>) -> Option<Arc<dyn Driver>> {
        self.registry.find(query, self.context)
    }

    /// Like [`find`](Self::find), failing with [`GraphError::DriverNotFound`].
    pub fn resolve(&self, query: &DriverQuery<'_>) -> Result<Arc<dyn Driver>, GraphError> {
        self.find(query)
            .ok_or_else(|| GraphError::DriverNotFound(query.ty().to_string()))
    }

    #[inline]
    pub fn find_named(&self, name: &str) -> Option<Arc<dyn Driver>> {
        self.registry.find_named(name, self.context)
    }
}

// -----------------------------------------------------------------------------
// DriverRegistryBuilder

/// Collects the parts of a [`DriverRegistry`].
pub struct DriverRegistryBuilder {
    resolvers: Vec<Box<dyn DriverResolver>>,
    named: HashMap<Arc<str>, Arc<dyn Driver>>,
    hooks: Vec<Box<dyn RetargetHook>>,
    types: TypeRegistry,
    standard: bool,
}

impl Default for DriverRegistryBuilder {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl DriverRegistryBuilder {
    pub fn new() -> Self {
        Self {
            resolvers: Vec::new(),
            named: HashMap::default(),
            hooks: Vec::new(),
            types: TypeRegistry::new(),
            standard: true,
        }
    }

    /// Adds a resolver. Resolvers run in the order they were added, before
    /// the built-in one.
    pub fn resolver(mut self, resolver: impl DriverResolver) -> Self {
        self.resolvers.push(Box::new(resolver));
        self
    }

    /// Registers a driver for lookup by name.
    pub fn driver(mut self, driver: Arc<dyn Driver>) -> Self {
        self.insert_named(driver);
        self
    }

    /// Adds a retarget hook. Hooks run in the order they were added.
    pub fn hook(mut self, hook: impl RetargetHook) -> Self {
        self.hooks.push(Box::new(hook));
        self
    }

    /// Registers a local type readers may bind descriptors to.
    pub fn register_type(mut self, ty: Type) -> Self {
        self.types.register(ty);
        self
    }

    #[inline]
    pub fn types_mut(&mut self) -> &mut TypeRegistry {
        &mut self.types
    }

    /// Leaves out the built-in resolver.
    pub fn without_standard(mut self) -> Self {
        self.standard = false;
        self
    }

    /// Registers every driver submitted with [`AutoDriver`](super::AutoDriver).
    #[cfg(feature = "auto_register")]
    pub fn auto_register(mut self) -> Self {
        for item in inventory::iter::<super::AutoDriver> {
            self.insert_named((item.create)());
        }
        self
    }

    fn insert_named(&mut self, driver: Arc<dyn Driver>) {
        match self.named.entry(Arc::from(driver.name())) {
            Entry::Occupied(entry) => {
                log::warn!(
                    "named driver `{}` is already registered, keeping the first one",
                    entry.key()
                );
            }
            Entry::Vacant(entry) => {
                entry.insert(driver);
            }
        }
    }

    pub fn build(mut self) -> Arc<DriverRegistry> {
        if self.standard {
            self.resolvers.push(Box::new(StandardResolver));
        }
        Arc::new(DriverRegistry {
            resolvers: self.resolvers,
            named: self.named,
            hooks: self.hooks,
            types: self.types,
            shared: RwLock::new(HashMap::default()),
        })
    }
}

// -----------------------------------------------------------------------------
// Tests

#[cfg(test)]
mod tests {
    use core::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::driver::{Semantics, same_driver};
    use crate::graph::GraphWriter;
    use crate::object::{Prim, Value};

    struct TierDriver(CacheTier);

    impl Driver for TierDriver {
        fn name(&self) -> &str {
            "test::Tiered"
        }

        fn cache_tier(&self) -> CacheTier {
            self.0
        }

        fn semantics(&self) -> Semantics {
            Semantics::Value
        }

        fn write(&self, _: &mut GraphWriter<'_>, _: &Value) -> Result<(), GraphError> {
            Ok(())
        }
    }

    fn tiered(tier: CacheTier) -> Arc<DriverRegistry> {
        DriverRegistry::builder()
            .resolver(move |query: &DriverQuery<'_>, _: &Drivers<'_>| -> Option<Arc<dyn Driver>> {
                (query.ty().path() == "test::Tiered").then(|| Arc::new(TierDriver(tier)) as Arc<dyn Driver>)
            })
            .build()
    }

    #[test]
    fn shared_tier_is_cached_once() {
        let registry = tiered(CacheTier::Shared);
        let ty = Type::value("test", "Tiered");
        let a = registry.resolve(&ty).unwrap();
        let b = registry.resolve(&ty).unwrap();
        assert!(same_driver(&a, &b));
        assert_eq!(registry.shared_len(), 1);
    }

    #[test]
    fn context_tier_is_cached_per_context() {
        let registry = tiered(CacheTier::Context);
        let ty = Type::value("test", "Tiered");
        let query = DriverQuery::exact(&ty);
        let first = DriverContext::new();
        let second = DriverContext::new();

        let a = registry.drivers(Some(&first)).find(&query).unwrap();
        let b = registry.drivers(Some(&first)).find(&query).unwrap();
        let c = registry.drivers(Some(&second)).find(&query).unwrap();

        assert!(same_driver(&a, &b));
        assert!(!same_driver(&a, &c));
        assert_eq!(registry.shared_len(), 0);
        assert_eq!(first.len(), 1);
    }

    #[test]
    fn never_tier_is_fresh_and_poisons_composites() {
        let registry = tiered(CacheTier::Never);
        let ty = Type::value("test", "Tiered");
        assert!(!same_driver(&registry.resolve(&ty).unwrap(), &registry.resolve(&ty).unwrap()));

        let list = Type::list(ty);
        let a = registry.resolve(&list).unwrap();
        assert_eq!(a.cache_tier(), CacheTier::Never);
        assert!(!same_driver(&a, &registry.resolve(&list).unwrap()));

        let plain = Type::list(Type::prim(Prim::I32));
        assert!(same_driver(&registry.resolve(&plain).unwrap(), &registry.resolve(&plain).unwrap()));
    }

    #[test]
    fn resolvers_run_in_order() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let registry = DriverRegistry::builder()
            .resolver(move |_: &DriverQuery<'_>, _: &Drivers<'_>| -> Option<Arc<dyn Driver>> {
                counter.fetch_add(1, Ordering::Relaxed);
                None
            })
            .resolver(|query: &DriverQuery<'_>, _: &Drivers<'_>| -> Option<Arc<dyn Driver>> {
                (query.ty().as_prim() == Some(Prim::U8))
                    .then(|| Arc::new(TierDriver(CacheTier::Shared)) as Arc<dyn Driver>)
            })
            .build();

        let driver = registry.resolve(&Type::prim(Prim::U8)).unwrap();
        assert_eq!(driver.name(), "test::Tiered");
        registry.resolve(&Type::prim(Prim::U8)).unwrap();
        assert_eq!(calls.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn concurrent_resolution_converges() {
        let registry = DriverRegistry::builder().build();
        let ty = Type::list(Type::prim(Prim::String));

        let drivers: Vec<_> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| scope.spawn(|| registry.resolve(&ty).unwrap()))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        for driver in &drivers[1..] {
            assert!(same_driver(&drivers[0], driver));
        }
    }

    #[test]
    fn named_drivers() {
        let registry = DriverRegistry::builder()
            .driver(Arc::new(TierDriver(CacheTier::Shared)))
            .driver(Arc::new(TierDriver(CacheTier::Never)))
            .build();
        let drivers = registry.drivers(None);

        let named = drivers.find_named("test::Tiered").unwrap();
        assert_eq!(named.cache_tier(), CacheTier::Shared);
        assert!(drivers.find_named("test::Missing").is_none());
        assert!(matches!(
            registry.resolve(&Type::interface("test", "Shape")),
            Err(GraphError::DriverNotFound(_))
        ));
    }
}
