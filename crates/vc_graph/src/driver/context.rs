use alloc::sync::Arc;
use core::fmt;
use core::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use vc_utils::hash::{Entry, HashMap};

use super::{CacheKey, Driver};
use crate::GraphError;

/// Cache for drivers of the [`Context`](super::CacheTier::Context) tier.
///
/// A context can be reused by many sessions, one at a time. A session leases
/// it for its whole duration; a second session that tries to lease it
/// meanwhile fails with [`GraphError::ContextInUse`].
#[derive(Default)]
pub struct DriverContext {
    cache: Mutex<HashMap<CacheKey, Arc<dyn Driver>>>,
    leased: AtomicBool,
}

/// Exclusive use of a [`DriverContext`]. Released on drop.
pub struct ContextLease<'a> {
    context: &'a DriverContext,
}

impl Drop for ContextLease<'_> {
    fn drop(&mut self) {
        self.context.leased.store(false, Ordering::Release);
    }
}

impl DriverContext {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lease(&self) -> Result<ContextLease<'_>, GraphError> {
        self.leased
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .map_err(|_| GraphError::ContextInUse)?;
        Ok(ContextLease { context: self })
    }

    #[inline]
    pub fn is_leased(&self) -> bool {
        self.leased.load(Ordering::Acquire)
    }

    /// Number of cached drivers.
    pub fn len(&self) -> usize {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }

    pub(crate) fn get(&self, key: &CacheKey) -> Option<Arc<dyn Driver>> {
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    /// Caches `driver` unless another one got there first, and returns the
    /// cached driver.
    pub(crate) fn insert(&self, key: CacheKey, driver: Arc<dyn Driver>) -> Arc<dyn Driver> {
        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        match cache.entry(key) {
            Entry::Occupied(entry) => entry.get().clone(),
            Entry::Vacant(entry) => entry.insert(driver).clone(),
        }
    }
}

impl fmt::Debug for DriverContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DriverContext")
            .field("cached", &self.len())
            .field("leased", &self.is_leased())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lease_is_exclusive() {
        let context = DriverContext::new();
        let lease = context.lease().unwrap();
        assert!(matches!(context.lease(), Err(GraphError::ContextInUse)));
        drop(lease);
        assert!(!context.is_leased());
        assert!(context.lease().is_ok());
    }
}
