use alloc::sync::Arc;

use super::Driver;

/// A named driver submitted at link time.
///
/// ```ignore
/// vc_graph::driver::inventory::submit! {
///     AutoDriver::new(|| Arc::new(LegacyPointDriver))
/// }
/// ```
///
/// [`DriverRegistryBuilder::auto_register`](super::DriverRegistryBuilder::auto_register)
/// registers every submitted driver by name.
pub struct AutoDriver {
    pub create: fn() -> Arc<dyn Driver>,
}

impl AutoDriver {
    pub const fn new(create: fn() -> Arc<dyn Driver>) -> Self {
        Self { create }
    }
}

inventory::collect!(AutoDriver);
