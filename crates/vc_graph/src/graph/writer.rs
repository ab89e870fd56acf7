use alloc::sync::Arc;

use vc_utils::IndexTable;

use crate::GraphError;
use crate::descriptor::write_descriptor;
use crate::driver::{Driver, DriverQuery, Drivers, Semantics};
use crate::object::{Body, KnownObjects, ObjectRef, Type, Value};
use crate::options::CodecOptions;
use crate::wire::{Marker, PrimWriter, SENTINEL_MAGIC, SENTINEL_OFF, SENTINEL_ON, Sentinel};

/// A payload postponed to bound the writer's nesting.
struct Deferred {
    driver: Arc<dyn Driver>,
    value: Value,
}

// -----------------------------------------------------------------------------
// GraphWriter

/// Writes one object graph.
///
/// Drivers receive the writer in [`Driver::write`] and use it to write
/// their nested values: [`write_object`] for slots whose runtime type may
/// vary, [`write_typed`] for slots whose driver is already known, and
/// [`prim`] for raw primitives.
///
/// [`write_object`]: Self::write_object
/// [`write_typed`]: Self::write_typed
/// [`prim`]: Self::prim
pub struct GraphWriter<'a> {
    out: PrimWriter<'a>,
    drivers: Drivers<'a>,
    known: Option<&'a KnownObjects>,
    types: IndexTable<Type>,
    refs: IndexTable<usize>,
    // Tracked ids are keyed by address; holding the objects keeps the
    // addresses from being reused within the session.
    alive: Vec<ObjectRef>,
    depth: usize,
    threshold: usize,
    deferred: Vec<Deferred>,
    active: Vec<Arc<dyn Driver>>,
    sentinel: Option<Sentinel>,
}

impl<'a> GraphWriter<'a> {
    pub(crate) fn new(
        out: PrimWriter<'a>,
        drivers: Drivers<'a>,
        known: Option<&'a KnownObjects>,
        options: &CodecOptions,
    ) -> Self {
        Self {
            out,
            drivers,
            known,
            types: IndexTable::new(),
            refs: IndexTable::new(),
            alive: Vec::new(),
            depth: 0,
            threshold: options.deferral_threshold.max(1),
            deferred: Vec::new(),
            active: Vec::new(),
            sentinel: options.sentinel_period().map(Sentinel::new),
        }
    }

    /// Writes `root` and everything reachable from it, then drains the
    /// deferred payloads.
    pub(crate) fn write_graph(&mut self, root: &Value) -> Result<(), GraphError> {
        if let Some(sentinel) = &self.sentinel {
            let period = sentinel.period();
            self.out.write_u8(SENTINEL_ON)?;
            self.out.write_varint(u64::from(period))?;
        }

        self.write_object(root)?;
        self.drain()?;

        if self.sentinel.is_some() {
            self.out.write_u8(SENTINEL_OFF)?;
        }
        self.out.flush()
    }

    fn drain(&mut self) -> Result<(), GraphError> {
        let mut drained = 0_usize;
        while let Some(item) = self.deferred.pop() {
            self.enter(&item.driver, &item.value)?;
            drained += 1;
        }
        if drained > 0 {
            log::debug!("wrote {drained} deferred payloads");
        }
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Driver API

    #[inline]
    pub fn drivers(&self) -> Drivers<'a> {
        self.drivers
    }

    /// Raw primitive output.
    #[inline]
    pub fn prim(&mut self) -> &mut PrimWriter<'a> {
        &mut self.out
    }

    /// Payload nesting of the value being written. Zero at the root.
    #[inline]
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Number of reference ids handed out so far.
    #[inline]
    pub fn tracked(&self) -> usize {
        self.refs.len()
    }

    /// Writes `value` with its own type descriptor and the exact driver of
    /// its runtime type.
    pub fn write_object(&mut self, value: &Value) -> Result<(), GraphError> {
        self.checkpoint()?;
        if self.write_shared(value)? {
            return Ok(());
        }

        let ty = value.runtime_type().ok_or_else(|| {
            GraphError::custom(format_args!("cannot determine the type of {value:?}"))
        })?;
        let driver = self.drivers.resolve(&DriverQuery::exact(&ty))?;
        self.write_data(value, Some(&ty), &driver)
    }

    /// Writes `value` in a slot whose driver is known to both sides, so no
    /// descriptor is needed. Abstract drivers fall back to
    /// [`write_object`](Self::write_object).
    pub fn write_typed(&mut self, value: &Value, driver: &Arc<dyn Driver>) -> Result<(), GraphError> {
        if driver.is_abstract() {
            return self.write_object(value);
        }
        self.checkpoint()?;
        if self.write_shared(value)? {
            return Ok(());
        }
        self.write_data(value, None, driver)
    }

    /// Writes the descriptor of `ty`, without a marker.
    pub fn write_type(&mut self, ty: &Type) -> Result<(), GraphError> {
        write_descriptor(&mut self.types, &mut self.out, self.drivers, ty)
    }

    #[inline]
    pub fn write_interned(&mut self, value: &str) -> Result<(), GraphError> {
        self.out.write_interned(value)
    }

    // -------------------------------------------------------------------------
    // Markers

    /// Writes the values that need no payload: null, types, known objects and
    /// objects written before. Returns `false` if `value` is none of these.
    fn write_shared(&mut self, value: &Value) -> Result<bool, GraphError> {
        match value {
            Value::Null => {
                self.out.write_marker(Marker::Null)?;
            }
            Value::Type(ty) => {
                self.out.write_marker(Marker::TypeValue)?;
                self.write_type(ty)?;
            }
            Value::Object(object) => {
                if let Some(key) = self.known.and_then(|known| known.key_of(object)) {
                    self.out.write_marker(Marker::KnownObjectRef)?;
                    self.out.write_interned(key)?;
                } else if let Some(id) = self.refs.get(&object.addr()) {
                    self.out.write_marker(Marker::BackReference)?;
                    self.out.write_varint(u64::from(id))?;
                } else {
                    return Ok(false);
                }
            }
            _ => return Ok(false),
        }
        Ok(true)
    }

    fn write_data(
        &mut self,
        value: &Value,
        ty: Option<&Type>,
        driver: &Arc<dyn Driver>,
    ) -> Result<(), GraphError> {
        match (driver.semantics(), value) {
            (Semantics::Reference, Value::Object(object)) => {
                self.track(object);
                if matches!(*object.body(), Body::Empty) {
                    return self.write_head(Marker::EmptyObject, ty);
                }
                if self.depth >= self.threshold {
                    self.write_head(Marker::DeferredData, ty)?;
                    self.deferred.push(Deferred {
                        driver: driver.clone(),
                        value: value.clone(),
                    });
                    return Ok(());
                }
                self.write_head(Marker::ObjectData, ty)?;
            }
            (Semantics::Reference, _) => {
                // Readers track whatever comes with this marker.
                self.refs.reserve();
                self.write_head(Marker::ObjectData, ty)?;
            }
            (Semantics::Value, _) => {
                self.write_head(Marker::ValueData, ty)?;
            }
        }
        self.enter(driver, value)
    }

    fn write_head(&mut self, marker: Marker, ty: Option<&Type>) -> Result<(), GraphError> {
        self.out.write_marker(marker)?;
        match ty {
            Some(ty) => self.write_type(ty),
            None => Ok(()),
        }
    }

    fn track(&mut self, object: &ObjectRef) {
        let (_, fresh) = self.refs.get_or_insert(object.addr());
        if fresh {
            self.alive.push(object.clone());
        }
    }

    fn enter(&mut self, driver: &Arc<dyn Driver>, value: &Value) -> Result<(), GraphError> {
        self.depth += 1;
        self.active.push(driver.clone());
        let result = driver.write(self, value);
        self.active.pop();
        self.depth -= 1;
        result
    }

    fn checkpoint(&mut self) -> Result<(), GraphError> {
        let Some(count) = self.sentinel.as_mut().and_then(Sentinel::tick) else {
            return Ok(());
        };
        let tag = match self.active.last() {
            Some(driver) => driver.clone(),
            None => return self.write_checkpoint(count, "root"),
        };
        self.write_checkpoint(count, tag.name())
    }

    fn write_checkpoint(&mut self, count: u64, tag: &str) -> Result<(), GraphError> {
        self.out.write_u32(SENTINEL_MAGIC)?;
        self.out.write_varint(count)?;
        self.out.write_interned(tag)
    }
}
