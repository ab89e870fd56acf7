use alloc::rc::Rc;
use alloc::sync::Arc;

use super::MutationLog;
use super::cells::ValueCells;
use super::trail::TypeTrail;
use crate::GraphError;
use crate::descriptor::{DescriptorTable, TypeReadInfo};
use crate::driver::{Driver, Drivers, Semantics};
use crate::object::{KnownObjects, ObjectRef, Record, Type, Value};
use crate::stream::Pass;
use crate::wire::{Marker, PrimReader, SENTINEL_MAGIC, SENTINEL_OFF, SENTINEL_ON, Sentinel};

/// Work to run once the whole graph is read.
pub type Fixup = Box<dyn FnOnce() -> Result<(), GraphError>>;

/// What a reference id stands for.
enum Slot {
    Object(ObjectRef),
    /// A reference object read as a value. `None` until the value is known.
    Converted(Option<Value>),
}

enum Target {
    Fill(ObjectRef),
    Convert(u32),
}

/// A payload the writer postponed.
struct Deferred {
    driver: Arc<dyn Driver>,
    info: Rc<TypeReadInfo>,
    target: Target,
}

fn mutation_conflict(driver: &Arc<dyn Driver>, info: &TypeReadInfo) -> GraphError {
    GraphError::MutationConflict(format!(
        "driver `{}` cannot read the reference data of `{info}`",
        driver.name()
    ))
}

// -----------------------------------------------------------------------------
// GraphReader

/// Reads one object graph.
///
/// The counterpart of [`GraphWriter`](super::GraphWriter): drivers read
/// nested values with [`read_object`](Self::read_object) and
/// [`read_typed`](Self::read_typed) in the order they were written.
pub struct GraphReader<'a> {
    input: PrimReader<'a>,
    drivers: Drivers<'a>,
    known: Option<&'a KnownObjects>,
    types: DescriptorTable,
    slots: Vec<Slot>,
    depth: usize,
    max_depth: usize,
    deferred: Vec<Deferred>,
    cells: ValueCells,
    mutations: &'a mut MutationLog,
    fixups: Vec<Fixup>,
    values: usize,
    sentinel: Option<Sentinel>,
    last_tag: Option<Arc<str>>,
    trail: TypeTrail,
}

impl<'a> GraphReader<'a> {
    pub(crate) fn new(
        input: PrimReader<'a>,
        drivers: Drivers<'a>,
        known: Option<&'a KnownObjects>,
        max_depth: usize,
        mutations: &'a mut MutationLog,
    ) -> Self {
        Self {
            input,
            drivers,
            known,
            types: DescriptorTable::default(),
            slots: Vec::new(),
            depth: 0,
            max_depth,
            deferred: Vec::new(),
            cells: ValueCells::default(),
            mutations,
            fixups: Vec::new(),
            values: 0,
            sentinel: None,
            last_tag: None,
            trail: TypeTrail::default(),
        }
    }

    /// Reads the root value and drains the deferred payloads.
    pub(crate) fn read_graph(&mut self) -> Result<Value, GraphError> {
        self.read_graph_inner()
            .map_err(|err| err.locate(self.values, || self.trail.render()))
    }

    fn read_graph_inner(&mut self) -> Result<Value, GraphError> {
        if self.input.peek_u8()? == SENTINEL_ON {
            self.input.consume_peeked();
            let period = u32::try_from(self.input.read_varint()?)
                .ok()
                .filter(|period| *period > 0)
                .ok_or_else(|| GraphError::invalid_data("invalid sentinel period"))?;
            self.sentinel = Some(Sentinel::new(period));
        }

        let mut root = self.read_object()?;
        self.drain()?;

        if self.sentinel.is_some() && self.input.read_u8()? != SENTINEL_OFF {
            return Err(GraphError::invalid_data("missing sentinel end marker"));
        }
        self.resolve_cells(&mut root);
        Ok(root)
    }

    /// Puts the values of deferred conversions where their placeholders went,
    /// in the graph and in the converted values themselves.
    fn resolve_cells(&mut self, root: &mut Value) {
        if self.cells.is_empty() {
            return;
        }
        let slots = &self.slots;
        let values = self.cells.resolve(|id| match slots.get(id as usize) {
            Some(Slot::Converted(Some(value))) => Some(value.clone()),
            _ => None,
        });

        let converted = self.slots.iter_mut().filter_map(|slot| match slot {
            Slot::Converted(Some(value)) => Some(value),
            _ => None,
        });
        values.apply(core::iter::once(root).chain(converted));

        // The second pass starts from the complete values.
        if self.mutations.pass() == Pass::First {
            for (id, slot) in self.slots.iter().enumerate() {
                if let Slot::Converted(Some(value)) = slot
                    && let Ok(id) = u32::try_from(id)
                    && self.mutations.queued(id).is_some()
                {
                    self.mutations.queue(id, value.clone());
                }
            }
        }
    }

    /// Whether the decode must be repeated before the result can be used.
    #[inline]
    pub(crate) fn needs_restart(&self) -> bool {
        self.mutations.needs_restart()
    }

    /// Runs the fixups registered during the read, in registration order.
    pub(crate) fn run_fixups(&mut self) -> Result<(), GraphError> {
        for fixup in core::mem::take(&mut self.fixups) {
            fixup()?;
        }
        Ok(())
    }

    fn drain(&mut self) -> Result<(), GraphError> {
        let mut drained = 0_usize;
        while let Some(item) = self.deferred.pop() {
            let Deferred { driver, info, target } = item;
            match target {
                Target::Fill(object) => {
                    self.enter(&info, |reader| driver.fill(reader, &info, &object))?;
                }
                Target::Convert(id) => {
                    let value = self.enter(&info, |reader| driver.read(reader, &info))?;
                    self.settle(id, value);
                }
            }
            drained += 1;
        }
        if drained > 0 {
            log::debug!("read {drained} deferred payloads");
        }
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Driver API

    #[inline]
    pub fn drivers(&self) -> Drivers<'a> {
        self.drivers
    }

    /// Raw primitive input.
    #[inline]
    pub fn prim(&mut self) -> &mut PrimReader<'a> {
        &mut self.input
    }

    #[inline]
    pub fn pass(&self) -> Pass {
        self.mutations.pass()
    }

    /// Number of values read so far.
    #[inline]
    pub fn object_count(&self) -> usize {
        self.values
    }

    /// The local type `info` binds to.
    #[inline]
    pub fn target_type(&self, info: &TypeReadInfo) -> Result<Type, GraphError> {
        info.target_type(self.drivers)
    }

    /// Registers work to run after the whole graph is read, when every
    /// deferred object is filled.
    ///
    /// Fixups only run after the final pass. A failing fixup fails the decode.
    pub fn add_fixup(&mut self, fixup: impl FnOnce() -> Result<(), GraphError> + 'static) {
        self.fixups.push(Box::new(fixup));
    }

    /// Reads a value written with
    /// [`GraphWriter::write_object`](super::GraphWriter::write_object).
    pub fn read_object(&mut self) -> Result<Value, GraphError> {
        self.checkpoint()?;
        let marker = self.input.read_marker()?;
        if let Some(value) = self.read_shared(marker)? {
            return Ok(value);
        }
        let info = self.types.read(&mut self.input)?;
        self.read_data(marker, &info)
    }

    /// Reads a value written with
    /// [`GraphWriter::write_typed`](super::GraphWriter::write_typed) in a
    /// slot described by `info`.
    pub fn read_typed(&mut self, info: &Rc<TypeReadInfo>) -> Result<Value, GraphError> {
        if info.non_nullable().is_open() {
            return self.read_object();
        }
        self.checkpoint()?;
        let marker = self.input.read_marker()?;
        if let Some(value) = self.read_shared(marker)? {
            return Ok(value);
        }
        self.read_data(marker, info)
    }

    /// Reads a descriptor written with
    /// [`GraphWriter::write_type`](super::GraphWriter::write_type).
    pub fn read_type(&mut self) -> Result<Type, GraphError> {
        let info = self.types.read(&mut self.input)?;
        self.target_type(&info)
    }

    #[inline]
    pub fn read_interned(&mut self) -> Result<Arc<str>, GraphError> {
        self.input.read_interned()
    }

    // -------------------------------------------------------------------------
    // Markers

    fn read_shared(&mut self, marker: Marker) -> Result<Option<Value>, GraphError> {
        self.values += 1;
        let value = match marker {
            Marker::Null => Value::Null,
            Marker::TypeValue => Value::Type(self.read_type()?),
            Marker::BackReference => {
                let id = self.input.read_index()?;
                self.back_reference(id)?
            }
            Marker::KnownObjectRef => {
                let key = self.input.read_interned()?;
                match self.known.and_then(|known| known.get(&key)) {
                    Some(object) => Value::Object(object.clone()),
                    None => {
                        return Err(GraphError::invalid_data(format!(
                            "unknown known object `{key}`"
                        )));
                    }
                }
            }
            Marker::ObjectData | Marker::ValueData | Marker::DeferredData | Marker::EmptyObject => {
                return Ok(None);
            }
        };
        Ok(Some(value))
    }

    fn back_reference(&self, id: u32) -> Result<Value, GraphError> {
        match self.slots.get(id as usize) {
            Some(Slot::Object(object)) => Ok(Value::Object(object.clone())),
            Some(Slot::Converted(Some(value))) => Ok(value.clone()),
            // Only the first pass gets here. It is repeated.
            Some(Slot::Converted(None)) => Ok(Value::Null),
            None => Err(GraphError::invalid_data(format!(
                "back-reference to unknown object {id}, {} objects are tracked",
                self.slots.len()
            ))),
        }
    }

    fn read_data(&mut self, marker: Marker, info: &Rc<TypeReadInfo>) -> Result<Value, GraphError> {
        let driver = info.driver(self.drivers)?;

        match (marker, driver.semantics()) {
            (Marker::ValueData, Semantics::Value) => self.enter(info, |reader| driver.read(reader, info)),
            (Marker::ValueData, Semantics::Reference) => {
                // Value data read by a reference driver: a fresh, untracked object.
                let object = driver.create(self, info)?;
                self.enter(info, |reader| driver.fill(reader, info, &object))?;
                Ok(Value::Object(object))
            }
            (Marker::EmptyObject, Semantics::Reference) => {
                let object = ObjectRef::empty(self.target_type(info)?);
                self.slots.push(Slot::Object(object.clone()));
                Ok(Value::Object(object))
            }
            (Marker::EmptyObject, Semantics::Value) => {
                let value = Value::Record(Record::new(self.target_type(info)?));
                self.slots.push(Slot::Converted(Some(value.clone())));
                Ok(value)
            }
            (Marker::ObjectData, Semantics::Reference) => {
                let object = driver.create(self, info)?;
                self.slots.push(Slot::Object(object.clone()));
                self.enter(info, |reader| driver.fill(reader, info, &object))?;
                Ok(Value::Object(object))
            }
            (Marker::DeferredData, Semantics::Reference) => {
                let object = driver.create(self, info)?;
                self.slots.push(Slot::Object(object.clone()));
                self.deferred.push(Deferred {
                    driver,
                    info: info.clone(),
                    target: Target::Fill(object.clone()),
                });
                Ok(Value::Object(object))
            }
            (Marker::ObjectData | Marker::DeferredData, Semantics::Value) => {
                if !driver.reference_fallback() {
                    return Err(mutation_conflict(&driver, info));
                }
                self.read_converted(marker, driver, info)
            }
            (marker, _) => Err(GraphError::invalid_data(format!(
                "unexpected {marker:?} marker for `{info}`"
            ))),
        }
    }

    /// Reads reference data with a value driver.
    ///
    /// The first pass queues every such value in the mutation log and hands
    /// out null to back-references that arrive before the value is known. The
    /// second pass starts with every queued value in place. A deferred payload
    /// hands its parent a cell that is swapped for the value after the drain.
    fn read_converted(
        &mut self,
        marker: Marker,
        driver: Arc<dyn Driver>,
        info: &Rc<TypeReadInfo>,
    ) -> Result<Value, GraphError> {
        let id = u32::try_from(self.slots.len())
            .map_err(|_| GraphError::invalid_data("too many tracked objects"))?;

        let known = match self.mutations.pass() {
            Pass::First => None,
            Pass::Second => match self.mutations.queued(id) {
                Some(value) => Some(value.clone()),
                None => {
                    return Err(GraphError::Restart(format!(
                        "object {id} of `{info}` was converted to a value only in the second pass"
                    )));
                }
            },
        };
        self.slots.push(Slot::Converted(known));

        if marker == Marker::DeferredData {
            let cell = ObjectRef::placeholder(self.target_type(info)?);
            self.deferred.push(Deferred {
                driver,
                info: info.clone(),
                target: Target::Convert(id),
            });
            return Ok(self.cells.hand_out(cell, id));
        }

        let value = self.enter(info, |reader| driver.read(reader, info))?;
        self.settle(id, value.clone());
        Ok(value)
    }

    fn settle(&mut self, id: u32, value: Value) {
        if self.mutations.pass() == Pass::First {
            self.mutations.queue(id, value.clone());
        }
        if let Some(slot) = self.slots.get_mut(id as usize) {
            *slot = Slot::Converted(Some(value));
        }
    }

    fn enter<T>(
        &mut self,
        info: &TypeReadInfo,
        read: impl FnOnce(&mut Self) -> Result<T, GraphError>,
    ) -> Result<T, GraphError> {
        if self.depth >= self.max_depth {
            return Err(GraphError::invalid_data(format!(
                "payloads nested deeper than {} levels",
                self.max_depth
            ))
            .locate(self.values, || self.trail.render()));
        }
        self.depth += 1;
        self.trail.push(|| info.to_string());

        let result = read(self).map_err(|err| err.locate(self.values, || self.trail.render()));

        self.trail.pop();
        self.depth -= 1;
        result
    }

    fn checkpoint(&mut self) -> Result<(), GraphError> {
        let Some(count) = self.sentinel.as_mut().and_then(Sentinel::tick) else {
            return Ok(());
        };
        let after = match &self.last_tag {
            Some(tag) => format!("checkpoint in `{tag}`"),
            None => "the start of the graph".to_owned(),
        };
        if self.input.read_u32()? != SENTINEL_MAGIC {
            return Err(GraphError::invalid_data(format!(
                "sentinel {count} not found, the stream is out of sync since {after}"
            )));
        }
        let counter = self.input.read_varint()?;
        if counter != count {
            return Err(GraphError::invalid_data(format!(
                "sentinel {counter} found where {count} was expected, the stream is out of sync since {after}"
            )));
        }
        self.last_tag = Some(self.input.read_interned()?);
        Ok(())
    }
}
