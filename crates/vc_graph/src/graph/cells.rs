use vc_utils::hash::{HashMap, HashSet};

use crate::object::{Body, ObjectRef, Value};

// -----------------------------------------------------------------------------
// ValueCells

/// Stand-ins for converted values whose payload the writer deferred.
///
/// The parent of a deferred value is read before the value itself, so it
/// receives a placeholder object. Once the graph is drained every
/// placeholder is swapped for the value read in its place, wherever the
/// parent stored it.
#[derive(Default)]
pub(super) struct ValueCells {
    // Handed out in stream order. A cell's value can only hold cells handed
    // out after it.
    cells: Vec<(ObjectRef, u32)>,
}

impl ValueCells {
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Hands out the placeholder for reference id `id`.
    pub fn hand_out(&mut self, cell: ObjectRef, id: u32) -> Value {
        self.cells.push((cell.clone(), id));
        Value::Object(cell)
    }

    /// Builds the final value of every cell from `settled`, the value read
    /// for a reference id.
    pub fn resolve(&self, settled: impl Fn(u32) -> Option<Value>) -> CellValues {
        let mut values = HashMap::default();
        for (cell, id) in self.cells.iter().rev() {
            let Some(mut value) = settled(*id) else {
                continue;
            };
            patch_nested(&mut value, &values);
            values.insert(cell.addr(), value);
        }
        CellValues { values }
    }
}

/// Replaces cells nested in records. Objects are left to [`CellValues::apply`].
fn patch_nested(value: &mut Value, values: &HashMap<usize, Value>) {
    match value {
        Value::Object(object) => {
            if let Some(resolved) = values.get(&object.addr()) {
                *value = resolved.clone();
            }
        }
        Value::Record(record) => {
            for field in record.fields_mut().values_mut() {
                patch_nested(field, values);
            }
        }
        _ => {}
    }
}

// -----------------------------------------------------------------------------
// CellValues

pub(super) struct CellValues {
    values: HashMap<usize, Value>,
}

impl CellValues {
    /// Swaps every cell reachable from `roots` for its value, including cells
    /// stored in object bodies.
    pub fn apply<'v>(&self, roots: impl IntoIterator<Item = &'v mut Value>) {
        let mut pending = Vec::new();
        let mut seen = HashSet::default();
        for root in roots {
            self.patch(root, &mut pending, &mut seen);
        }

        // Objects are walked iteratively; reference chains can be long.
        while let Some(object) = pending.pop() {
            let mut body = object.body_mut();
            let items = match &mut *body {
                Body::Fields(fields) => {
                    for value in fields.values_mut() {
                        self.patch(value, &mut pending, &mut seen);
                    }
                    continue;
                }
                Body::Items(items) => items,
                Body::Grid { items, .. } => items,
                Body::Pending | Body::Empty => continue,
            };
            for value in items {
                self.patch(value, &mut pending, &mut seen);
            }
        }
    }

    fn patch(&self, value: &mut Value, pending: &mut Vec<ObjectRef>, seen: &mut HashSet<usize>) {
        if let Value::Object(object) = value
            && let Some(resolved) = self.values.get(&object.addr())
        {
            *value = resolved.clone();
        }

        match value {
            Value::Object(object) => {
                let addr = object.addr();
                if !self.values.contains_key(&addr) && seen.insert(addr) {
                    pending.push(object.clone());
                }
            }
            Value::Record(record) => {
                for field in record.fields_mut().values_mut() {
                    self.patch(field, pending, seen);
                }
            }
            _ => {}
        }
    }
}
