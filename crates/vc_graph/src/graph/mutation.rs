use vc_utils::hash::HashMap;

use crate::object::Value;
use crate::stream::Pass;

/// Values of reference objects that were read as values, by reference id.
///
/// Filled during the first pass. A non-empty log means the first pass had to
/// hand out placeholders for some of them, so the decode restarts and the
/// second pass substitutes the queued values from the start.
#[derive(Debug)]
pub(crate) struct MutationLog {
    pass: Pass,
    queued: HashMap<u32, Value>,
}

impl Default for MutationLog {
    fn default() -> Self {
        Self {
            pass: Pass::First,
            queued: HashMap::default(),
        }
    }
}

impl MutationLog {
    #[inline]
    pub fn pass(&self) -> Pass {
        self.pass
    }

    pub fn queue(&mut self, id: u32, value: Value) {
        debug_assert_eq!(self.pass, Pass::First, "conversions are queued in the first pass");
        self.queued.insert(id, value);
    }

    #[inline]
    pub fn queued(&self, id: u32) -> Option<&Value> {
        self.queued.get(&id)
    }

    /// Number of conversions seen in the first pass.
    #[inline]
    pub fn len(&self) -> usize {
        self.queued.len()
    }

    /// Whether the first pass must be repeated.
    #[inline]
    pub fn needs_restart(&self) -> bool {
        self.pass == Pass::First && !self.queued.is_empty()
    }

    pub fn begin_second_pass(&mut self) {
        self.pass = Pass::Second;
    }
}
