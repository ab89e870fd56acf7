use alloc::sync::Arc;

use vc_utils::hash::HashMap;

use super::ObjectRef;
use crate::RegisterError;

/// Objects both peers hold before a session starts, addressed by key.
///
/// A graph that reaches a known object writes its key instead of its state,
/// and the reader substitutes its own instance registered under that key.
#[derive(Default)]
pub struct KnownObjects {
    by_key: HashMap<Arc<str>, ObjectRef>,
    by_addr: HashMap<usize, Arc<str>>,
}

impl KnownObjects {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `object` under `key`.
    ///
    /// Registering the same pair twice is a no-op. A key or an object can
    /// only be bound once.
    pub fn register(&mut self, key: &str, object: &ObjectRef) -> Result<(), RegisterError> {
        if let Some(existing) = self.by_addr.get(&object.addr()) {
            if &**existing == key {
                return Ok(());
            }
            return Err(RegisterError::ObjectTaken {
                key: key.to_owned(),
                existing: existing.to_string(),
            });
        }
        if self.by_key.contains_key(key) {
            return Err(RegisterError::KeyTaken(key.to_owned()));
        }

        let key: Arc<str> = Arc::from(key);
        self.by_addr.insert(object.addr(), key.clone());
        self.by_key.insert(key, object.clone());
        Ok(())
    }

    #[inline]
    pub fn get(&self, key: &str) -> Option<&ObjectRef> {
        self.by_key.get(key)
    }

    #[inline]
    pub fn key_of(&self, object: &ObjectRef) -> Option<&str> {
        self.by_addr.get(&object.addr()).map(|key| &**key)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::Type;

    #[test]
    fn registration_rules() {
        let ty = Type::sealed("app", "Settings");
        let a = ObjectRef::empty(ty.clone());
        let b = ObjectRef::empty(ty);
        let mut known = KnownObjects::new();

        known.register("settings", &a).unwrap();
        known.register("settings", &a).unwrap();
        assert_eq!(
            known.register("settings", &b),
            Err(RegisterError::KeyTaken("settings".into()))
        );
        assert!(matches!(
            known.register("other", &a),
            Err(RegisterError::ObjectTaken { .. })
        ));

        assert_eq!(known.key_of(&a), Some("settings"));
        assert_eq!(known.key_of(&b), None);
        assert!(ObjectRef::ptr_eq(known.get("settings").unwrap(), &a));
    }
}
