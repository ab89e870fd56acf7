use alloc::rc::Rc;
use core::cell::{Ref, RefCell, RefMut};
use core::fmt;
use core::mem;

use super::{Fields, Type, Value};

// -----------------------------------------------------------------------------
// Body

/// State of a reference object.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Body {
    /// Created by a reader but not yet filled.
    #[default]
    Pending,
    /// An object without state, like a bare `core::Object`.
    Empty,
    Fields(Fields),
    Items(Vec<Value>),
    /// A multi-dimensional array in row-major order.
    Grid { dims: Vec<usize>, items: Vec<Value> },
}

// -----------------------------------------------------------------------------
// Object

/// The shared part of an [`ObjectRef`].
pub struct Object {
    ty: Type,
    body: RefCell<Body>,
}

fn take_children(body: &mut Body, out: &mut Vec<Value>) {
    match mem::take(body) {
        Body::Fields(fields) => out.extend(fields.into_values()),
        Body::Items(items) | Body::Grid { items, .. } => out.extend(items),
        Body::Pending | Body::Empty => {}
    }
}

impl Drop for Object {
    // Unlinks children iteratively. Dropping a long chain recursively would
    // overflow the stack.
    fn drop(&mut self) {
        let mut stack = Vec::new();
        take_children(self.body.get_mut(), &mut stack);
        while let Some(value) = stack.pop() {
            match value {
                Value::Object(ObjectRef(rc)) => {
                    if let Some(mut object) = Rc::into_inner(rc) {
                        take_children(object.body.get_mut(), &mut stack);
                    }
                }
                Value::Record(record) => stack.extend(record.into_fields().into_values()),
                _ => {}
            }
        }
    }
}

// -----------------------------------------------------------------------------
// ObjectRef

/// A shared, mutable reference object.
///
/// Clones share the object. Equality is identity, see [`ObjectRef::ptr_eq`].
/// Cycles are allowed and leak unless the caller breaks them.
#[derive(Clone)]
pub struct ObjectRef(Rc<Object>);

impl ObjectRef {
    pub fn new(ty: Type, body: Body) -> Self {
        Self(Rc::new(Object {
            ty,
            body: RefCell::new(body),
        }))
    }

    /// An unfilled object, as created by readers before the payload.
    #[inline]
    pub fn placeholder(ty: Type) -> Self {
        Self::new(ty, Body::Pending)
    }

    #[inline]
    pub fn empty(ty: Type) -> Self {
        Self::new(ty, Body::Empty)
    }

    #[inline]
    pub fn with_fields(ty: Type, fields: Fields) -> Self {
        Self::new(ty, Body::Fields(fields))
    }

    #[inline]
    pub fn with_items(ty: Type, items: Vec<Value>) -> Self {
        Self::new(ty, Body::Items(items))
    }

    #[inline]
    pub fn ty(&self) -> &Type {
        &self.0.ty
    }

    /// # Panics
    /// Panics if the body is mutably borrowed.
    #[inline]
    pub fn body(&self) -> Ref<'_, Body> {
        self.0.body.borrow()
    }

    /// # Panics
    /// Panics if the body is borrowed.
    #[inline]
    pub fn body_mut(&self) -> RefMut<'_, Body> {
        self.0.body.borrow_mut()
    }

    #[inline]
    pub fn is_pending(&self) -> bool {
        matches!(*self.body(), Body::Pending)
    }

    /// Replaces the body, returning the previous one.
    #[inline]
    pub fn fill(&self, body: Body) -> Body {
        self.0.body.replace(body)
    }

    pub fn field(&self, name: &str) -> Option<Value> {
        match &*self.body() {
            Body::Fields(fields) => fields.get(name).cloned(),
            _ => None,
        }
    }

    /// Sets a field, turning an empty or pending body into a field body.
    ///
    /// Returns `false` if the body holds items.
    pub fn set_field(&self, name: &str, value: Value) -> bool {
        let mut body = self.body_mut();
        if matches!(*body, Body::Pending | Body::Empty) {
            *body = Body::Fields(Fields::new());
        }
        match &mut *body {
            Body::Fields(fields) => {
                fields.set(name, value);
                true
            }
            _ => false,
        }
    }

    /// Items of a list or array body.
    pub fn items(&self) -> Option<Vec<Value>> {
        match &*self.body() {
            Body::Items(items) | Body::Grid { items, .. } => Some(items.clone()),
            _ => None,
        }
    }

    #[inline]
    pub fn ptr_eq(a: &ObjectRef, b: &ObjectRef) -> bool {
        Rc::ptr_eq(&a.0, &b.0)
    }

    /// Address of the shared object. Stable while any handle is alive.
    #[inline]
    pub fn addr(&self) -> usize {
        Rc::as_ptr(&self.0) as usize
    }
}

impl PartialEq for ObjectRef {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        Self::ptr_eq(self, other)
    }
}

impl Eq for ObjectRef {}

// Does not recurse into the body: graphs may be cyclic.
impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Object({} @ {:#x})", self.ty(), self.addr())
    }
}

// -----------------------------------------------------------------------------
// Tests

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn long_chain_drops_iteratively() {
        let ty = Type::sealed("test", "Node");
        let mut head = ObjectRef::empty(ty.clone());
        for _ in 0..200_000 {
            let node = ObjectRef::placeholder(ty.clone());
            node.set_field("next", Value::Object(head));
            head = node;
        }
        drop(head);
    }

    #[test]
    fn set_field_upgrades_body() {
        let object = ObjectRef::placeholder(Type::sealed("test", "Node"));
        assert!(object.is_pending());
        assert!(object.set_field("x", Value::I32(1)));
        assert_eq!(object.field("x"), Some(Value::I32(1)));

        let list = ObjectRef::with_items(Type::list(Type::object()), Vec::new());
        assert!(!list.set_field("x", Value::Null));
    }
}
