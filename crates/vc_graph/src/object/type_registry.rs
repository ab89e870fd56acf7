use alloc::sync::Arc;

use vc_utils::hash::{HashMap, HashSet};

use super::{Prim, Type, TypeKind};

/// Local types a reader may bind descriptors to.
///
/// Types are keyed by path and origin. When a descriptor names an origin
/// that is not registered, the reader falls back to the path alone as long
/// as only one registered type has it.
///
/// Generic types are registered once as a template (any instantiation, for
/// example `Vec<core::Object>`) and instantiated with the arguments found in
/// the stream.
///
/// # Examples
///
/// ```
/// use vc_graph::object::{Prim, Type, TypeRegistry};
///
/// let mut registry = TypeRegistry::new();
/// registry.register(Type::sealed("shapes", "Circle").with_origin("geometry"));
///
/// let circle = registry.lookup(Some("shapes"), "Circle", Some("old_geometry")).unwrap();
/// assert_eq!(circle.origin(), Some("geometry"));
///
/// let list = registry.instantiate(Some("alloc::vec"), "Vec", None, vec![Type::prim(Prim::U8)]);
/// assert_eq!(list, Some(Type::list(Type::prim(Prim::U8))));
/// ```
pub struct TypeRegistry {
    exact: HashMap<(String, Option<Arc<str>>), Type>,
    path_to_type: HashMap<String, Type>,
    ambiguous_paths: HashSet<String>,
    name_to_type: HashMap<String, Type>,
    ambiguous_names: HashSet<String>,
    generics: HashMap<(String, Option<Arc<str>>), Type>,
    generic_paths: HashMap<String, Type>,
}

impl Default for TypeRegistry {
    /// See [`TypeRegistry::new`].
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

fn path_of(namespace: Option<&str>, name: &str) -> String {
    match namespace {
        Some(namespace) => format!("{namespace}::{name}"),
        None => name.to_owned(),
    }
}

fn origin_key(origin: Option<&str>) -> Option<Arc<str>> {
    origin.map(Arc::from)
}

impl TypeRegistry {
    /// Creates an empty registry.
    pub fn empty() -> Self {
        Self {
            exact: HashMap::default(),
            path_to_type: HashMap::default(),
            ambiguous_paths: HashSet::default(),
            name_to_type: HashMap::default(),
            ambiguous_names: HashSet::default(),
            generics: HashMap::default(),
            generic_paths: HashMap::default(),
        }
    }

    /// Creates a registry that knows the primitives, `core::Object` and
    /// `alloc::vec::Vec`.
    pub fn new() -> Self {
        let mut registry = Self::empty();
        for prim in Prim::ALL {
            registry.register(Type::prim(prim));
        }
        registry.register(Type::object());
        registry.register(Type::list(Type::object()));
        registry
    }

    /// Registers a named type. Generic types register their definition.
    ///
    /// Returns `false` if the same path and origin were already registered.
    pub fn register(&mut self, ty: Type) -> bool {
        if !ty.kind().is_named() || ty.kind() == TypeKind::GenericDefinition {
            return false;
        }
        let path = ty.path();
        let key = (path.clone(), origin_key(ty.origin()));

        if ty.is_generic() {
            if self.generics.contains_key(&key) {
                return false;
            }
            self.generic_paths.entry(path).or_insert_with(|| ty.clone());
            self.generics.insert(key, ty);
            return true;
        }

        if self.exact.contains_key(&key) {
            return false;
        }

        if !self.ambiguous_paths.contains(&path) {
            if self.path_to_type.contains_key(&path) {
                self.path_to_type.remove(&path);
                self.ambiguous_paths.insert(path.clone());
            } else {
                self.path_to_type.insert(path.clone(), ty.clone());
            }
        }

        let name = ty.name().to_owned();
        if !self.ambiguous_names.contains(&name) {
            if self.name_to_type.contains_key(&name) {
                self.name_to_type.remove(&name);
                self.ambiguous_names.insert(name);
            } else {
                self.name_to_type.insert(name, ty.clone());
            }
        }

        self.exact.insert(key, ty);
        true
    }

    /// Finds a non-generic type by path and origin.
    pub fn lookup(&self, namespace: Option<&str>, name: &str, origin: Option<&str>) -> Option<Type> {
        let path = path_of(namespace, name);
        let key = (path, origin_key(origin));
        if let Some(ty) = self.exact.get(&key) {
            return Some(ty.clone());
        }
        self.path_to_type.get(&key.0).cloned()
    }

    /// Binds `args` to a registered generic type.
    pub fn instantiate(
        &self,
        namespace: Option<&str>,
        name: &str,
        origin: Option<&str>,
        args: Vec<Type>,
    ) -> Option<Type> {
        let template = self.generic_template(namespace, name, origin)?;
        (template.args().len() == args.len()).then(|| template.clone().with_args(args))
    }

    /// The unbound form of a registered generic type.
    pub fn generic_definition(
        &self,
        namespace: Option<&str>,
        name: &str,
        origin: Option<&str>,
    ) -> Option<Type> {
        let template = self.generic_template(namespace, name, origin)?;
        let definition = Type::generic_definition(
            namespace.unwrap_or_default(),
            name,
            template.args().len() as u8,
        );
        Some(match template.origin() {
            Some(origin) => definition.with_origin(origin),
            None => definition,
        })
    }

    fn generic_template(&self, namespace: Option<&str>, name: &str, origin: Option<&str>) -> Option<&Type> {
        let path = path_of(namespace, name);
        let key = (path, origin_key(origin));
        self.generics
            .get(&key)
            .or_else(|| self.generic_paths.get(&key.0))
    }

    /// Finds a type by its simple name, if no other registered type shares it.
    pub fn get_with_type_name(&self, name: &str) -> Option<&Type> {
        self.name_to_type.get(name)
    }

    /// Returns `true` if more than one registered type has this simple name.
    #[inline]
    pub fn is_ambiguous(&self, name: &str) -> bool {
        self.ambiguous_names.contains(name)
    }

    pub fn contains(&self, ty: &Type) -> bool {
        let key = (ty.path(), origin_key(ty.origin()));
        if ty.is_generic() {
            self.generics.contains_key(&key)
        } else {
            self.exact.contains_key(&key)
        }
    }

    /// Number of registered types, generic templates included.
    #[inline]
    pub fn len(&self) -> usize {
        self.exact.len() + self.generics.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = &Type> {
        self.exact.values().chain(self.generics.values())
    }
}

// -----------------------------------------------------------------------------
// Tests

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn origin_fallback_needs_unique_path() {
        let mut registry = TypeRegistry::empty();
        registry.register(Type::sealed("shapes", "Point").with_origin("a"));
        assert!(registry.lookup(Some("shapes"), "Point", Some("z")).is_some());

        registry.register(Type::sealed("shapes", "Point").with_origin("b"));
        assert!(registry.lookup(Some("shapes"), "Point", Some("z")).is_none());
        assert_eq!(
            registry.lookup(Some("shapes"), "Point", Some("b")).unwrap().origin(),
            Some("b")
        );
    }

    #[test]
    fn ambiguous_names() {
        let mut registry = TypeRegistry::empty();
        assert!(registry.register(Type::sealed("a", "Node")));
        assert!(!registry.register(Type::sealed("a", "Node")));
        assert!(registry.get_with_type_name("Node").is_some());

        registry.register(Type::sealed("b", "Node"));
        assert!(registry.is_ambiguous("Node"));
        assert!(registry.get_with_type_name("Node").is_none());
    }

    #[test]
    fn generics_instantiate_with_matching_arity() {
        let registry = TypeRegistry::new();
        let args = vec![Type::prim(Prim::String)];
        assert_eq!(
            registry.instantiate(Some("alloc::vec"), "Vec", None, args),
            Some(Type::list(Type::prim(Prim::String)))
        );
        assert_eq!(registry.instantiate(Some("alloc::vec"), "Vec", None, Vec::new()), None);
        assert_eq!(
            registry.generic_definition(Some("alloc::vec"), "Vec", None),
            Some(Type::generic_definition("alloc::vec", "Vec", 1))
        );
        assert!(registry.contains(&Type::list(Type::prim(Prim::I8))));
    }
}
