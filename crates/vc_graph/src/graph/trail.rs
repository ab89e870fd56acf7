use core::fmt::{Debug, Formatter};

/// The chain of types being read, for error messages.
///
/// Only recorded in debug builds with the `debug` feature. Elsewhere the
/// trail stays empty and costs nothing.
#[derive(Default, Clone)]
pub(super) struct TypeTrail {
    #[cfg(all(debug_assertions, feature = "debug"))]
    stack: Vec<String>,
}

impl TypeTrail {
    #[inline]
    pub fn push(&mut self, name: impl FnOnce() -> String) {
        #[cfg(all(debug_assertions, feature = "debug"))]
        self.stack.push(name());
        #[cfg(not(all(debug_assertions, feature = "debug")))]
        let _ = name;
    }

    #[inline]
    pub fn pop(&mut self) {
        #[cfg(all(debug_assertions, feature = "debug"))]
        self.stack.pop();
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        #[cfg(all(debug_assertions, feature = "debug"))]
        return self.stack.is_empty();
        #[cfg(not(all(debug_assertions, feature = "debug")))]
        return true;
    }

    /// The trail as text, or `None` if nothing was recorded.
    pub fn render(&self) -> Option<String> {
        (!self.is_empty()).then(|| format!("{self:?}"))
    }
}

impl Debug for TypeTrail {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        #[cfg(all(debug_assertions, feature = "debug"))]
        for (index, name) in self.stack.iter().enumerate() {
            if index > 0 {
                f.write_str(" -> ")?;
            }
            write!(f, "`{name}`")?;
        }
        #[cfg(not(all(debug_assertions, feature = "debug")))]
        let _ = f;
        Ok(())
    }
}

#[cfg(all(test, debug_assertions, feature = "debug"))]
mod tests {
    use super::TypeTrail;

    #[test]
    fn renders_in_push_order() {
        let mut trail = TypeTrail::default();
        assert_eq!(trail.render(), None);

        trail.push(|| "app::Scene".to_owned());
        trail.push(|| "alloc::vec::Vec<app::Node>".to_owned());
        trail.push(|| "app::Node".to_owned());
        trail.pop();

        assert_eq!(
            trail.render().as_deref(),
            Some("`app::Scene` -> `alloc::vec::Vec<app::Node>`")
        );
    }
}
