//! Type-erased values passed between extensions and plugins.

use core::any::{Any, TypeId};
use core::fmt;
use std::sync::Arc;

/// A value produced by an extension or handed to it as an argument.
pub type Value = Arc<dyn Any + Send + Sync>;

/// Declared type of a [`Value`], used to match extensions to plugins.
///
/// [`ValueType::any`] accepts every type.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct ValueType {
    type_id: Option<TypeId>,
    name: &'static str,
}

impl ValueType {
    /// The type `T`.
    #[must_use]
    pub fn of<T: Any>() -> Self {
        Self {
            type_id: Some(TypeId::of::<T>()),
            name: core::any::type_name::<T>(),
        }
    }

    /// Accepts values of any type.
    #[must_use]
    pub const fn any() -> Self {
        Self {
            type_id: None,
            name: "any",
        }
    }

    /// Returns the type's name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Returns true if a value declared as `other` may be passed where
    /// `self` is expected.
    #[must_use]
    pub fn accepts(&self, other: ValueType) -> bool {
        self.type_id.is_none() || self.type_id == other.type_id
    }

    /// Returns true if the value's concrete type matches this declaration.
    #[must_use]
    pub fn matches(&self, value: &Value) -> bool {
        self.type_id.is_none_or(|type_id| (**value).type_id() == type_id)
    }
}

impl fmt::Debug for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn any_accepts_everything() {
        assert!(ValueType::any().accepts(ValueType::of::<String>()));
        assert!(ValueType::any().accepts(ValueType::any()));
    }

    #[test]
    fn concrete_type_accepts_only_itself() {
        let text = ValueType::of::<String>();
        assert!(text.accepts(ValueType::of::<String>()));
        assert!(!text.accepts(ValueType::of::<u32>()));
        assert!(!text.accepts(ValueType::any()));
    }

    #[test]
    fn matches_checks_the_concrete_value() {
        let value: Value = Arc::new(String::from("hi"));
        assert!(ValueType::of::<String>().matches(&value));
        assert!(!ValueType::of::<u32>().matches(&value));
        assert!(ValueType::any().matches(&value));
    }
}
