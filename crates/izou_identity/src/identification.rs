//! The [`Identifiable`] trait and the [`Identification`] handle.

use core::fmt;
use core::hash::{Hash, Hasher};
use std::sync::Arc;

// ─────────────────────────────────────────────────────────────────────────────
// Identifiable
// ─────────────────────────────────────────────────────────────────────────────

/// A component that owns a globally unique string ID.
///
/// The ID must be stable for the lifetime of the process. Two distinct
/// components returning the same ID cannot both be registered.
pub trait Identifiable: Send + Sync {
    /// Returns the component's ID.
    fn id(&self) -> &str;
}

impl<T: Identifiable + ?Sized> Identifiable for Arc<T> {
    fn id(&self) -> &str {
        (**self).id()
    }
}

impl<T: Identifiable + ?Sized> Identifiable for Box<T> {
    fn id(&self) -> &str {
        (**self).id()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Identification
// ─────────────────────────────────────────────────────────────────────────────

/// Capability handle bound to exactly one registered component.
///
/// Handles are only issued by the
/// [`IdentificationManager`](crate::IdentificationManager). Equality and
/// hashing consider the underlying ID only, so a handle looked up by ID
/// compares equal to the one issued from the owning instance.
#[derive(Clone)]
pub struct Identification {
    id: Arc<str>,
    created_from_instance: bool,
}

impl Identification {
    pub(crate) fn new(id: Arc<str>, created_from_instance: bool) -> Self {
        Self {
            id,
            created_from_instance,
        }
    }

    /// Returns the underlying ID.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns true if this handle was issued from the owning instance
    /// rather than looked up by its string ID.
    #[must_use]
    pub fn created_from_instance(&self) -> bool {
        self.created_from_instance
    }

    /// Returns true if this handle identifies the given component.
    #[must_use]
    pub fn is_identifying<I: Identifiable + ?Sized>(&self, identifiable: &I) -> bool {
        *self.id == *identifiable.id()
    }

    /// Returns true if `other` names the same component and this handle
    /// was issued from the owning instance.
    ///
    /// Permission checks use this to accept requests only from the
    /// component itself, not from anyone who happens to know its ID.
    #[must_use]
    pub fn is_trusted_for(&self, other: &Identification) -> bool {
        self.created_from_instance && self == other
    }
}

impl PartialEq for Identification {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Identification {}

impl Hash for Identification {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl Identifiable for Identification {
    fn id(&self) -> &str {
        &self.id
    }
}

impl fmt::Display for Identification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}

impl fmt::Debug for Identification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identification")
            .field("id", &&*self.id)
            .field("created_from_instance", &self.created_from_instance)
            .finish()
    }
}
