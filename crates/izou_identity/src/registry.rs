//! The process-wide identification registry.

use std::sync::Arc;

use hashbrown::HashMap;
use parking_lot::RwLock;

use crate::identification::{Identifiable, Identification};

/// The live component currently holding an ID.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Claim {
    /// Address of the holding instance.
    owner: usize,
    /// Registrations the instance holds under the ID.
    holds: usize,
}

fn owner_of<I: ?Sized>(component: &I) -> usize {
    core::ptr::from_ref(component).cast::<()>().addr()
}

/// Registry of component IDs.
///
/// Constructed once by the process root and shared by reference with every
/// component that registers or resolves identities. Registration is
/// append-only: an ID that is already present is never overwritten, and
/// [`register`](Self::register) reports the collision by returning `false`.
///
/// Managers bind the instances they accept with [`claim`](Self::claim). While
/// one instance holds an ID, every other instance returning the same ID is
/// refused, and lookups from such an instance are not trusted. The same
/// instance may claim its ID several times, for example as a listener for
/// several topics, and the ID is free again once every claim was
/// [released](Self::release).
#[derive(Default)]
pub struct IdentificationManager {
    ids: RwLock<HashMap<Arc<str>, Option<Claim>>>,
}

impl core::fmt::Debug for IdentificationManager {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let ids = self.ids.read();
        f.debug_struct("IdentificationManager")
            .field("registered", &ids.len())
            .field("claimed", &ids.values().filter(|claim| claim.is_some()).count())
            .finish()
    }
}

impl IdentificationManager {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            ids: RwLock::new(HashMap::new()),
        }
    }

    /// Registers a component's ID.
    ///
    /// Returns `false` if the ID is empty or already registered.
    pub fn register<I: Identifiable + ?Sized>(&self, identifiable: &I) -> bool {
        let id = identifiable.id();
        if id.is_empty() {
            tracing::warn!("rejected registration of an empty id");
            return false;
        }

        let mut ids = self.ids.write();
        if ids.contains_key(id) {
            tracing::debug!(id, "id already registered");
            return false;
        }
        ids.insert(Arc::from(id), None);
        tracing::debug!(id, "registered id");
        true
    }

    /// Returns a handle for a registered component.
    ///
    /// The handle is marked as created from instance unless another instance
    /// holds a claim on the ID. Returns `None` if the ID is not registered.
    #[must_use]
    pub fn get_identification<I: Identifiable + ?Sized>(
        &self,
        identifiable: &I,
    ) -> Option<Identification> {
        let owner = owner_of(identifiable);
        self.ids
            .read()
            .get_key_value(identifiable.id())
            .map(|(stored, claim)| {
                let trusted = claim.is_none_or(|claim| claim.owner == owner);
                Identification::new(Arc::clone(stored), trusted)
            })
    }

    /// Looks up a handle by its string ID.
    ///
    /// The returned handle is not marked as created from instance.
    #[must_use]
    pub fn get_identification_by_id(&self, id: &str) -> Option<Identification> {
        self.ids
            .read()
            .get_key_value(id)
            .map(|(stored, _)| Identification::new(Arc::clone(stored), false))
    }

    /// Binds a component instance to its ID, registering the ID if needed.
    ///
    /// Managers call this for every component handed to them and
    /// [`release`](Self::release) it when the component is removed.
    ///
    /// Returns `None` if the ID is empty or held by another instance.
    pub fn claim<I: Identifiable + ?Sized>(&self, component: &I) -> Option<Identification> {
        let id = component.id();
        if id.is_empty() {
            tracing::warn!("rejected claim of an empty id");
            return None;
        }
        let owner = owner_of(component);

        let mut ids = self.ids.write();
        if let Some((stored, slot)) = ids.get_key_value_mut(id) {
            match slot {
                Some(claim) if claim.owner != owner => {
                    tracing::warn!(id, "id is held by another component");
                    return None;
                }
                Some(claim) => claim.holds += 1,
                None => *slot = Some(Claim { owner, holds: 1 }),
            }
            return Some(Identification::new(Arc::clone(stored), true));
        }

        let stored: Arc<str> = Arc::from(id);
        ids.insert(Arc::clone(&stored), Some(Claim { owner, holds: 1 }));
        tracing::debug!(id, "registered id");
        Some(Identification::new(stored, true))
    }

    /// Gives up one claim of a component instance.
    ///
    /// The ID itself stays registered. Returns `false` if the instance holds
    /// no claim on its ID.
    pub fn release<I: Identifiable + ?Sized>(&self, component: &I) -> bool {
        let owner = owner_of(component);
        let mut ids = self.ids.write();
        let Some(slot) = ids.get_mut(component.id()) else {
            return false;
        };
        match slot {
            Some(claim) if claim.owner == owner => {
                claim.holds -= 1;
                if claim.holds == 0 {
                    *slot = None;
                    tracing::trace!(id = component.id(), "released id");
                }
                true
            }
            _ => false,
        }
    }

    /// Returns true if the ID is registered.
    #[must_use]
    pub fn is_registered(&self, id: &str) -> bool {
        self.ids.read().contains_key(id)
    }

    /// Returns true if some component instance holds the ID.
    #[must_use]
    pub fn is_claimed(&self, id: &str) -> bool {
        self.ids.read().get(id).is_some_and(Option::is_some)
    }

    /// Returns the number of registered IDs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.read().len()
    }

    /// Returns true if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Component(&'static str);

    impl Identifiable for Component {
        fn id(&self) -> &str {
            self.0
        }
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let registry = IdentificationManager::new();
        assert!(registry.register(&Component("weather")));
        assert!(!registry.register(&Component("weather")));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn empty_id_is_rejected() {
        let registry = IdentificationManager::new();
        assert!(!registry.register(&Component("")));
        assert!(registry.claim(&Component("")).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn unknown_lookups_return_none() {
        let registry = IdentificationManager::new();
        assert!(registry.get_identification(&Component("missing")).is_none());
        assert!(registry.get_identification_by_id("missing").is_none());
    }

    #[test]
    fn provenance_depends_on_lookup_path() {
        let registry = IdentificationManager::new();
        let weather = Component("weather");
        registry.register(&weather);

        let owned = registry.get_identification(&weather).unwrap();
        let by_id = registry.get_identification_by_id("weather").unwrap();

        assert!(owned.created_from_instance());
        assert!(!by_id.created_from_instance());
        assert_eq!(owned, by_id);
    }

    #[test]
    fn second_instance_cannot_take_a_held_id() {
        let registry = IdentificationManager::new();
        let builder = Box::new(Component("shared"));
        let plugin = Box::new(Component("shared"));

        let held = registry.claim(builder.as_ref()).unwrap();
        assert!(held.created_from_instance());
        assert!(registry.claim(plugin.as_ref()).is_none());

        let impostor = registry.get_identification(plugin.as_ref()).unwrap();
        assert!(!impostor.created_from_instance());
        assert!(registry.get_identification(builder.as_ref()).unwrap().created_from_instance());
        assert!(!registry.release(plugin.as_ref()));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn same_instance_claims_are_counted() {
        let registry = IdentificationManager::new();
        let listener = Box::new(Component("listener"));
        let other = Box::new(Component("listener"));

        assert!(registry.claim(listener.as_ref()).is_some());
        assert!(registry.claim(listener.as_ref()).is_some());
        assert!(registry.release(listener.as_ref()));
        assert!(registry.is_claimed("listener"));
        assert!(registry.claim(other.as_ref()).is_none());

        assert!(registry.release(listener.as_ref()));
        assert!(!registry.is_claimed("listener"));
        assert!(!registry.release(listener.as_ref()));

        assert!(registry.claim(other.as_ref()).is_some());
        assert!(registry.is_registered("listener"));
    }

    #[test]
    fn registered_id_can_be_claimed_once() {
        let registry = IdentificationManager::new();
        let clock = Box::new(Component("clock"));
        assert!(registry.register(clock.as_ref()));
        assert!(!registry.is_claimed("clock"));

        let id = registry.claim(clock.as_ref()).unwrap();
        assert_eq!(id, registry.get_identification_by_id("clock").unwrap());
        assert!(!registry.register(clock.as_ref()));
    }
}
