//! Immutable resource values.
//!
//! A [`Resource`] is the unit of data interchange between components. It
//! starts out as a *request* (an ID without payload) created by a consumer,
//! is filled in by a resource builder, attached to an event's
//! [`ResourceContainer`], and read by listeners and output extensions.
//!
//! Every `with_*` method returns a new value. The original is never touched.

use core::any::Any;
use core::fmt;
use std::sync::Arc;

use izou_identity::Identification;
use parking_lot::RwLock;

/// Type-erased resource payload.
pub type Payload = Arc<dyn Any + Send + Sync>;

// ─────────────────────────────────────────────────────────────────────────────
// Resource
// ─────────────────────────────────────────────────────────────────────────────

/// A named, optionally populated data value.
#[derive(Clone)]
pub struct Resource {
    resource_id: Arc<str>,
    payload: Option<Payload>,
    payload_type: Option<&'static str>,
    provider: Option<Identification>,
    consumer: Option<Identification>,
}

impl Resource {
    /// Creates an empty resource request.
    #[must_use]
    pub fn new(resource_id: impl Into<Arc<str>>) -> Self {
        Self {
            resource_id: resource_id.into(),
            payload: None,
            payload_type: None,
            provider: None,
            consumer: None,
        }
    }

    /// Returns the resource ID.
    #[must_use]
    pub fn resource_id(&self) -> &str {
        &self.resource_id
    }

    /// Returns a copy of this resource carrying `value` as payload.
    #[must_use]
    pub fn with_payload<T: Any + Send + Sync>(&self, value: T) -> Self {
        Self {
            payload: Some(Arc::new(value)),
            payload_type: Some(core::any::type_name::<T>()),
            ..self.clone()
        }
    }

    /// Returns a copy of this resource carrying an already shared payload.
    #[must_use]
    pub fn with_shared_payload(&self, payload: Payload) -> Self {
        Self {
            payload: Some(payload),
            payload_type: None,
            ..self.clone()
        }
    }

    /// Returns a copy of this resource without payload.
    #[must_use]
    pub fn without_payload(&self) -> Self {
        Self {
            payload: None,
            payload_type: None,
            ..self.clone()
        }
    }

    /// Returns a copy of this resource with the given provider.
    #[must_use]
    pub fn with_provider(&self, provider: Identification) -> Self {
        Self {
            provider: Some(provider),
            ..self.clone()
        }
    }

    /// Returns a copy of this resource with the given consumer.
    #[must_use]
    pub fn with_consumer(&self, consumer: Identification) -> Self {
        Self {
            consumer: Some(consumer),
            ..self.clone()
        }
    }

    /// Returns the payload downcast to `T`.
    ///
    /// Returns `None` if there is no payload or it has a different type.
    #[must_use]
    pub fn payload<T: Any>(&self) -> Option<&T> {
        self.payload.as_deref()?.downcast_ref::<T>()
    }

    /// Returns the type-erased payload.
    #[must_use]
    pub fn shared_payload(&self) -> Option<&Payload> {
        self.payload.as_ref()
    }

    /// Returns true if a payload is present.
    #[must_use]
    pub fn has_payload(&self) -> bool {
        self.payload.is_some()
    }

    /// Returns true if this resource is an unfilled request.
    #[must_use]
    pub fn is_request(&self) -> bool {
        self.payload.is_none()
    }

    /// Returns the identity of the component that provides this resource.
    #[must_use]
    pub fn provider(&self) -> Option<&Identification> {
        self.provider.as_ref()
    }

    /// Returns the identity of the component this resource is meant for.
    #[must_use]
    pub fn consumer(&self) -> Option<&Identification> {
        self.consumer.as_ref()
    }
}

impl fmt::Debug for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resource")
            .field("resource_id", &&*self.resource_id)
            .field(
                "payload",
                &self
                    .payload
                    .as_ref()
                    .map(|_| self.payload_type.unwrap_or("<shared>")),
            )
            .field("provider", &self.provider)
            .field("consumer", &self.consumer)
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ResourceContainer
// ─────────────────────────────────────────────────────────────────────────────

/// The resources attached to an event.
///
/// The container is shared by everyone that holds the event. Reads return
/// snapshots, so callers never keep the lock while running their own code.
#[derive(Default)]
pub struct ResourceContainer {
    resources: RwLock<Vec<Resource>>,
}

impl fmt::Debug for ResourceContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.resources.read().iter()).finish()
    }
}

impl ResourceContainer {
    /// Creates an empty container.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a resource.
    pub fn add_resource(&self, resource: Resource) {
        self.resources.write().push(resource);
    }

    /// Appends several resources.
    pub fn add_resources(&self, resources: impl IntoIterator<Item = Resource>) {
        self.resources.write().extend(resources);
    }

    /// Returns every resource with the given ID.
    #[must_use]
    pub fn provide_resource(&self, resource_id: &str) -> Vec<Resource> {
        self.resources
            .read()
            .iter()
            .filter(|resource| resource.resource_id() == resource_id)
            .cloned()
            .collect()
    }

    /// Returns true if at least one resource with the given ID is present.
    #[must_use]
    pub fn contains_resource(&self, resource_id: &str) -> bool {
        self.resources
            .read()
            .iter()
            .any(|resource| resource.resource_id() == resource_id)
    }

    /// Returns every resource provided by `source`.
    #[must_use]
    pub fn resources_from_source(&self, source: &Identification) -> Vec<Resource> {
        self.resources
            .read()
            .iter()
            .filter(|resource| resource.provider() == Some(source))
            .cloned()
            .collect()
    }

    /// Returns every resource addressed to `consumer`.
    #[must_use]
    pub fn resources_for_consumer(&self, consumer: &Identification) -> Vec<Resource> {
        self.resources
            .read()
            .iter()
            .filter(|resource| resource.consumer() == Some(consumer))
            .cloned()
            .collect()
    }

    /// Returns the distinct resource IDs currently present, in insertion order.
    #[must_use]
    pub fn resource_ids(&self) -> Vec<String> {
        let resources = self.resources.read();
        let mut seen = hashbrown::HashSet::new();
        resources
            .iter()
            .map(Resource::resource_id)
            .filter(|id| seen.insert(*id))
            .map(str::to_owned)
            .collect()
    }

    /// Returns a snapshot of all resources.
    #[must_use]
    pub fn resources(&self) -> Vec<Resource> {
        self.resources.read().clone()
    }

    /// Returns the number of resources.
    #[must_use]
    pub fn len(&self) -> usize {
        self.resources.read().len()
    }

    /// Returns true if the container holds nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.resources.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use izou_identity::{Identifiable, IdentificationManager};

    struct Named<'a>(&'a str);

    impl Identifiable for Named<'_> {
        fn id(&self) -> &str {
            self.0
        }
    }

    fn handle(registry: &IdentificationManager, name: &str) -> Identification {
        registry.register(&Named(name));
        registry.get_identification(&Named(name)).unwrap()
    }

    #[test]
    fn with_payload_leaves_original_untouched() {
        let request = Resource::new("news.headlines");
        let filled = request.with_payload(vec!["a", "b"]);

        assert!(request.is_request());
        assert!(request.payload::<Vec<&str>>().is_none());
        assert_eq!(filled.payload::<Vec<&str>>(), Some(&vec!["a", "b"]));
        assert_eq!(filled.resource_id(), "news.headlines");
    }

    #[test]
    fn payload_with_wrong_type_is_none() {
        let resource = Resource::new("count").with_payload(3_u32);
        assert!(resource.payload::<i64>().is_none());
        assert_eq!(resource.payload::<u32>(), Some(&3));
    }

    #[test]
    fn provider_and_consumer_are_copied_forward() {
        let registry = IdentificationManager::new();
        let provider = handle(&registry, "builder");
        let consumer = handle(&registry, "plugin");

        let resource = Resource::new("r")
            .with_provider(provider.clone())
            .with_consumer(consumer.clone())
            .with_payload("x");

        assert_eq!(resource.provider(), Some(&provider));
        assert_eq!(resource.consumer(), Some(&consumer));
        assert!(resource.without_payload().is_request());
    }

    #[test]
    fn container_queries() {
        let registry = IdentificationManager::new();
        let weather = handle(&registry, "weather");
        let news = handle(&registry, "news");

        let container = ResourceContainer::new();
        container.add_resource(Resource::new("a").with_provider(weather.clone()));
        container.add_resources([
            Resource::new("b").with_provider(news.clone()),
            Resource::new("a").with_consumer(news.clone()),
        ]);

        assert_eq!(container.len(), 3);
        assert_eq!(container.provide_resource("a").len(), 2);
        assert!(container.contains_resource("b"));
        assert!(!container.contains_resource("c"));
        assert_eq!(container.resources_from_source(&weather).len(), 1);
        assert_eq!(container.resources_for_consumer(&news).len(), 1);
        assert_eq!(container.resource_ids(), vec!["a".to_owned(), "b".to_owned()]);
    }
}
