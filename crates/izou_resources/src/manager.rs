//! Builder indices and timeout-bounded generation.

use core::fmt;
use core::time::Duration;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use hashbrown::{HashMap, HashSet};
use izou_events::ResourceGenerator;
use izou_identity::{Identification, IdentificationManager};
use izou_model::{Event, Resource};
use parking_lot::RwLock;
use tokio::task::JoinSet;
use tokio::time::Instant;

use crate::builder::ResourceBuilder;
use crate::error::ResourceError;

/// Tuning for a [`ResourceManager`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceSettings {
    /// Deadline shared by every builder in one generation batch.
    pub timeout: Duration,
}

impl Default for ResourceSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(3000),
        }
    }
}

impl ResourceSettings {
    /// Sets the generation deadline.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Indices
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Clone)]
struct RegisteredBuilder {
    identification: Identification,
    builder: Arc<dyn ResourceBuilder>,
    /// Announced resources, already stamped with the builder as provider.
    requests: Vec<Resource>,
}

#[derive(Default)]
struct Indices {
    builders: HashMap<Identification, RegisteredBuilder>,
    by_event: HashMap<String, Vec<Identification>>,
    by_resource: HashMap<String, Vec<Identification>>,
}

impl Indices {
    fn remove(&mut self, identification: &Identification) -> Option<RegisteredBuilder> {
        let removed = self.builders.remove(identification)?;
        for index in [&mut self.by_event, &mut self.by_resource] {
            index.retain(|_, ids| {
                ids.retain(|id| id != identification);
                !ids.is_empty()
            });
        }
        Some(removed)
    }
}

type BuilderOutcome = (
    Identification,
    Result<Result<Vec<Resource>, ResourceError>, Box<dyn core::any::Any + Send>>,
);

// ─────────────────────────────────────────────────────────────────────────────
// ResourceManager
// ─────────────────────────────────────────────────────────────────────────────

/// Maps events and resource IDs to the builders that serve them.
///
/// # Example
///
/// ```ignore
/// let manager = ResourceManager::new(registry, ResourceSettings::default());
/// assert!(manager.register_resource_builder(Arc::new(Clock)));
///
/// let resources = manager.generate_resource(Resource::new("time")).await;
/// ```
pub struct ResourceManager {
    registry: Arc<IdentificationManager>,
    settings: ResourceSettings,
    indices: RwLock<Indices>,
}

impl fmt::Debug for ResourceManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let indices = self.indices.read();
        f.debug_struct("ResourceManager")
            .field("settings", &self.settings)
            .field("builders", &indices.builders.keys().collect::<Vec<_>>())
            .field("events", &indices.by_event.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl ResourceManager {
    /// Creates an empty manager.
    #[must_use]
    pub fn new(registry: Arc<IdentificationManager>, settings: ResourceSettings) -> Self {
        Self {
            registry,
            settings,
            indices: RwLock::new(Indices::default()),
        }
    }

    /// Returns the manager's settings.
    #[must_use]
    pub fn settings(&self) -> ResourceSettings {
        self.settings
    }

    /// Indexes a builder under every resource ID and event topic it announces.
    ///
    /// Returns `false` if a builder with the same ID is already registered, or
    /// if the builder's ID is empty or held by another component.
    pub fn register_resource_builder(&self, builder: Arc<dyn ResourceBuilder>) -> bool {
        let mut indices = self.indices.write();
        if let Some(existing) = self.registry.get_identification_by_id(builder.id())
            && indices.builders.contains_key(&existing)
        {
            tracing::debug!(builder = %existing, "resource builder already registered");
            return false;
        }
        let Some(identification) = self.registry.claim(builder.as_ref()) else {
            tracing::warn!(builder = builder.id(), "resource builder ID is empty or taken");
            return false;
        };

        let requests: Vec<Resource> = builder
            .announce_resources()
            .iter()
            .map(|resource| resource.with_provider(identification.clone()))
            .collect();
        let topics: HashSet<String> = builder.announce_events().into_iter().collect();

        for topic in topics {
            indices
                .by_event
                .entry(topic)
                .or_default()
                .push(identification.clone());
        }
        let resource_ids: HashSet<&str> = requests.iter().map(Resource::resource_id).collect();
        for resource_id in resource_ids {
            indices
                .by_resource
                .entry(resource_id.to_owned())
                .or_default()
                .push(identification.clone());
        }
        indices.builders.insert(
            identification.clone(),
            RegisteredBuilder {
                identification: identification.clone(),
                builder,
                requests,
            },
        );

        tracing::debug!(builder = %identification, "registered resource builder");
        true
    }

    /// Removes a builder from every index and frees its ID.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceError::UnknownBuilder`] if no such builder is registered.
    pub fn unregister_resource_builder(
        &self,
        identification: &Identification,
    ) -> Result<(), ResourceError> {
        let removed = self
            .indices
            .write()
            .remove(identification)
            .ok_or_else(|| ResourceError::UnknownBuilder(identification.clone()))?;
        self.registry.release(removed.builder.as_ref());
        tracing::debug!(builder = %identification, "unregistered resource builder");
        Ok(())
    }

    /// Returns true if a builder with this identity is registered.
    #[must_use]
    pub fn is_registered(&self, identification: &Identification) -> bool {
        self.indices.read().builders.contains_key(identification)
    }

    /// Returns the builders triggered by a topic, in registration order.
    #[must_use]
    pub fn builders_for_event(&self, topic: &str) -> Vec<Identification> {
        self.indices
            .read()
            .by_event
            .get(topic)
            .cloned()
            .unwrap_or_default()
    }

    /// Returns the builders able to produce a resource, in registration order.
    #[must_use]
    pub fn builders_for_resource(&self, resource_id: &str) -> Vec<Identification> {
        self.indices
            .read()
            .by_resource
            .get(resource_id)
            .cloned()
            .unwrap_or_default()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Generation
    // ─────────────────────────────────────────────────────────────────────────

    /// Runs every builder subscribed to one of the event's topics.
    ///
    /// Each builder runs at most once per event, on its own task. Results
    /// from builders that finish before the deadline are merged in completion
    /// order; the rest are cancelled.
    pub async fn generate_resources(&self, event: &Arc<Event>) -> Vec<Resource> {
        let scheduled: Vec<RegisteredBuilder> = {
            let indices = self.indices.read();
            let mut seen = HashSet::new();
            event
                .topics()
                .iter()
                .filter_map(|topic| indices.by_event.get(topic.as_str()))
                .flatten()
                .filter(|id| seen.insert((*id).clone()))
                .filter_map(|id| indices.builders.get(id).cloned())
                .collect()
        };
        if scheduled.is_empty() {
            return Vec::new();
        }

        let deadline = Instant::now() + self.settings.timeout;
        let mut tasks = JoinSet::new();
        for registered in scheduled {
            let event = Arc::clone(event);
            tasks.spawn(async move {
                let outcome = AssertUnwindSafe(
                    registered
                        .builder
                        .provide_resource(registered.requests, Some(event)),
                )
                .catch_unwind()
                .await;
                (registered.identification, outcome)
            });
        }

        collect(tasks, deadline).await
    }

    /// Asks a single builder for one resource.
    ///
    /// The builder is the first one indexed under the resource ID whose
    /// identity matches the request's provider, or the first one at all if
    /// the request names no provider.
    pub async fn generate_resource(&self, request: Resource) -> Vec<Resource> {
        let registered = {
            let indices = self.indices.read();
            indices
                .by_resource
                .get(request.resource_id())
                .and_then(|ids| {
                    ids.iter()
                        .find(|id| request.provider().is_none_or(|provider| provider == *id))
                })
                .and_then(|id| indices.builders.get(id).cloned())
        };
        let Some(registered) = registered else {
            tracing::debug!(
                resource = request.resource_id(),
                "no resource builder for request"
            );
            return Vec::new();
        };

        let request = request.with_provider(registered.identification.clone());
        let deadline = Instant::now() + self.settings.timeout;
        let mut tasks = JoinSet::new();
        tasks.spawn(async move {
            let outcome = AssertUnwindSafe(registered.builder.provide_resource(vec![request], None))
                .catch_unwind()
                .await;
            (registered.identification, outcome)
        });

        collect(tasks, deadline).await
    }
}

/// Drains builder tasks until they all finish or the deadline passes.
async fn collect(mut tasks: JoinSet<BuilderOutcome>, deadline: Instant) -> Vec<Resource> {
    let mut resources = Vec::new();
    loop {
        match tokio::time::timeout_at(deadline, tasks.join_next()).await {
            Ok(Some(Ok((builder, Ok(Ok(produced)))))) => {
                resources.extend(produced.into_iter().map(|resource| {
                    if resource.provider().is_some() {
                        resource
                    } else {
                        resource.with_provider(builder.clone())
                    }
                }));
            }
            Ok(Some(Ok((builder, Ok(Err(err)))))) => {
                tracing::warn!(builder = %builder, error = %err, "resource builder failed");
            }
            Ok(Some(Ok((builder, Err(_))))) => {
                tracing::warn!(builder = %builder, "resource builder panicked");
            }
            Ok(Some(Err(err))) => {
                tracing::warn!(error = %err, "resource builder task failed");
            }
            Ok(None) => break,
            Err(_) => {
                tracing::warn!(
                    pending = tasks.len(),
                    "resource generation timed out, cancelling remaining builders"
                );
                tasks.abort_all();
                break;
            }
        }
    }
    resources
}

#[async_trait]
impl ResourceGenerator for ResourceManager {
    async fn generate_resources(&self, event: &Arc<Event>) -> Vec<Resource> {
        ResourceManager::generate_resources(self, event).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::sync::atomic::{AtomicUsize, Ordering};
    use izou_identity::Identifiable;

    struct Builder {
        id: &'static str,
        resources: Vec<&'static str>,
        events: Vec<&'static str>,
        behavior: Behavior,
        calls: AtomicUsize,
    }

    #[derive(Clone, Copy)]
    enum Behavior {
        Hello,
        Fail,
        Panic,
        Hang,
    }

    impl Builder {
        fn new(id: &'static str, resources: &[&'static str], events: &[&'static str]) -> Self {
            Self {
                id,
                resources: resources.to_vec(),
                events: events.to_vec(),
                behavior: Behavior::Hello,
                calls: AtomicUsize::new(0),
            }
        }

        fn behaving(mut self, behavior: Behavior) -> Self {
            self.behavior = behavior;
            self
        }
    }

    impl Identifiable for Builder {
        fn id(&self) -> &str {
            self.id
        }
    }

    #[async_trait]
    impl ResourceBuilder for Builder {
        fn announce_resources(&self) -> Vec<Resource> {
            self.resources.iter().map(|id| Resource::new(*id)).collect()
        }

        fn announce_events(&self) -> Vec<String> {
            self.events.iter().map(|topic| (*topic).to_owned()).collect()
        }

        async fn provide_resource(
            &self,
            requested: Vec<Resource>,
            _event: Option<Arc<Event>>,
        ) -> Result<Vec<Resource>, ResourceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.behavior {
                Behavior::Hello => Ok(requested
                    .iter()
                    .map(|resource| resource.with_payload("hello"))
                    .collect()),
                Behavior::Fail => Err(ResourceError::Failed("boom".into())),
                Behavior::Panic => panic!("builder panicked"),
                Behavior::Hang => {
                    core::future::pending::<()>().await;
                    Ok(Vec::new())
                }
            }
        }
    }

    fn manager() -> (Arc<IdentificationManager>, ResourceManager) {
        let registry = Arc::new(IdentificationManager::new());
        let manager = ResourceManager::new(Arc::clone(&registry), ResourceSettings::default());
        (registry, manager)
    }

    struct Source;

    impl Identifiable for Source {
        fn id(&self) -> &str {
            "test.source"
        }
    }

    fn source(registry: &IdentificationManager) -> Identification {
        registry.register(&Source);
        registry.get_identification(&Source).unwrap()
    }

    fn event(registry: &IdentificationManager, topic: &str) -> Arc<Event> {
        Arc::new(Event::new(topic, source(registry)))
    }

    #[tokio::test]
    async fn event_topic_produces_announced_resource() {
        let (registry, manager) = manager();
        assert!(manager.register_resource_builder(Arc::new(Builder::new("b", &["R"], &["1"]))));

        let resources = manager.generate_resources(&event(&registry, "1")).await;

        assert_eq!(resources.len(), 1);
        assert_eq!(resources[0].resource_id(), "R");
        assert_eq!(resources[0].payload::<&str>(), Some(&"hello"));
        assert_eq!(resources[0].provider().map(Identification::id), Some("b"));
    }

    #[tokio::test]
    async fn builders_run_once_and_only_for_their_topics() {
        let (registry, manager) = manager();
        let both = Arc::new(Builder::new("both", &["x"], &["1", "2"]));
        let other = Arc::new(Builder::new("other", &["y"], &["3"]));
        manager.register_resource_builder(both.clone());
        manager.register_resource_builder(other.clone());

        let event = Arc::new(Event::new("1", source(&registry)).with_descriptor("2"));
        let resources = manager.generate_resources(&event).await;

        assert_eq!(resources.len(), 1);
        assert_eq!(both.calls.load(Ordering::SeqCst), 1);
        assert_eq!(other.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn hanging_builder_is_cut_off_at_the_deadline() {
        let (registry, manager) = manager();
        manager.register_resource_builder(Arc::new(Builder::new("fast", &["R"], &["1"])));
        manager.register_resource_builder(Arc::new(
            Builder::new("slow", &["S"], &["1"]).behaving(Behavior::Hang),
        ));

        let started = Instant::now();
        let resources = manager.generate_resources(&event(&registry, "1")).await;
        let elapsed = started.elapsed();

        assert!(elapsed >= Duration::from_millis(3000));
        assert!(elapsed < Duration::from_millis(3100));
        assert_eq!(resources.len(), 1);
        assert_eq!(resources[0].resource_id(), "R");
    }

    #[tokio::test]
    async fn failing_and_panicking_builders_produce_nothing() {
        let (registry, manager) = manager();
        manager.register_resource_builder(Arc::new(Builder::new("ok", &["R"], &["1"])));
        manager.register_resource_builder(Arc::new(
            Builder::new("err", &["E"], &["1"]).behaving(Behavior::Fail),
        ));
        manager.register_resource_builder(Arc::new(
            Builder::new("panic", &["P"], &["1"]).behaving(Behavior::Panic),
        ));

        let resources = manager.generate_resources(&event(&registry, "1")).await;

        assert_eq!(resources.len(), 1);
        assert_eq!(resources[0].resource_id(), "R");
    }

    #[tokio::test]
    async fn point_lookup_honors_requested_provider() {
        let (registry, manager) = manager();
        let first = Arc::new(Builder::new("first", &["R"], &[]));
        let second = Arc::new(Builder::new("second", &["R"], &[]));
        manager.register_resource_builder(first.clone());
        manager.register_resource_builder(second.clone());

        let anyone = manager.generate_resource(Resource::new("R")).await;
        assert_eq!(anyone[0].provider().map(Identification::id), Some("first"));

        let wanted = registry.get_identification_by_id("second").unwrap();
        let targeted = manager
            .generate_resource(Resource::new("R").with_provider(wanted))
            .await;
        assert_eq!(targeted.len(), 1);
        assert_eq!(targeted[0].provider().map(Identification::id), Some("second"));
        assert_eq!(first.calls.load(Ordering::SeqCst), 1);
        assert_eq!(second.calls.load(Ordering::SeqCst), 1);

        assert!(manager.generate_resource(Resource::new("missing")).await.is_empty());
    }

    #[tokio::test]
    async fn unregister_clears_every_index() {
        let (registry, manager) = manager();
        manager.register_resource_builder(Arc::new(Builder::new("b", &["R", "S"], &["1", "2"])));
        let id = registry.get_identification_by_id("b").unwrap();

        manager.unregister_resource_builder(&id).unwrap();

        assert!(!manager.is_registered(&id));
        for topic in ["1", "2"] {
            assert!(manager.builders_for_event(topic).is_empty());
        }
        for resource in ["R", "S"] {
            assert!(manager.builders_for_resource(resource).is_empty());
        }
        assert!(manager.generate_resources(&event(&registry, "1")).await.is_empty());
        assert_eq!(
            manager.unregister_resource_builder(&id),
            Err(ResourceError::UnknownBuilder(id))
        );
    }

    #[test]
    fn duplicate_builder_is_rejected() {
        let (_, manager) = manager();
        assert!(manager.register_resource_builder(Arc::new(Builder::new("b", &["R"], &["1"]))));
        assert!(!manager.register_resource_builder(Arc::new(Builder::new("b", &["S"], &["2"]))));
        assert!(manager.builders_for_event("2").is_empty());
    }

    #[test]
    fn builder_cannot_take_an_id_held_elsewhere() {
        let (registry, manager) = manager();
        let plugin = Source;
        assert!(registry.claim(&plugin).is_some());

        assert!(!manager.register_resource_builder(Arc::new(Builder::new(
            "test.source",
            &["R"],
            &["1"]
        ))));
        assert!(manager.builders_for_event("1").is_empty());
    }

    #[test]
    fn unregistered_id_can_be_reused() {
        let (registry, manager) = manager();
        assert!(manager.register_resource_builder(Arc::new(Builder::new("b", &["R"], &["1"]))));
        let id = registry.get_identification_by_id("b").unwrap();
        assert!(registry.is_claimed("b"));

        manager.unregister_resource_builder(&id).unwrap();
        assert!(!registry.is_claimed("b"));
        assert!(manager.register_resource_builder(Arc::new(Builder::new("b", &["S"], &["2"]))));
        assert_eq!(manager.builders_for_event("2"), [id]);
    }
}
