//! Fan-out dispatch of events.

use std::sync::Arc;

use hashbrown::{HashMap, HashSet};
use izou_identity::{Identifiable, Identification, IdentificationManager};
use izou_model::Event;
use parking_lot::RwLock;

use crate::controller::EventsController;
use crate::error::EventError;
use crate::hooks::{DispatchHooks, DispatchPhase};
use crate::listener::EventListener;
use crate::stage::{OutputSink, ResourceGenerator};

/// What happened to a dispatched event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// A controller vetoed the event. Nothing ran.
    Vetoed {
        /// The controller that returned `false`.
        controller: String,
    },
    /// Listeners were notified and the event was handed downstream.
    Dispatched {
        /// Number of listeners notified.
        listeners: usize,
    },
}

/// Fan-out engine between the event queue and the rest of the system.
///
/// Listener and controller collections are guarded separately. Dispatch works
/// on snapshots, so no lock is held while user code runs.
pub struct EventDistributor {
    registry: Arc<IdentificationManager>,
    listeners: RwLock<HashMap<String, Vec<Arc<dyn EventListener>>>>,
    controllers: RwLock<Vec<Arc<dyn EventsController>>>,
    hooks: DispatchHooks,
    generator: Option<Arc<dyn ResourceGenerator>>,
    sink: Option<Arc<dyn OutputSink>>,
}

impl core::fmt::Debug for EventDistributor {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let topics: Vec<String> = self.listeners.read().keys().cloned().collect();
        f.debug_struct("EventDistributor")
            .field("topics", &topics)
            .field("controllers", &self.controllers.read().len())
            .field("hooks", &self.hooks)
            .field("generator", &self.generator.is_some())
            .field("sink", &self.sink.is_some())
            .finish_non_exhaustive()
    }
}

impl EventDistributor {
    /// Creates a distributor with no downstream stages.
    #[must_use]
    pub fn new(registry: Arc<IdentificationManager>) -> Self {
        Self {
            registry,
            listeners: RwLock::new(HashMap::new()),
            controllers: RwLock::new(Vec::new()),
            hooks: DispatchHooks::new(),
            generator: None,
            sink: None,
        }
    }

    /// Sets the stage that generates resources for each dispatched event.
    #[must_use]
    pub fn with_resource_generator(mut self, generator: Arc<dyn ResourceGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    /// Sets the stage that receives each dispatched event for output.
    #[must_use]
    pub fn with_output_sink(mut self, sink: Arc<dyn OutputSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Returns the dispatch hooks.
    #[must_use]
    pub fn hooks(&self) -> &DispatchHooks {
        &self.hooks
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Registration
    // ─────────────────────────────────────────────────────────────────────────

    /// Registers a listener for a topic.
    ///
    /// The same listener may be registered for several topics. Returns
    /// `false` if it is already registered for this topic, or if its ID is
    /// empty or held by another component.
    pub fn register_event_listener(
        &self,
        topic: impl Into<String>,
        listener: Arc<dyn EventListener>,
    ) -> bool {
        let topic = topic.into();
        let mut listeners = self.listeners.write();
        if listeners
            .get(&topic)
            .is_some_and(|entries| entries.iter().any(|existing| existing.id() == listener.id()))
        {
            return false;
        }
        if self.registry.claim(listener.as_ref()).is_none() {
            tracing::warn!(topic = %topic, listener = listener.id(), "refused event listener");
            return false;
        }
        tracing::debug!(topic = %topic, listener = listener.id(), "registered event listener");
        listeners.entry(topic).or_default().push(listener);
        true
    }

    /// Removes a listener from a topic.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::UnknownListener`] if the listener was not
    /// registered for the topic.
    pub fn unregister_event_listener(
        &self,
        topic: &str,
        listener: &Identification,
    ) -> Result<(), EventError> {
        let mut listeners = self.listeners.write();
        let unknown = || EventError::UnknownListener {
            topic: topic.to_owned(),
            listener: listener.clone(),
        };

        let entries = listeners.get_mut(topic).ok_or_else(unknown)?;
        let index = entries
            .iter()
            .position(|existing| listener.is_identifying(existing.as_ref()))
            .ok_or_else(unknown)?;
        let removed = entries.remove(index);
        if entries.is_empty() {
            listeners.remove(topic);
        }
        self.registry.release(removed.as_ref());
        tracing::debug!(topic, listener = %listener, "unregistered event listener");
        Ok(())
    }

    /// Registers a dispatch gate.
    ///
    /// Returns `false` if a controller with the same ID is already registered,
    /// or if its ID is empty or held by another component.
    pub fn register_events_controller(&self, controller: Arc<dyn EventsController>) -> bool {
        let mut controllers = self.controllers.write();
        if controllers.iter().any(|c| c.id() == controller.id()) {
            return false;
        }
        if self.registry.claim(controller.as_ref()).is_none() {
            tracing::warn!(controller = controller.id(), "refused events controller");
            return false;
        }
        tracing::debug!(controller = controller.id(), "registered events controller");
        controllers.push(controller);
        true
    }

    /// Removes a dispatch gate.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::UnknownController`] if no such controller exists.
    pub fn unregister_events_controller(
        &self,
        controller: &Identification,
    ) -> Result<(), EventError> {
        let removed = {
            let mut controllers = self.controllers.write();
            let index = controllers
                .iter()
                .position(|c| controller.is_identifying(c.as_ref()))
                .ok_or_else(|| EventError::UnknownController(controller.clone()))?;
            controllers.remove(index)
        };
        self.registry.release(removed.as_ref());
        tracing::debug!(controller = %controller, "unregistered events controller");
        Ok(())
    }

    /// Returns the number of listeners registered for a topic.
    #[must_use]
    pub fn listener_count(&self, topic: &str) -> usize {
        self.listeners.read().get(topic).map_or(0, Vec::len)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Dispatch
    // ─────────────────────────────────────────────────────────────────────────

    /// Dispatches one event.
    ///
    /// Returns once listeners were notified. Resource generation and output
    /// delivery continue together on their own task: generated resources are
    /// attached to the event before it reaches the output sink. With a
    /// downstream stage set, this must be called from within a tokio runtime.
    pub fn dispatch(&self, event: Arc<Event>) -> DispatchOutcome {
        if let Some(controller) = self.vetoing_controller(&event) {
            tracing::debug!(
                event_type = event.event_type(),
                controller = %controller,
                "event dispatch vetoed"
            );
            return DispatchOutcome::Vetoed { controller };
        }

        self.hooks.invoke(DispatchPhase::PreDispatch, &event);

        let listeners = self.listeners_for(&event);
        for listener in &listeners {
            listener.event_fired(&event);
        }

        self.hooks.invoke(DispatchPhase::PostDispatch, &event);

        self.hand_off(Arc::clone(&event));

        tracing::trace!(
            event_type = event.event_type(),
            listeners = listeners.len(),
            "event dispatched"
        );

        DispatchOutcome::Dispatched {
            listeners: listeners.len(),
        }
    }

    fn hand_off(&self, event: Arc<Event>) {
        if self.generator.is_none() && self.sink.is_none() {
            return;
        }
        let generator = self.generator.clone();
        let sink = self.sink.clone();
        tokio::spawn(async move {
            if let Some(generator) = generator {
                let generated = generator.generate_resources(&event).await;
                tracing::trace!(
                    event_type = event.event_type(),
                    resources = generated.len(),
                    "attaching generated resources"
                );
                event.resources().add_resources(generated);
            }
            if let Some(sink) = sink {
                sink.pass_data_to_output_plugins(event).await;
            }
        });
    }

    fn vetoing_controller(&self, event: &Event) -> Option<String> {
        let controllers: Vec<Arc<dyn EventsController>> = self.controllers.read().clone();
        controllers
            .iter()
            .find(|controller| !controller.control_event_dispatcher(event))
            .map(|controller| controller.id().to_owned())
    }

    fn listeners_for(&self, event: &Event) -> Vec<Arc<dyn EventListener>> {
        let listeners = self.listeners.read();
        let mut seen = HashSet::new();
        event
            .topics()
            .iter()
            .filter_map(|topic| listeners.get(topic))
            .flatten()
            .filter(|listener| seen.insert(listener.id().to_owned()))
            .cloned()
            .collect()
    }
}
