//! The add-on contract.

use std::sync::Arc;

use izou_activator::Activator;
use izou_events::{EventCaller, EventListener, EventsController, LocalEventManager};
use izou_identity::{Identifiable, Identification, IdentificationManager};
use izou_output::{OutputExtension, OutputPlugin};
use izou_resources::ResourceBuilder;

/// Handed to add-on factories so components can be built with their
/// capabilities.
#[derive(Debug, Clone)]
pub struct AddOnContext {
    registry: Arc<IdentificationManager>,
    events: Arc<LocalEventManager>,
}

impl AddOnContext {
    pub(crate) fn new(registry: Arc<IdentificationManager>, events: Arc<LocalEventManager>) -> Self {
        Self { registry, events }
    }

    /// Returns the process-wide identification registry.
    #[must_use]
    pub fn registry(&self) -> &Arc<IdentificationManager> {
        &self.registry
    }

    /// Registers a component's ID if needed and returns its handle.
    ///
    /// The handle is trusted unless another instance holds the ID.
    pub fn identification<I: Identifiable + ?Sized>(
        &self,
        component: &I,
    ) -> Option<Identification> {
        self.registry.register(component);
        self.registry.get_identification(component)
    }

    /// Issues an event caller for a component, typically an activator.
    ///
    /// Returns `None` if the component's ID is empty, is held by another
    /// instance or already has a caller.
    pub fn register_caller<I: Identifiable + ?Sized>(&self, component: &I) -> Option<EventCaller> {
        let identification = self.identification(component)?;
        self.events.register_caller(&identification)
    }
}

/// A bundle of components loaded into Izou together.
///
/// Every factory is called once by [`Izou::add_addon`](crate::Izou::add_addon).
/// Unused factories default to empty.
pub trait AddOn: Identifiable {
    /// Background loops that fire events.
    fn activators(&self, _context: &AddOnContext) -> Vec<Arc<dyn Activator>> {
        Vec::new()
    }

    /// Producers of resources.
    fn resource_builders(&self, _context: &AddOnContext) -> Vec<Arc<dyn ResourceBuilder>> {
        Vec::new()
    }

    /// Renderers of events.
    fn output_plugins(&self, _context: &AddOnContext) -> Vec<Arc<dyn OutputPlugin>> {
        Vec::new()
    }

    /// Extensions of output plugins, possibly from other add-ons.
    fn output_extensions(&self, _context: &AddOnContext) -> Vec<Arc<dyn OutputExtension>> {
        Vec::new()
    }

    /// Dispatch gates.
    fn events_controllers(&self, _context: &AddOnContext) -> Vec<Arc<dyn EventsController>> {
        Vec::new()
    }

    /// Listeners, each paired with the topic it listens to.
    fn event_listeners(&self, _context: &AddOnContext) -> Vec<(String, Arc<dyn EventListener>)> {
        Vec::new()
    }
}

/// What [`Izou::add_addon`](crate::Izou::add_addon) wired up.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddOnReport {
    /// Activators submitted.
    pub activators: usize,
    /// Resource builders indexed.
    pub resource_builders: usize,
    /// Output plugins started.
    pub output_plugins: usize,
    /// Output extensions attached or waiting for their plugin.
    pub output_extensions: usize,
    /// Events controllers registered.
    pub events_controllers: usize,
    /// Event listeners registered.
    pub event_listeners: usize,
    /// IDs of components that were refused.
    pub skipped: Vec<String>,
}
