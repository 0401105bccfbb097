//! Process root.

use core::fmt;
use std::sync::Arc;

use izou_activator::{ActivatorManager, SupervisorSettings};
use izou_core::IzouConfig;
use izou_events::{EventDistributor, LocalEventManager};
use izou_identity::{Identifiable, Identification, IdentificationManager};
use izou_output::{OutputManager, OutputSettings};
use izou_resources::{ResourceManager, ResourceSettings};
use parking_lot::Mutex;

use crate::addon::{AddOn, AddOnContext, AddOnReport};
use crate::error::AddOnError;

/// Owns the registry and every manager of one Izou process.
///
/// # Example
///
/// ```ignore
/// let izou = Izou::new(IzouConfig::default());
/// izou.start();
/// izou.add_addon(&WeatherAddOn)?;
/// // ...
/// izou.shutdown().await;
/// ```
pub struct Izou {
    config: IzouConfig,
    registry: Arc<IdentificationManager>,
    events: Arc<LocalEventManager>,
    distributor: Arc<EventDistributor>,
    resources: Arc<ResourceManager>,
    output: Arc<OutputManager>,
    activators: ActivatorManager,
    addons: Mutex<Vec<Identification>>,
}

impl fmt::Debug for Izou {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Izou")
            .field("config", &self.config)
            .field("addons", &*self.addons.lock())
            .field("events", &self.events)
            .field("resources", &self.resources)
            .field("output", &self.output)
            .field("activators", &self.activators)
            .finish_non_exhaustive()
    }
}

impl Izou {
    /// Builds every manager from `config` and wires the dispatch pipeline.
    ///
    /// Nothing runs until [`start`](Self::start).
    #[must_use]
    pub fn new(config: IzouConfig) -> Self {
        let registry = Arc::new(IdentificationManager::new());

        let resources = Arc::new(ResourceManager::new(
            Arc::clone(&registry),
            ResourceSettings::default().with_timeout(config.resource_timeout),
        ));
        let output = Arc::new(OutputManager::new(
            Arc::clone(&registry),
            OutputSettings::default().with_timeout(config.output_timeout),
        ));
        let activators = ActivatorManager::new(
            Arc::clone(&registry),
            SupervisorSettings::default()
                .with_max_crashes(config.max_activator_crashes)
                .with_max_permission_denials(config.max_permission_denials),
        );

        let distributor = Arc::new(
            EventDistributor::new(Arc::clone(&registry))
                .with_resource_generator(resources.clone())
                .with_output_sink(output.clone()),
        );
        let events = Arc::new(LocalEventManager::new(
            Arc::clone(&registry),
            Arc::clone(&distributor),
        ));

        Self {
            config,
            registry,
            events,
            distributor,
            resources,
            output,
            activators,
            addons: Mutex::new(Vec::new()),
        }
    }

    /// Installs the configured subscriber and starts the event loop.
    ///
    /// Must be called from within a tokio runtime. Returns `false` if the
    /// event loop was already started.
    pub fn start(&self) -> bool {
        self.config.tracing.init();
        let started = self.events.start();
        if started {
            tracing::info!("izou started");
        }
        started
    }

    /// Returns the configuration the process was built with.
    #[must_use]
    pub fn config(&self) -> &IzouConfig {
        &self.config
    }

    /// Returns the process-wide identification registry.
    #[must_use]
    pub fn registry(&self) -> &Arc<IdentificationManager> {
        &self.registry
    }

    /// Returns the event intake.
    #[must_use]
    pub fn event_manager(&self) -> &Arc<LocalEventManager> {
        &self.events
    }

    /// Returns the event distributor.
    #[must_use]
    pub fn distributor(&self) -> &Arc<EventDistributor> {
        &self.distributor
    }

    /// Returns the resource manager.
    #[must_use]
    pub fn resource_manager(&self) -> &Arc<ResourceManager> {
        &self.resources
    }

    /// Returns the output manager.
    #[must_use]
    pub fn output_manager(&self) -> &Arc<OutputManager> {
        &self.output
    }

    /// Returns the activator supervisor.
    #[must_use]
    pub fn activator_manager(&self) -> &ActivatorManager {
        &self.activators
    }

    /// Returns the IDs of the loaded add-ons.
    #[must_use]
    pub fn addon_ids(&self) -> Vec<Identification> {
        self.addons.lock().clone()
    }

    /// Returns a context for building components outside an add-on.
    #[must_use]
    pub fn context(&self) -> AddOnContext {
        AddOnContext::new(Arc::clone(&self.registry), Arc::clone(&self.events))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Add-ons
    // ─────────────────────────────────────────────────────────────────────────

    /// Loads an add-on: asks it for its components and hands each one to
    /// the manager responsible for it.
    ///
    /// Components the managers refuse, because of an empty ID, an ID held by
    /// another component or mismatched output types, are skipped and listed
    /// in the report.
    /// Activators and output plugins start running right away, so this must
    /// be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// - [`AddOnError::EmptyId`] if the add-on's ID is empty.
    /// - [`AddOnError::AlreadyLoaded`] if an add-on with the same ID is loaded.
    /// - [`AddOnError::IdTaken`] if another component holds the add-on's ID.
    pub fn add_addon(&self, addon: &dyn AddOn) -> Result<AddOnReport, AddOnError> {
        if addon.id().is_empty() {
            return Err(AddOnError::EmptyId);
        }
        let identification = {
            let mut addons = self.addons.lock();
            if addons.iter().any(|loaded| loaded.id() == addon.id()) {
                return Err(AddOnError::AlreadyLoaded(addon.id().to_owned()));
            }
            let identification = self
                .registry
                .claim(addon)
                .ok_or_else(|| AddOnError::IdTaken(addon.id().to_owned()))?;
            addons.push(identification.clone());
            identification
        };

        let context = self.context();
        let mut report = AddOnReport::default();
        let skip = |report: &mut AddOnReport, kind: &str, id: &str| {
            tracing::warn!(addon = %identification, kind, component = id, "skipping component");
            report.skipped.push(id.to_owned());
        };

        for builder in addon.resource_builders(&context) {
            let id = builder.id().to_owned();
            if self.resources.register_resource_builder(builder) {
                report.resource_builders += 1;
            } else {
                skip(&mut report, "resource builder", &id);
            }
        }

        for plugin in addon.output_plugins(&context) {
            let id = plugin.id().to_owned();
            if self.output.add_output_plugin(plugin) {
                report.output_plugins += 1;
            } else {
                skip(&mut report, "output plugin", &id);
            }
        }

        for extension in addon.output_extensions(&context) {
            let id = extension.id().to_owned();
            match self.output.add_output_extension(extension) {
                Ok(true) => report.output_extensions += 1,
                Ok(false) => skip(&mut report, "output extension", &id),
                Err(err) => {
                    tracing::warn!(addon = %identification, error = %err, "output extension rejected");
                    report.skipped.push(id);
                }
            }
        }

        for controller in addon.events_controllers(&context) {
            let id = controller.id().to_owned();
            if self.distributor.register_events_controller(controller) {
                report.events_controllers += 1;
            } else {
                skip(&mut report, "events controller", &id);
            }
        }

        for (topic, listener) in addon.event_listeners(&context) {
            let id = listener.id().to_owned();
            if self.distributor.register_event_listener(topic, listener) {
                report.event_listeners += 1;
            } else {
                skip(&mut report, "event listener", &id);
            }
        }

        // Activators last, so everything they fire into is already wired.
        for activator in addon.activators(&context) {
            let id = activator.id().to_owned();
            if self.activators.add_activator(activator) {
                report.activators += 1;
            } else {
                skip(&mut report, "activator", &id);
            }
        }

        tracing::info!(addon = %identification, skipped = report.skipped.len(), "loaded add-on");
        Ok(report)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Shutdown
    // ─────────────────────────────────────────────────────────────────────────

    /// Cancels activators, stops the event loop and cancels output plugins.
    pub async fn shutdown(&self) {
        self.activators.shutdown();
        self.events.shutdown().await;
        self.output.shutdown();
        tracing::info!("izou stopped");
    }
}
