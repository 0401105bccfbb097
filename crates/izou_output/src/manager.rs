//! Plugin run loops and priority-ordered delivery.

use core::fmt;
use core::time::Duration;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use hashbrown::{HashMap, HashSet};
use izou_events::OutputSink;
use izou_identity::{Identification, IdentificationManager};
use izou_model::{Event, Resource, resolve_delivery_order};
use parking_lot::{Mutex, RwLock};
use tokio::sync::{mpsc, oneshot};
use tokio::task::{JoinHandle, JoinSet};

use crate::error::OutputError;
use crate::extension::OutputExtension;
use crate::plugin::OutputPlugin;
use crate::signal::{COMPLETION_RESOURCE_ID, CompletionSignal, signal_completion};
use crate::value::Value;

/// Tuning for an [`OutputManager`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputSettings {
    /// How long the driver waits for one plugin to finish an event.
    pub timeout: Duration,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(100),
        }
    }
}

impl OutputSettings {
    /// Sets the per-plugin wait.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

type ExtensionSet = Arc<RwLock<Vec<Arc<dyn OutputExtension>>>>;

struct PluginEntry {
    identification: Identification,
    plugin: Arc<dyn OutputPlugin>,
    extensions: ExtensionSet,
    inbound: mpsc::UnboundedSender<Arc<Event>>,
    task: JoinHandle<()>,
}

// ─────────────────────────────────────────────────────────────────────────────
// OutputManager
// ─────────────────────────────────────────────────────────────────────────────

/// Owns the output plugins, their extensions and their run loops.
pub struct OutputManager {
    registry: Arc<IdentificationManager>,
    settings: OutputSettings,
    /// In registration order, which is the default delivery order.
    plugins: RwLock<Vec<PluginEntry>>,
    /// Extensions whose plugin is not registered, keyed by plugin ID.
    pending: Mutex<HashMap<String, Vec<Arc<dyn OutputExtension>>>>,
}

impl fmt::Debug for OutputManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutputManager")
            .field("settings", &self.settings)
            .field("plugins", &self.output_plugin_ids())
            .field("pending", &self.pending.lock().len())
            .finish_non_exhaustive()
    }
}

impl OutputManager {
    /// Creates a manager without plugins.
    #[must_use]
    pub fn new(registry: Arc<IdentificationManager>, settings: OutputSettings) -> Self {
        Self {
            registry,
            settings,
            plugins: RwLock::new(Vec::new()),
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the manager's settings.
    #[must_use]
    pub fn settings(&self) -> OutputSettings {
        self.settings
    }

    /// Returns the registered plugins in registration order.
    #[must_use]
    pub fn output_plugin_ids(&self) -> Vec<Identification> {
        self.plugins
            .read()
            .iter()
            .map(|entry| entry.identification.clone())
            .collect()
    }

    /// Returns the extensions attached to a plugin.
    #[must_use]
    pub fn extensions_of(&self, plugin: &Identification) -> Vec<Identification> {
        self.plugins
            .read()
            .iter()
            .find(|entry| &entry.identification == plugin)
            .map(|entry| {
                entry
                    .extensions
                    .read()
                    .iter()
                    .filter_map(|extension| self.registry.get_identification(extension.as_ref()))
                    .collect()
            })
            .unwrap_or_default()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Plugins
    // ─────────────────────────────────────────────────────────────────────────

    /// Registers a plugin and starts its run loop.
    ///
    /// A previous registration under the same ID is replaced if its loop has
    /// ended. Extensions waiting for this plugin are attached if their types
    /// fit.
    ///
    /// Returns `false` if a loop for the same ID is still running, or if the
    /// plugin's ID is empty or held by another component.
    pub fn add_output_plugin(&self, plugin: Arc<dyn OutputPlugin>) -> bool {
        let mut plugins = self.plugins.write();
        let mut carried = Vec::new();
        if let Some(index) = plugins
            .iter()
            .position(|entry| entry.identification.id() == plugin.id())
        {
            if !plugins[index].task.is_finished() {
                tracing::debug!(plugin = plugin.id(), "output plugin is already running");
                return false;
            }
            let previous = plugins.remove(index);
            self.registry.release(previous.plugin.as_ref());
            carried.extend(previous.extensions.read().iter().cloned());
        }

        let mut pending = self.pending.lock();
        let Some(identification) = self.registry.claim(plugin.as_ref()) else {
            tracing::warn!(plugin = plugin.id(), "output plugin ID is empty or taken");
            if !carried.is_empty() {
                pending
                    .entry(plugin.id().to_owned())
                    .or_default()
                    .extend(carried);
            }
            return false;
        };
        carried.extend(pending.remove(identification.id()).unwrap_or_default());
        drop(pending);

        let mut attached = Vec::new();
        for extension in carried {
            match check_types(plugin.as_ref(), extension.as_ref()) {
                Ok(()) => attached.push(extension),
                Err(err) => {
                    tracing::warn!(error = %err, "dropping output extension");
                    self.registry.release(extension.as_ref());
                }
            }
        }

        let extensions: ExtensionSet = Arc::new(RwLock::new(attached.clone()));
        let (inbound, receiver) = mpsc::unbounded_channel();
        let task = tokio::spawn(run_plugin(
            Arc::clone(&plugin),
            identification.clone(),
            Arc::clone(&extensions),
            receiver,
        ));
        plugins.push(PluginEntry {
            identification: identification.clone(),
            plugin: Arc::clone(&plugin),
            extensions,
            inbound,
            task,
        });
        drop(plugins);

        tracing::debug!(plugin = %identification, "started output plugin");
        for extension in &attached {
            if let Some(id) = self.registry.get_identification(extension.as_ref()) {
                plugin.output_extension_added(&id);
            }
        }
        true
    }

    /// Cancels a plugin's run loop, deregisters it and frees its ID.
    ///
    /// A delivery waiting on the plugin moves on to the next one. Its
    /// extensions are kept and reattached if the plugin is added again.
    ///
    /// # Errors
    ///
    /// Returns [`OutputError::UnknownPlugin`] if no such plugin is registered.
    pub fn remove_output_plugin(&self, plugin: &Identification) -> Result<(), OutputError> {
        let entry = {
            let mut plugins = self.plugins.write();
            let index = plugins
                .iter()
                .position(|entry| &entry.identification == plugin)
                .ok_or_else(|| OutputError::UnknownPlugin(plugin.clone()))?;
            plugins.remove(index)
        };
        entry.task.abort();
        self.registry.release(entry.plugin.as_ref());

        let extensions: Vec<_> = entry.extensions.read().clone();
        if !extensions.is_empty() {
            self.pending
                .lock()
                .entry(plugin.id().to_owned())
                .or_default()
                .extend(extensions);
        }
        tracing::debug!(plugin = %plugin, "removed output plugin");
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Extensions
    // ─────────────────────────────────────────────────────────────────────────

    /// Attaches an extension to the plugin it declares.
    ///
    /// If the plugin is not registered yet the extension waits for it.
    /// Returns `Ok(false)` if the extension is already registered, or if its
    /// ID is empty or held by another component.
    ///
    /// # Errors
    ///
    /// Returns [`OutputError::TypeMismatch`] if the plugin is registered and
    /// cannot consume the extension's values or provide its argument.
    pub fn add_output_extension(
        &self,
        extension: Arc<dyn OutputExtension>,
    ) -> Result<bool, OutputError> {
        // Both locks stay held until the extension is stored.
        let plugins = self.plugins.read();
        let mut pending = self.pending.lock();
        if holds_extension(&plugins, &pending, extension.id()) {
            return Ok(false);
        }

        let target = plugins
            .iter()
            .find(|entry| entry.identification.id() == extension.plugin_id());
        if let Some(entry) = target {
            check_types(entry.plugin.as_ref(), extension.as_ref())?;
        }
        let Some(identification) = self.registry.claim(extension.as_ref()) else {
            tracing::warn!(extension = extension.id(), "output extension ID is empty or taken");
            return Ok(false);
        };

        let Some(entry) = target else {
            tracing::debug!(
                extension = %identification,
                plugin = extension.plugin_id(),
                "output extension waiting for its plugin"
            );
            pending
                .entry(extension.plugin_id().to_owned())
                .or_default()
                .push(extension);
            return Ok(true);
        };

        entry.extensions.write().push(Arc::clone(&extension));
        let plugin = Arc::clone(&entry.plugin);
        drop(pending);
        drop(plugins);

        tracing::debug!(
            extension = %identification,
            plugin = extension.plugin_id(),
            "attached output extension"
        );
        plugin.output_extension_added(&identification);
        Ok(true)
    }

    /// Detaches an extension from its plugin and frees its ID.
    ///
    /// # Errors
    ///
    /// Returns [`OutputError::UnknownExtension`] if no such extension is
    /// registered or waiting.
    pub fn remove_output_extension(&self, extension: &Identification) -> Result<(), OutputError> {
        let plugins = self.plugins.read();
        let detached = plugins.iter().find_map(|entry| {
            let mut extensions = entry.extensions.write();
            let index = extensions
                .iter()
                .position(|candidate| extension.is_identifying(candidate.as_ref()))?;
            Some((extensions.remove(index), Arc::clone(&entry.plugin)))
        });
        if let Some((removed, plugin)) = detached {
            drop(plugins);
            self.registry.release(removed.as_ref());
            plugin.output_extension_removed(extension);
            tracing::debug!(extension = %extension, "detached output extension");
            return Ok(());
        }

        let mut pending = self.pending.lock();
        let mut removed = None;
        pending.retain(|_, waiting| {
            if removed.is_none()
                && let Some(index) = waiting
                    .iter()
                    .position(|candidate| extension.is_identifying(candidate.as_ref()))
            {
                removed = Some(waiting.remove(index));
            }
            !waiting.is_empty()
        });
        drop(pending);
        drop(plugins);

        let removed = removed.ok_or_else(|| OutputError::UnknownExtension(extension.clone()))?;
        self.registry.release(removed.as_ref());
        tracing::debug!(extension = %extension, "dropped waiting output extension");
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Delivery
    // ─────────────────────────────────────────────────────────────────────────

    /// Delivers an event to every plugin, one after another, in priority order.
    ///
    /// Waits for each plugin to finish the event or for the output timeout,
    /// whichever comes first.
    pub async fn pass_data_to_output_plugins(&self, event: Arc<Event>) {
        let targets: Vec<(Identification, mpsc::UnboundedSender<Arc<Event>>)> = self
            .plugins
            .read()
            .iter()
            .map(|entry| (entry.identification.clone(), entry.inbound.clone()))
            .collect();
        let ids: Vec<Identification> = targets.iter().map(|(id, _)| id.clone()).collect();
        let order = match event.behavior() {
            Some(behavior) => resolve_delivery_order(&ids, &behavior.output_plugin_behavior(&ids)),
            None => ids,
        };
        let targets: HashMap<Identification, mpsc::UnboundedSender<Arc<Event>>> =
            targets.into_iter().collect();

        for plugin in order {
            let Some(inbound) = targets.get(&plugin) else {
                continue;
            };
            let (done, waiting) = oneshot::channel();
            let signal = Arc::new(CompletionSignal::new(done));
            event.resources().add_resource(
                Resource::new(COMPLETION_RESOURCE_ID)
                    .with_shared_payload(signal.clone())
                    .with_consumer(plugin.clone()),
            );
            if inbound.send(Arc::clone(&event)).is_err() {
                signal.disarm();
                tracing::warn!(plugin = %plugin, "output plugin is not running");
                continue;
            }

            tokio::select! {
                biased;
                outcome = tokio::time::timeout(self.settings.timeout, waiting) => match outcome {
                    Ok(Ok(())) => tracing::trace!(plugin = %plugin, "output plugin finished event"),
                    Ok(Err(_)) => {
                        tracing::warn!(plugin = %plugin, "output plugin dropped its completion signal");
                    }
                    Err(_) => tracing::error!(
                        plugin = %plugin,
                        timeout = ?self.settings.timeout,
                        "output plugin did not finish in time, moving on"
                    ),
                },
                () = inbound.closed() => {
                    signal.disarm();
                    tracing::warn!(plugin = %plugin, "output plugin was removed during delivery");
                }
            }
        }
    }

    /// Cancels every plugin run loop.
    pub fn shutdown(&self) {
        for entry in self.plugins.read().iter() {
            entry.task.abort();
        }
    }
}

#[async_trait]
impl OutputSink for OutputManager {
    async fn pass_data_to_output_plugins(&self, event: Arc<Event>) {
        OutputManager::pass_data_to_output_plugins(self, event).await;
    }
}

impl Drop for OutputManager {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn holds_extension(
    plugins: &[PluginEntry],
    pending: &HashMap<String, Vec<Arc<dyn OutputExtension>>>,
    id: &str,
) -> bool {
    let attached = plugins.iter().any(|entry| {
        entry
            .extensions
            .read()
            .iter()
            .any(|candidate| candidate.id() == id)
    });
    attached || pending.values().flatten().any(|candidate| candidate.id() == id)
}

fn check_types(
    plugin: &dyn OutputPlugin,
    extension: &dyn OutputExtension,
) -> Result<(), OutputError> {
    let mismatch = |expected: &'static str, found: &'static str| OutputError::TypeMismatch {
        extension: extension.id().to_owned(),
        plugin: plugin.id().to_owned(),
        expected,
        found,
    };

    if !plugin.receiving_type().accepts(extension.return_type()) {
        return Err(mismatch(
            plugin.receiving_type().name(),
            extension.return_type().name(),
        ));
    }
    if !extension.argument_type().accepts(plugin.argument_type()) {
        return Err(mismatch(
            extension.argument_type().name(),
            plugin.argument_type().name(),
        ));
    }
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Run loop
// ─────────────────────────────────────────────────────────────────────────────

async fn run_plugin(
    plugin: Arc<dyn OutputPlugin>,
    identification: Identification,
    extensions: ExtensionSet,
    mut inbound: mpsc::UnboundedReceiver<Arc<Event>>,
) {
    while let Some(event) = inbound.recv().await {
        let results = run_extensions(plugin.as_ref(), &extensions, &event).await;

        match AssertUnwindSafe(plugin.render_final_output(Arc::clone(&event), results))
            .catch_unwind()
            .await
        {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                tracing::warn!(plugin = %identification, error = %err, "final render failed");
            }
            Err(_) => tracing::warn!(plugin = %identification, "final render panicked"),
        }

        if !signal_completion(&event, &identification) {
            tracing::trace!(plugin = %identification, "no driver waiting for completion");
        }
    }
    tracing::debug!(plugin = %identification, "output plugin loop ended");
}

/// Runs the extensions interested in the event and returns their values in
/// attachment order.
async fn run_extensions(
    plugin: &dyn OutputPlugin,
    extensions: &ExtensionSet,
    event: &Arc<Event>,
) -> Vec<Value> {
    let available: HashSet<String> = event
        .resources()
        .resource_ids()
        .into_iter()
        .filter(|id| id != COMPLETION_RESOURCE_ID)
        .collect();
    let candidates: Vec<Arc<dyn OutputExtension>> = extensions.read().clone();
    let selected: Vec<Arc<dyn OutputExtension>> = candidates
        .into_iter()
        .filter(|extension| {
            extension
                .resource_wishlist()
                .iter()
                .any(|wanted| available.contains(wanted))
        })
        .filter(|extension| extension.can_run(event))
        .collect();
    if selected.is_empty() {
        return Vec::new();
    }

    let argument = plugin.extension_argument(event);
    let mut tasks = JoinSet::new();
    for (index, extension) in selected.into_iter().enumerate() {
        let event = Arc::clone(event);
        let argument = argument.clone();
        tasks.spawn(async move {
            let outcome = AssertUnwindSafe(extension.generate(event, argument))
                .catch_unwind()
                .await;
            (index, extension, outcome)
        });
    }

    let mut results = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((index, extension, Ok(Ok(value)))) => {
                if extension.return_type().matches(&value) {
                    results.push((index, value));
                } else {
                    tracing::warn!(
                        extension = extension.id(),
                        declared = extension.return_type().name(),
                        "output extension returned a value of another type"
                    );
                }
            }
            Ok((_, extension, Ok(Err(err)))) => {
                tracing::warn!(extension = extension.id(), error = %err, "output extension failed");
            }
            Ok((_, extension, Err(_))) => {
                tracing::warn!(extension = extension.id(), "output extension panicked");
            }
            Err(err) => tracing::warn!(error = %err, "output extension task failed"),
        }
    }
    results.sort_by_key(|(index, _)| *index);
    results.into_iter().map(|(_, value)| value).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::ValueType;
    use izou_identity::Identifiable;
    use izou_model::PriorityPartition;
    use tokio::time::Instant;

    type Log = Arc<Mutex<Vec<String>>>;

    struct Recorder {
        id: &'static str,
        log: Log,
        hang: bool,
        receiving: ValueType,
        added: Mutex<Vec<String>>,
    }

    impl Recorder {
        fn new(id: &'static str, log: &Log) -> Self {
            Self {
                id,
                log: Arc::clone(log),
                hang: false,
                receiving: ValueType::any(),
                added: Mutex::new(Vec::new()),
            }
        }
    }

    impl Identifiable for Recorder {
        fn id(&self) -> &str {
            self.id
        }
    }

    #[async_trait]
    impl OutputPlugin for Recorder {
        fn receiving_type(&self) -> ValueType {
            self.receiving
        }

        fn output_extension_added(&self, extension: &Identification) {
            self.added.lock().push(extension.id().to_owned());
        }

        async fn render_final_output(
            &self,
            _event: Arc<Event>,
            results: Vec<Value>,
        ) -> Result<(), OutputError> {
            if self.hang {
                core::future::pending::<()>().await;
            }
            let mut entry = self.id.to_owned();
            for result in &results {
                if let Some(text) = result.downcast_ref::<String>() {
                    entry.push(':');
                    entry.push_str(text);
                }
            }
            self.log.lock().push(entry);
            Ok(())
        }
    }

    struct Shout {
        id: &'static str,
        plugin: &'static str,
        wishlist: &'static str,
        runnable: bool,
    }

    impl Identifiable for Shout {
        fn id(&self) -> &str {
            self.id
        }
    }

    #[async_trait]
    impl OutputExtension for Shout {
        fn plugin_id(&self) -> &str {
            self.plugin
        }

        fn resource_wishlist(&self) -> Vec<String> {
            vec![self.wishlist.to_owned()]
        }

        fn return_type(&self) -> ValueType {
            ValueType::of::<String>()
        }

        fn can_run(&self, _event: &Event) -> bool {
            self.runnable
        }

        async fn generate(
            &self,
            event: Arc<Event>,
            _argument: Option<Value>,
        ) -> Result<Value, OutputError> {
            let text = event
                .resources()
                .provide_resource(self.wishlist)
                .iter()
                .find_map(|resource| resource.payload::<&str>().copied())
                .unwrap_or_default()
                .to_uppercase();
            Ok(Arc::new(text))
        }
    }

    struct Counter;

    impl Identifiable for Counter {
        fn id(&self) -> &str {
            "counter"
        }
    }

    #[async_trait]
    impl OutputExtension for Counter {
        fn plugin_id(&self) -> &str {
            "typed"
        }

        fn resource_wishlist(&self) -> Vec<String> {
            vec!["R".into()]
        }

        fn return_type(&self) -> ValueType {
            ValueType::of::<u32>()
        }

        async fn generate(
            &self,
            _event: Arc<Event>,
            _argument: Option<Value>,
        ) -> Result<Value, OutputError> {
            Ok(Arc::new(1_u32))
        }
    }

    fn manager(timeout: Duration) -> (Arc<IdentificationManager>, OutputManager) {
        let registry = Arc::new(IdentificationManager::new());
        let manager = OutputManager::new(
            Arc::clone(&registry),
            OutputSettings::default().with_timeout(timeout),
        );
        (registry, manager)
    }

    struct Source;

    impl Identifiable for Source {
        fn id(&self) -> &str {
            "test.source"
        }
    }

    fn event(registry: &IdentificationManager) -> Event {
        registry.register(&Source);
        Event::new("1", registry.get_identification(&Source).unwrap())
    }

    #[tokio::test]
    async fn plugins_are_visited_in_bucket_order() {
        let (registry, manager) = manager(Duration::from_secs(5));
        let log = Log::default();
        for id in ["A", "B", "C"] {
            assert!(manager.add_output_plugin(Arc::new(Recorder::new(id, &log))));
        }
        let a = registry.get_identification_by_id("A").unwrap();
        let b = registry.get_identification_by_id("B").unwrap();

        let event = event(&registry).with_behavior(move |_: &[Identification]| {
            PriorityPartition::from([(5, vec![a.clone()]), (-1, vec![b.clone()])])
        });
        manager.pass_data_to_output_plugins(Arc::new(event)).await;

        assert_eq!(*log.lock(), ["A", "C", "B"]);
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_plugin_is_skipped_after_timeout() {
        let (registry, manager) = manager(Duration::from_millis(50));
        let log = Log::default();
        let mut slow = Recorder::new("slow", &log);
        slow.hang = true;
        manager.add_output_plugin(Arc::new(slow));
        manager.add_output_plugin(Arc::new(Recorder::new("fast", &log)));

        let started = Instant::now();
        let event = Arc::new(event(&registry));
        manager.pass_data_to_output_plugins(Arc::clone(&event)).await;

        assert!(started.elapsed() >= Duration::from_millis(50));
        assert_eq!(*log.lock(), ["fast"]);

        let signals = event.resources().provide_resource(COMPLETION_RESOURCE_ID);
        assert_eq!(signals.len(), 2);
        let armed: Vec<bool> = signals
            .iter()
            .filter_map(|resource| resource.payload::<CompletionSignal>())
            .map(CompletionSignal::is_armed)
            .collect();
        assert_eq!(armed, [true, false]);
    }

    #[tokio::test]
    async fn only_matching_runnable_extensions_contribute() {
        let (registry, manager) = manager(Duration::from_secs(5));
        let log = Log::default();
        let plugin = Arc::new(Recorder::new("P", &log));
        manager.add_output_plugin(plugin.clone());

        for (id, wishlist, runnable) in [("loud", "R", true), ("idle", "R", false), ("other", "X", true)] {
            let extension = Shout {
                id,
                plugin: "P",
                wishlist,
                runnable,
            };
            assert_eq!(manager.add_output_extension(Arc::new(extension)), Ok(true));
        }
        assert_eq!(*plugin.added.lock(), ["loud", "idle", "other"]);

        let event = event(&registry);
        event.resources().add_resource(Resource::new("R").with_payload("hi"));
        manager.pass_data_to_output_plugins(Arc::new(event)).await;

        assert_eq!(*log.lock(), ["P:HI"]);
    }

    #[tokio::test]
    async fn extension_with_incompatible_type_is_rejected() {
        let (_, manager) = manager(Duration::from_secs(5));
        let log = Log::default();
        let mut typed = Recorder::new("typed", &log);
        typed.receiving = ValueType::of::<String>();
        manager.add_output_plugin(Arc::new(typed));

        let result = manager.add_output_extension(Arc::new(Counter));
        assert!(matches!(
            result,
            Err(OutputError::TypeMismatch { ref extension, .. }) if extension == "counter"
        ));
    }

    #[tokio::test]
    async fn extension_waits_for_its_plugin() {
        let (registry, manager) = manager(Duration::from_secs(5));
        let log = Log::default();
        let shout = Shout {
            id: "loud",
            plugin: "P",
            wishlist: "R",
            runnable: true,
        };
        assert_eq!(manager.add_output_extension(Arc::new(shout)), Ok(true));

        let plugin = Arc::new(Recorder::new("P", &log));
        manager.add_output_plugin(plugin.clone());
        let id = registry.get_identification_by_id("P").unwrap();

        assert_eq!(manager.extensions_of(&id).len(), 1);
        assert_eq!(*plugin.added.lock(), ["loud"]);

        let again = Shout {
            id: "loud",
            plugin: "P",
            wishlist: "R",
            runnable: true,
        };
        assert_eq!(manager.add_output_extension(Arc::new(again)), Ok(false));

        let loud = registry.get_identification_by_id("loud").unwrap();
        manager.remove_output_extension(&loud).unwrap();
        assert!(manager.extensions_of(&id).is_empty());
        assert_eq!(
            manager.remove_output_extension(&loud),
            Err(OutputError::UnknownExtension(loud))
        );
    }

    #[tokio::test]
    async fn running_plugin_cannot_be_replaced_until_removed() {
        let (registry, manager) = manager(Duration::from_secs(5));
        let log = Log::default();
        assert!(manager.add_output_plugin(Arc::new(Recorder::new("P", &log))));
        assert!(!manager.add_output_plugin(Arc::new(Recorder::new("P", &log))));

        let id = registry.get_identification_by_id("P").unwrap();
        manager.remove_output_plugin(&id).unwrap();
        assert!(manager.output_plugin_ids().is_empty());
        assert_eq!(
            manager.remove_output_plugin(&id),
            Err(OutputError::UnknownPlugin(id))
        );
        assert!(manager.add_output_plugin(Arc::new(Recorder::new("P", &log))));
    }

    #[tokio::test]
    async fn completion_signals_do_not_select_extensions() {
        let (registry, manager) = manager(Duration::from_secs(5));
        let log = Log::default();
        manager.add_output_plugin(Arc::new(Recorder::new("P", &log)));
        let hungry = Shout {
            id: "hungry",
            plugin: "P",
            wishlist: COMPLETION_RESOURCE_ID,
            runnable: true,
        };
        assert_eq!(manager.add_output_extension(Arc::new(hungry)), Ok(true));

        manager
            .pass_data_to_output_plugins(Arc::new(event(&registry)))
            .await;

        assert_eq!(*log.lock(), ["P"]);
    }

    #[tokio::test(start_paused = true)]
    async fn removing_a_plugin_mid_event_releases_the_driver() {
        let (registry, manager) = manager(Duration::from_secs(100));
        let manager = Arc::new(manager);
        let log = Log::default();
        let mut stuck = Recorder::new("stuck", &log);
        stuck.hang = true;
        manager.add_output_plugin(Arc::new(stuck));
        manager.add_output_plugin(Arc::new(Recorder::new("next", &log)));

        let started = Instant::now();
        let event = Arc::new(event(&registry));
        let delivery = tokio::spawn({
            let manager = Arc::clone(&manager);
            let event = Arc::clone(&event);
            async move { manager.pass_data_to_output_plugins(event).await }
        });
        tokio::time::sleep(Duration::from_millis(10)).await;

        let stuck = registry.get_identification_by_id("stuck").unwrap();
        manager.remove_output_plugin(&stuck).unwrap();
        delivery.await.unwrap();

        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(*log.lock(), ["next"]);
        let armed: Vec<bool> = event
            .resources()
            .provide_resource(COMPLETION_RESOURCE_ID)
            .iter()
            .filter_map(|resource| resource.payload::<CompletionSignal>())
            .map(CompletionSignal::is_armed)
            .collect();
        assert_eq!(armed, [false, false]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrent_adds_register_one_extension_and_wire_it() {
        let runtime = tokio::runtime::Handle::current();
        for _ in 0..50 {
            let (registry, manager) = manager(Duration::from_secs(5));
            let log = Log::default();
            let barrier = std::sync::Barrier::new(3);

            let outcomes: Vec<Result<bool, OutputError>> = std::thread::scope(|scope| {
                let plugin = scope.spawn(|| {
                    let _entered = runtime.enter();
                    barrier.wait();
                    manager.add_output_plugin(Arc::new(Recorder::new("P", &log)))
                });
                let extensions: Vec<_> = (0..2)
                    .map(|_| {
                        scope.spawn(|| {
                            barrier.wait();
                            manager.add_output_extension(Arc::new(Shout {
                                id: "loud",
                                plugin: "P",
                                wishlist: "R",
                                runnable: true,
                            }))
                        })
                    })
                    .collect();
                assert!(plugin.join().unwrap());
                extensions
                    .into_iter()
                    .map(|handle| handle.join().unwrap())
                    .collect()
            });

            assert_eq!(outcomes.iter().filter(|outcome| **outcome == Ok(true)).count(), 1);
            let id = registry.get_identification_by_id("P").unwrap();
            assert_eq!(manager.extensions_of(&id).len(), 1);
        }
    }

    #[tokio::test]
    async fn components_cannot_share_an_id() {
        let (registry, manager) = manager(Duration::from_secs(5));
        let log = Log::default();
        assert!(manager.add_output_plugin(Arc::new(Recorder::new("P", &log))));

        let named_like_plugin = Shout {
            id: "P",
            plugin: "P",
            wishlist: "R",
            runnable: true,
        };
        assert_eq!(
            manager.add_output_extension(Arc::new(named_like_plugin)),
            Ok(false)
        );

        let holder = Source;
        assert!(registry.claim(&holder).is_some());
        assert!(!manager.add_output_plugin(Arc::new(Recorder::new("test.source", &log))));
        assert_eq!(manager.output_plugin_ids().len(), 1);
    }
}
