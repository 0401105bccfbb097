//! Restart supervision.

use core::fmt;
use core::sync::atomic::{AtomicU32, Ordering};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use hashbrown::HashMap;
use izou_identity::{Identification, IdentificationManager};
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::activator::Activator;
use crate::error::ActivatorError;

/// Restart ceilings for an [`ActivatorManager`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SupervisorSettings {
    /// Restarts allowed after ordinary failures.
    pub max_crashes: u32,
    /// Restarts allowed after permission denials.
    pub max_permission_denials: u32,
}

impl Default for SupervisorSettings {
    fn default() -> Self {
        Self {
            max_crashes: 100,
            max_permission_denials: 2,
        }
    }
}

impl SupervisorSettings {
    /// Sets the ordinary crash ceiling.
    #[must_use]
    pub fn with_max_crashes(mut self, max_crashes: u32) -> Self {
        self.max_crashes = max_crashes;
        self
    }

    /// Sets the permission denial ceiling.
    #[must_use]
    pub fn with_max_permission_denials(mut self, max_permission_denials: u32) -> Self {
        self.max_permission_denials = max_permission_denials;
        self
    }
}

/// Lifecycle of a supervised activator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActivatorState {
    /// Registered, waiting for its first run.
    Submitted,
    /// `call` is executing.
    Running,
    /// `call` ended and will be run again.
    Restarting,
    /// Stopped for good, deliberately or after a security violation.
    Finished,
    /// Stopped after exceeding a restart ceiling.
    GaveUp,
    /// Cancelled by `remove_activator`.
    Removed,
}

impl ActivatorState {
    /// Returns true if the activator will not run again.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished | Self::GaveUp | Self::Removed)
    }
}

#[derive(Debug, Default)]
struct Counters {
    crashes: AtomicU32,
    permission_denials: AtomicU32,
}

impl Counters {
    fn clear(&self) {
        self.crashes.store(0, Ordering::SeqCst);
        self.permission_denials.store(0, Ordering::SeqCst);
    }
}

struct Supervised {
    activator: Arc<dyn Activator>,
    state: Arc<watch::Sender<ActivatorState>>,
    counters: Arc<Counters>,
    task: JoinHandle<()>,
}

/// Once `Removed` is published nothing overrides it.
fn publish(state: &watch::Sender<ActivatorState>, next: ActivatorState) {
    state.send_if_modified(|current| {
        if *current == ActivatorState::Removed || *current == next {
            return false;
        }
        *current = next;
        true
    });
}

// ─────────────────────────────────────────────────────────────────────────────
// ActivatorManager
// ─────────────────────────────────────────────────────────────────────────────

/// Runs activators and restarts them within their ceilings.
pub struct ActivatorManager {
    registry: Arc<IdentificationManager>,
    settings: SupervisorSettings,
    activators: Mutex<HashMap<Identification, Supervised>>,
}

impl fmt::Debug for ActivatorManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let activators = self.activators.lock();
        f.debug_struct("ActivatorManager")
            .field("settings", &self.settings)
            .field(
                "activators",
                &activators
                    .iter()
                    .map(|(id, supervised)| (id.id(), *supervised.state.borrow()))
                    .collect::<Vec<_>>(),
            )
            .finish_non_exhaustive()
    }
}

impl ActivatorManager {
    /// Creates a manager without activators.
    #[must_use]
    pub fn new(registry: Arc<IdentificationManager>, settings: SupervisorSettings) -> Self {
        Self {
            registry,
            settings,
            activators: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the manager's settings.
    #[must_use]
    pub fn settings(&self) -> SupervisorSettings {
        self.settings
    }

    /// Registers an activator and submits its first run.
    ///
    /// A previous activator under the same ID is replaced once it reached a
    /// terminal state. Returns `false` if its predecessor is still live, or if
    /// the activator's ID is empty or held by another component.
    pub fn add_activator(&self, activator: Arc<dyn Activator>) -> bool {
        let mut activators = self.activators.lock();
        if let Some(existing) = self.registry.get_identification_by_id(activator.id())
            && let Some(previous) = activators.get(&existing)
        {
            if !previous.state.borrow().is_terminal() {
                tracing::debug!(activator = %existing, "activator is already running");
                return false;
            }
            if let Some(previous) = activators.remove(&existing) {
                self.registry.release(previous.activator.as_ref());
            }
        }
        let Some(identification) = self.registry.claim(activator.as_ref()) else {
            tracing::warn!(activator = activator.id(), "activator ID is empty or taken");
            return false;
        };

        let (state, _) = watch::channel(ActivatorState::Submitted);
        let state = Arc::new(state);
        let counters = Arc::new(Counters::default());
        let task = tokio::spawn(supervise(
            Arc::clone(&activator),
            identification.clone(),
            self.settings,
            Arc::clone(&state),
            Arc::clone(&counters),
        ));
        activators.insert(
            identification.clone(),
            Supervised {
                activator,
                state,
                counters,
                task,
            },
        );

        tracing::debug!(activator = %identification, "submitted activator");
        true
    }

    /// Cancels an activator, forgets its counters and frees its ID.
    ///
    /// # Errors
    ///
    /// Returns [`ActivatorError::UnknownActivator`] if no such activator is
    /// registered.
    pub fn remove_activator(&self, identification: &Identification) -> Result<(), ActivatorError> {
        let supervised = self
            .activators
            .lock()
            .remove(identification)
            .ok_or_else(|| ActivatorError::UnknownActivator(identification.clone()))?;

        supervised.task.abort();
        supervised.counters.clear();
        supervised.state.send_replace(ActivatorState::Removed);
        self.registry.release(supervised.activator.as_ref());
        tracing::debug!(activator = %identification, "removed activator");
        Ok(())
    }

    /// Returns the registered activators.
    #[must_use]
    pub fn activator_ids(&self) -> Vec<Identification> {
        self.activators.lock().keys().cloned().collect()
    }

    /// Returns an activator's current state.
    #[must_use]
    pub fn state(&self, identification: &Identification) -> Option<ActivatorState> {
        self.activators
            .lock()
            .get(identification)
            .map(|supervised| *supervised.state.borrow())
    }

    /// Subscribes to an activator's state changes.
    #[must_use]
    pub fn subscribe(
        &self,
        identification: &Identification,
    ) -> Option<watch::Receiver<ActivatorState>> {
        self.activators
            .lock()
            .get(identification)
            .map(|supervised| supervised.state.subscribe())
    }

    /// Returns how often an activator crashed.
    #[must_use]
    pub fn crash_count(&self, identification: &Identification) -> Option<u32> {
        self.activators
            .lock()
            .get(identification)
            .map(|supervised| supervised.counters.crashes.load(Ordering::SeqCst))
    }

    /// Returns how often an activator was denied permission.
    #[must_use]
    pub fn permission_denial_count(&self, identification: &Identification) -> Option<u32> {
        self.activators
            .lock()
            .get(identification)
            .map(|supervised| supervised.counters.permission_denials.load(Ordering::SeqCst))
    }

    /// Cancels every activator.
    pub fn shutdown(&self) {
        for (identification, supervised) in self.activators.lock().drain() {
            supervised.task.abort();
            supervised.state.send_replace(ActivatorState::Removed);
            self.registry.release(supervised.activator.as_ref());
            tracing::trace!(activator = %identification, "cancelled activator");
        }
    }
}

impl Drop for ActivatorManager {
    fn drop(&mut self) {
        self.shutdown();
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Supervision loop
// ─────────────────────────────────────────────────────────────────────────────

async fn supervise(
    activator: Arc<dyn Activator>,
    identification: Identification,
    settings: SupervisorSettings,
    state: Arc<watch::Sender<ActivatorState>>,
    counters: Arc<Counters>,
) {
    loop {
        publish(&state, ActivatorState::Running);
        let outcome = AssertUnwindSafe(activator.call())
            .catch_unwind()
            .await
            .unwrap_or(Err(ActivatorError::Panicked));

        let (counter, ceiling) = match outcome {
            Ok(false) => {
                tracing::debug!(activator = %identification, "activator finished");
                publish(&state, ActivatorState::Finished);
                return;
            }
            Ok(true) => (&counters.crashes, settings.max_crashes),
            Err(err) => {
                let restart = std::panic::catch_unwind(AssertUnwindSafe(|| {
                    activator.terminated(&err)
                }))
                .unwrap_or(false);

                match err {
                    ActivatorError::Security(_) => {
                        tracing::error!(
                            activator = %identification,
                            error = %err,
                            "activator violated a security boundary, not restarting"
                        );
                        publish(&state, ActivatorState::Finished);
                        return;
                    }
                    _ if !restart => {
                        tracing::debug!(
                            activator = %identification,
                            error = %err,
                            "activator declined restart"
                        );
                        publish(&state, ActivatorState::Finished);
                        return;
                    }
                    ActivatorError::PermissionDenied(_) => {
                        tracing::warn!(activator = %identification, error = %err, "activator denied permission");
                        (&counters.permission_denials, settings.max_permission_denials)
                    }
                    _ => {
                        tracing::warn!(activator = %identification, error = %err, "activator crashed");
                        (&counters.crashes, settings.max_crashes)
                    }
                }
            }
        };

        let count = counter.fetch_add(1, Ordering::SeqCst) + 1;
        if count > ceiling {
            tracing::error!(
                activator = %identification,
                restarts = ceiling,
                "activator exceeded its restart ceiling, giving up"
            );
            publish(&state, ActivatorState::GaveUp);
            return;
        }

        tracing::warn!(activator = %identification, attempt = count, "restarting activator");
        publish(&state, ActivatorState::Restarting);
    }
}
