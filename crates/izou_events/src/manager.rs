//! Serialized event intake.
//!
//! The [`LocalEventManager`] owns a queue and a single worker task. Every
//! registered caller gets one slot: firing while the previous event from the
//! same caller has not finished dispatching fails with
//! [`EventError::MultipleEvents`] instead of queueing or blocking. The worker
//! takes one event at a time and finishes its dispatch before taking the
//! next, so dispatch starts are totally ordered. Resource generation and
//! output for an event run off the worker and may overlap later dispatches.

use core::fmt;
use core::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use hashbrown::HashMap;
use izou_identity::{IdentificationManager, Identification};
use izou_model::Event;
use parking_lot::Mutex;
use tokio::sync::{Notify, mpsc, watch};
use tokio::task::JoinHandle;

use crate::distributor::EventDistributor;
use crate::error::EventError;

// ─────────────────────────────────────────────────────────────────────────────
// Caller slots
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Default)]
struct CallerSlot {
    in_flight: AtomicBool,
    revoked: AtomicBool,
    idle: Notify,
}

/// Frees the caller's slot when the queued event is dropped, whether it was
/// dispatched or discarded on shutdown.
struct SlotGuard(Arc<CallerSlot>);

impl Drop for SlotGuard {
    fn drop(&mut self) {
        self.0.in_flight.store(false, Ordering::SeqCst);
        self.0.idle.notify_waiters();
    }
}

struct PendingEvent {
    event: Arc<Event>,
    _slot: SlotGuard,
}

struct Shared {
    queue: mpsc::UnboundedSender<PendingEvent>,
    stopped: AtomicBool,
}

// ─────────────────────────────────────────────────────────────────────────────
// EventCaller
// ─────────────────────────────────────────────────────────────────────────────

/// Capability to fire events on behalf of one registered component.
#[derive(Clone)]
pub struct EventCaller {
    identification: Identification,
    slot: Arc<CallerSlot>,
    shared: Arc<Shared>,
}

impl fmt::Debug for EventCaller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventCaller")
            .field("identification", &self.identification)
            .field("pending", &self.is_pending())
            .finish()
    }
}

impl EventCaller {
    /// Returns the identity this caller fires for.
    #[must_use]
    pub fn identification(&self) -> &Identification {
        &self.identification
    }

    /// Submits an event for dispatch.
    ///
    /// # Errors
    ///
    /// - [`EventError::MultipleEvents`] if the previous event from this caller
    ///   has not finished dispatching.
    /// - [`EventError::CallerUnregistered`] if the caller was unregistered.
    /// - [`EventError::Stopped`] if the event manager has stopped.
    pub fn fire(&self, event: impl Into<Arc<Event>>) -> Result<(), EventError> {
        if self.slot.revoked.load(Ordering::SeqCst) {
            return Err(EventError::CallerUnregistered(self.identification.clone()));
        }
        if self.shared.stopped.load(Ordering::SeqCst) {
            return Err(EventError::Stopped);
        }
        if self.slot.in_flight.swap(true, Ordering::SeqCst) {
            return Err(EventError::MultipleEvents(self.identification.clone()));
        }

        let pending = PendingEvent {
            event: event.into(),
            _slot: SlotGuard(Arc::clone(&self.slot)),
        };
        // A failed send hands the event back and drops it, which frees the slot.
        self.shared
            .queue
            .send(pending)
            .map_err(|_| EventError::Stopped)
    }

    /// Returns true while an event from this caller awaits or undergoes dispatch.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.slot.in_flight.load(Ordering::SeqCst)
    }

    /// Waits until this caller's last event has finished dispatching.
    pub async fn dispatched(&self) {
        loop {
            let notified = self.slot.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if !self.is_pending() {
                return;
            }
            notified.await;
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// LocalEventManager
// ─────────────────────────────────────────────────────────────────────────────

/// Single-consumer event queue in front of the [`EventDistributor`].
pub struct LocalEventManager {
    registry: Arc<IdentificationManager>,
    distributor: Arc<EventDistributor>,
    callers: Mutex<HashMap<Identification, Arc<CallerSlot>>>,
    shared: Arc<Shared>,
    receiver: Mutex<Option<mpsc::UnboundedReceiver<PendingEvent>>>,
    shutdown: watch::Sender<bool>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl fmt::Debug for LocalEventManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalEventManager")
            .field("callers", &self.callers.lock().len())
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

impl LocalEventManager {
    /// Creates a stopped manager feeding `distributor`.
    ///
    /// Events fired before [`start`](Self::start) wait in the queue.
    #[must_use]
    pub fn new(registry: Arc<IdentificationManager>, distributor: Arc<EventDistributor>) -> Self {
        let (queue, receiver) = mpsc::unbounded_channel();
        let (shutdown, _) = watch::channel(false);
        Self {
            registry,
            distributor,
            callers: Mutex::new(HashMap::new()),
            shared: Arc::new(Shared {
                queue,
                stopped: AtomicBool::new(false),
            }),
            receiver: Mutex::new(Some(receiver)),
            shutdown,
            worker: Mutex::new(None),
        }
    }

    /// Returns the distributor events are handed to.
    #[must_use]
    pub fn distributor(&self) -> &Arc<EventDistributor> {
        &self.distributor
    }

    /// Issues a caller capability for a registered component.
    ///
    /// Returns `None` if the identity is unknown to the registry, was only
    /// looked up by ID rather than issued from the component, or already has
    /// a caller.
    pub fn register_caller(&self, identification: &Identification) -> Option<EventCaller> {
        if !identification.created_from_instance()
            || !self.registry.is_registered(identification.id())
        {
            tracing::warn!(caller = %identification, "refused to issue event caller");
            return None;
        }

        let mut callers = self.callers.lock();
        if callers.contains_key(identification) {
            tracing::debug!(caller = %identification, "caller already registered");
            return None;
        }

        let slot = Arc::new(CallerSlot::default());
        callers.insert(identification.clone(), Arc::clone(&slot));
        tracing::debug!(caller = %identification, "registered event caller");

        Some(EventCaller {
            identification: identification.clone(),
            slot,
            shared: Arc::clone(&self.shared),
        })
    }

    /// Revokes a caller. Later `fire` calls on its capability fail.
    ///
    /// An event already queued by the caller is still dispatched.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::UnknownCaller`] if no caller is registered for
    /// the identity.
    pub fn unregister_caller(&self, identification: &Identification) -> Result<(), EventError> {
        let slot = self
            .callers
            .lock()
            .remove(identification)
            .ok_or_else(|| EventError::UnknownCaller(identification.clone()))?;
        slot.revoked.store(true, Ordering::SeqCst);
        tracing::debug!(caller = %identification, "unregistered event caller");
        Ok(())
    }

    /// Starts the dispatch worker on the current tokio runtime.
    ///
    /// Returns `false` if the worker was already started.
    pub fn start(&self) -> bool {
        let Some(mut receiver) = self.receiver.lock().take() else {
            return false;
        };
        let distributor = Arc::clone(&self.distributor);
        let mut shutdown = self.shutdown.subscribe();

        let handle = tokio::spawn(async move {
            tracing::debug!("event dispatch loop started");
            loop {
                let stopped = *shutdown.borrow_and_update();
                if stopped {
                    break;
                }
                tokio::select! {
                    biased;
                    _ = shutdown.changed() => continue,
                    pending = receiver.recv() => {
                        let Some(pending) = pending else {
                            break;
                        };
                        distributor.dispatch(Arc::clone(&pending.event));
                        drop(pending);
                    }
                }
            }
            tracing::debug!("event dispatch loop stopped");
        });

        *self.worker.lock() = Some(handle);
        true
    }

    /// Returns true while the dispatch worker is running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.worker
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Asks the worker to stop after the dispatch in progress.
    ///
    /// Callers are refused from now on. Queued events are discarded.
    pub fn stop(&self) {
        self.shared.stopped.store(true, Ordering::SeqCst);
        self.shutdown.send_replace(true);
    }

    /// Stops the worker and waits for it to exit.
    pub async fn shutdown(&self) {
        self.stop();
        let handle = self.worker.lock().take();
        if let Some(handle) = handle
            && let Err(err) = handle.await
        {
            tracing::error!(error = %err, "event dispatch loop ended abnormally");
        }
    }
}
