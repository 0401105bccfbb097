//! Completion handshake between the delivery driver and a plugin run loop.

use core::fmt;

use izou_identity::Identification;
use izou_model::Event;
use parking_lot::Mutex;
use tokio::sync::oneshot;

/// Resource ID under which completion signals travel in an event.
pub const COMPLETION_RESOURCE_ID: &str = "izou.output.completion";

/// One-shot "done" callback attached to an event for one output plugin.
///
/// The signal is the payload of a resource with ID
/// [`COMPLETION_RESOURCE_ID`] whose consumer is the plugin.
pub struct CompletionSignal {
    sender: Mutex<Option<oneshot::Sender<()>>>,
}

impl fmt::Debug for CompletionSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompletionSignal")
            .field("armed", &self.is_armed())
            .finish()
    }
}

impl CompletionSignal {
    pub(crate) fn new(sender: oneshot::Sender<()>) -> Self {
        Self {
            sender: Mutex::new(Some(sender)),
        }
    }

    /// Fires the signal.
    ///
    /// Returns `false` if it was already fired or nobody is waiting anymore.
    pub fn complete(&self) -> bool {
        self.sender
            .lock()
            .take()
            .is_some_and(|sender| sender.send(()).is_ok())
    }

    /// Drops the signal without firing it.
    ///
    /// Returns `false` if it was already fired or dropped.
    pub(crate) fn disarm(&self) -> bool {
        self.sender.lock().take().is_some()
    }

    /// Returns true until the signal has been fired or dropped.
    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.sender.lock().is_some()
    }
}

/// Fires the oldest armed signal addressed to `plugin`.
pub(crate) fn signal_completion(event: &Event, plugin: &Identification) -> bool {
    event
        .resources()
        .resources_for_consumer(plugin)
        .iter()
        .filter(|resource| resource.resource_id() == COMPLETION_RESOURCE_ID)
        .filter_map(|resource| resource.payload::<CompletionSignal>())
        .find(|signal| signal.is_armed())
        .is_some_and(CompletionSignal::complete)
}
