//! Topic listeners.

use std::sync::Arc;

use izou_identity::Identifiable;
use izou_model::Event;

/// Receives events for the topics it was registered under.
///
/// Called on the dispatch worker before resource generation starts, so the
/// event's container holds only what its creator attached. Generated
/// resources are added later on a separate task. A listener registered under
/// several topics of the same event is notified once.
pub trait EventListener: Identifiable {
    /// Called when a matching event is dispatched.
    fn event_fired(&self, event: &Arc<Event>);
}
