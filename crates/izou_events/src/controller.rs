//! Dispatch gates.

use izou_identity::Identifiable;
use izou_model::Event;

/// A gate that can veto the dispatch of an event.
///
/// Controllers run on the dispatch worker before anything else happens to an
/// event, so they must return quickly. If any registered controller returns
/// `false`, no listener runs and no resources are generated for that event.
pub trait EventsController: Identifiable {
    /// Returns `false` to suppress dispatch of `event`.
    fn control_event_dispatcher(&self, event: &Event) -> bool;
}
