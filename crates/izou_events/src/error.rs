//! Error types for event intake and dispatch.

use izou_identity::Identification;

/// Errors returned to callers of the event API.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EventError {
    /// The caller already has an event waiting to be dispatched.
    #[error("caller '{0}' already has an event in flight")]
    MultipleEvents(Identification),

    /// The caller's capability was revoked.
    #[error("caller '{0}' is no longer registered")]
    CallerUnregistered(Identification),

    /// The event manager has shut down and accepts no more events.
    #[error("event manager is stopped")]
    Stopped,

    /// No caller is registered under this identity.
    #[error("unknown caller: {0}")]
    UnknownCaller(Identification),

    /// No listener with this identity is registered for the topic.
    #[error("no listener '{listener}' registered for topic '{topic}'")]
    UnknownListener {
        /// The topic the listener was expected under.
        topic: String,
        /// The listener's identity.
        listener: Identification,
    },

    /// No controller with this identity is registered.
    #[error("unknown events controller: {0}")]
    UnknownController(Identification),
}
