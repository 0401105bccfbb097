//! # Izou Internal Library
//!
//! Re-exports the Izou crates for convenience.

/// Component identities and the registry that issues them.
pub use izou_identity;

/// Events, resources and output priorities.
pub use izou_model;

/// Event intake and dispatch.
pub use izou_events;

/// Resource builders and generation.
pub use izou_resources;

/// Output plugins and extensions.
pub use izou_output;

/// Activator supervision.
pub use izou_activator;

/// Configuration and tracing setup.
pub use izou_core;

/// The process root and add-on loading.
pub use izou_runtime;

/// Re-export all common types for easy access.
pub mod prelude {
    pub use izou_activator::{Activator, ActivatorError, ActivatorState};
    pub use izou_core::{IzouConfig, TracingFormat, TracingSetup};
    pub use izou_events::{EventCaller, EventError, EventListener, EventsController};
    pub use izou_identity::{Identifiable, Identification, IdentificationManager};
    pub use izou_model::{BehaviorController, Event, PriorityPartition, Resource, event_types};
    pub use izou_output::{OutputError, OutputExtension, OutputPlugin, Value, ValueType};
    pub use izou_resources::{ResourceBuilder, ResourceError};
    pub use izou_runtime::{AddOn, AddOnContext, AddOnError, Izou};
}
