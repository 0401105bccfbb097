//! Data interchange types for Izou.
//!
//! - [`resource`] - The immutable [`Resource`] value and the
//!   [`ResourceContainer`] attached to every event
//! - [`event`] - The [`Event`] signal carrying topics and resources
//! - [`behavior`] - Output priority partitions supplied by event creators
//!
//! # Example
//!
//! ```
//! use izou_identity::{Identifiable, IdentificationManager};
//! use izou_model::{Event, Resource};
//!
//! struct Station;
//!
//! impl Identifiable for Station {
//!     fn id(&self) -> &str {
//!         "demo.source"
//!     }
//! }
//!
//! let registry = IdentificationManager::new();
//! let source = registry.claim(&Station).unwrap();
//!
//! let request = Resource::new("weather.today");
//! let filled = request.with_payload(String::from("sunny"));
//! assert!(request.is_request());
//! assert_eq!(filled.payload::<String>().unwrap(), "sunny");
//!
//! let event = Event::new("response", source).with_descriptor("weather");
//! event.resources().add_resource(filled);
//! assert!(event.resources().contains_resource("weather.today"));
//! ```

/// Output priority partitions.
pub mod behavior;

/// The event signal.
pub mod event;

/// The resource value and its container.
pub mod resource;

pub use behavior::{BehaviorController, PriorityPartition, resolve_delivery_order};
pub use event::{Event, event_types};
pub use resource::{Payload, Resource, ResourceContainer};
