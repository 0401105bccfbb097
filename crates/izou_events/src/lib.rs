//! Event intake and dispatch for Izou.
//!
//! Events enter the system through an [`EventCaller`] issued by the
//! [`LocalEventManager`]. A single worker task takes them off the queue one at
//! a time and hands each to the [`EventDistributor`], which:
//!
//! 1. asks every [`EventsController`] whether the event may be dispatched
//!    (any `false` vetoes it entirely),
//! 2. runs the pre-dispatch [`DispatchHooks`],
//! 3. notifies every [`EventListener`] registered for one of the event's topics,
//! 4. runs the post-dispatch hooks,
//! 5. on a separate task, generates resources through its
//!    [`ResourceGenerator`], attaches them to the event and hands the event
//!    to its [`OutputSink`].
//!
//! The worker only waits for steps 1 to 4, so a slow builder never holds up
//! the next event.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use izou_events::{EventDistributor, LocalEventManager};
//! use izou_identity::{Identifiable, IdentificationManager};
//! use izou_model::Event;
//!
//! struct Doorbell;
//!
//! impl Identifiable for Doorbell {
//!     fn id(&self) -> &str {
//!         "demo.activator"
//!     }
//! }
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let registry = Arc::new(IdentificationManager::new());
//! let distributor = Arc::new(EventDistributor::new(Arc::clone(&registry)));
//! let manager = LocalEventManager::new(Arc::clone(&registry), distributor);
//! manager.start();
//!
//! let doorbell = Doorbell;
//! let source = registry.claim(&doorbell).unwrap();
//! let caller = manager.register_caller(&source).unwrap();
//! caller.fire(Event::new("response", source)).unwrap();
//!
//! manager.shutdown().await;
//! # }
//! ```

mod controller;
mod distributor;
mod error;
mod hooks;
mod listener;
mod manager;
mod stage;

pub use controller::EventsController;
pub use distributor::{DispatchOutcome, EventDistributor};
pub use error::EventError;
pub use hooks::{DispatchHooks, DispatchPhase, HookRegistrationError};
pub use listener::EventListener;
pub use manager::{EventCaller, LocalEventManager};
pub use stage::{OutputSink, ResourceGenerator};
