//! Activator supervision for Izou.
//!
//! An [`Activator`] is a long-running loop that watches something outside
//! the process and fires events when it changes. The [`ActivatorManager`]
//! runs every activator on its own task and restarts it when it stops:
//!
//! | Outcome of `call()` | Effect |
//! |---------------------|--------|
//! | `Ok(false)` | finished for good |
//! | `Ok(true)`, `Err(Failed)`, panic | crash counter +1, restart |
//! | `Err(PermissionDenied)` | permission counter +1, restart |
//! | `Err(Security)` | finished for good |
//!
//! Once a counter passes its ceiling the activator is given up on.

mod activator;
mod error;
mod supervisor;

pub use activator::Activator;
pub use error::ActivatorError;
pub use supervisor::{ActivatorManager, ActivatorState, SupervisorSettings};
