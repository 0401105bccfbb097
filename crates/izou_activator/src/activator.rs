//! The activator role.

use async_trait::async_trait;
use izou_identity::Identifiable;

use crate::error::ActivatorError;

/// A background loop that fires events in response to the outside world.
///
/// # Example
///
/// ```
/// use async_trait::async_trait;
/// use izou_activator::{Activator, ActivatorError};
/// use izou_identity::Identifiable;
///
/// struct Once;
///
/// impl Identifiable for Once {
///     fn id(&self) -> &str {
///         "demo.once"
///     }
/// }
///
/// #[async_trait]
/// impl Activator for Once {
///     async fn call(&self) -> Result<bool, ActivatorError> {
///         // fire an event, then stop for good
///         Ok(false)
///     }
/// }
/// ```
#[async_trait]
pub trait Activator: Identifiable {
    /// Runs the activator's loop.
    ///
    /// Return `Ok(false)` to stop permanently. `Ok(true)` and errors ask the
    /// supervisor for a restart.
    async fn call(&self) -> Result<bool, ActivatorError>;

    /// Called after `call` failed, before the supervisor restarts it.
    ///
    /// Returning `false` suppresses the restart.
    fn terminated(&self, _error: &ActivatorError) -> bool {
        true
    }
}
