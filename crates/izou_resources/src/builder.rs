//! The resource builder role.

use std::sync::Arc;

use async_trait::async_trait;
use izou_identity::Identifiable;
use izou_model::{Event, Resource};

use crate::error::ResourceError;

/// Produces resources on demand or in response to events.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use async_trait::async_trait;
/// use izou_identity::Identifiable;
/// use izou_model::{Event, Resource};
/// use izou_resources::{ResourceBuilder, ResourceError};
///
/// struct Clock;
///
/// impl Identifiable for Clock {
///     fn id(&self) -> &str {
///         "demo.clock"
///     }
/// }
///
/// #[async_trait]
/// impl ResourceBuilder for Clock {
///     fn announce_resources(&self) -> Vec<Resource> {
///         vec![Resource::new("time")]
///     }
///
///     fn announce_events(&self) -> Vec<String> {
///         vec!["morning".into()]
///     }
///
///     async fn provide_resource(
///         &self,
///         requested: Vec<Resource>,
///         _event: Option<Arc<Event>>,
///     ) -> Result<Vec<Resource>, ResourceError> {
///         Ok(requested.iter().map(|r| r.with_payload("07:00")).collect())
///     }
/// }
/// ```
#[async_trait]
pub trait ResourceBuilder: Identifiable {
    /// Returns the resources this builder can produce, as empty requests.
    fn announce_resources(&self) -> Vec<Resource>;

    /// Returns the event topics that trigger this builder.
    fn announce_events(&self) -> Vec<String>;

    /// Produces resources for the given requests.
    ///
    /// `event` is `Some` when generation was triggered by an event and `None`
    /// for direct requests.
    async fn provide_resource(
        &self,
        requested: Vec<Resource>,
        event: Option<Arc<Event>>,
    ) -> Result<Vec<Resource>, ResourceError>;
}
