//! The output extension role.

use std::sync::Arc;

use async_trait::async_trait;
use izou_identity::Identifiable;
use izou_model::Event;

use crate::error::OutputError;
use crate::value::{Value, ValueType};

/// Turns the resources of an event into an intermediate value for one plugin.
#[async_trait]
pub trait OutputExtension: Identifiable {
    /// ID of the output plugin this extension belongs to.
    fn plugin_id(&self) -> &str;

    /// Resource IDs this extension can work with.
    ///
    /// The extension is considered for an event only if the event carries at
    /// least one of them.
    fn resource_wishlist(&self) -> Vec<String>;

    /// Type of the value returned by [`generate`](Self::generate).
    fn return_type(&self) -> ValueType;

    /// Type of the argument this extension accepts from its plugin.
    fn argument_type(&self) -> ValueType {
        ValueType::any()
    }

    /// Returns false to skip this event.
    fn can_run(&self, _event: &Event) -> bool {
        true
    }

    /// Produces this extension's value for the event.
    async fn generate(
        &self,
        event: Arc<Event>,
        argument: Option<Value>,
    ) -> Result<Value, OutputError>;
}
