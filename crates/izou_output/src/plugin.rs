//! The output plugin role.

use std::sync::Arc;

use async_trait::async_trait;
use izou_identity::{Identifiable, Identification};
use izou_model::Event;

use crate::error::OutputError;
use crate::value::{Value, ValueType};

/// Renders events using the results of its extensions.
///
/// The output manager runs a loop per plugin. For each event queued to the
/// plugin it runs the matching extensions, then calls
/// [`render_final_output`](Self::render_final_output) with their results.
#[async_trait]
pub trait OutputPlugin: Identifiable {
    /// Type of the values this plugin consumes from its extensions.
    fn receiving_type(&self) -> ValueType {
        ValueType::any()
    }

    /// Type of the argument this plugin hands to its extensions.
    fn argument_type(&self) -> ValueType {
        ValueType::any()
    }

    /// Builds the argument passed to every extension for this event.
    fn extension_argument(&self, _event: &Event) -> Option<Value> {
        None
    }

    /// Called after an extension was attached to this plugin.
    fn output_extension_added(&self, _extension: &Identification) {}

    /// Called after an extension was detached from this plugin.
    fn output_extension_removed(&self, _extension: &Identification) {}

    /// Produces the final output for one event.
    ///
    /// `results` holds the values of the extensions that ran, in the order
    /// they were attached.
    async fn render_final_output(
        &self,
        event: Arc<Event>,
        results: Vec<Value>,
    ) -> Result<(), OutputError>;
}
