//! Downstream stages the distributor feeds.
//!
//! The distributor does not know about resource builders or output plugins.
//! It talks to them through these two traits, which the resource manager and
//! the output manager implement.

use std::sync::Arc;

use async_trait::async_trait;
use izou_model::{Event, Resource};

/// Produces the resources an event asks for.
#[async_trait]
pub trait ResourceGenerator: Send + Sync {
    /// Generates every resource subscribed to the event's topics.
    ///
    /// Implementations bound their own latency; whatever is not ready in time
    /// is left out of the result.
    async fn generate_resources(&self, event: &Arc<Event>) -> Vec<Resource>;
}

/// Receives fully dispatched events for rendering.
#[async_trait]
pub trait OutputSink: Send + Sync {
    /// Delivers the event to the output side.
    async fn pass_data_to_output_plugins(&self, event: Arc<Event>);
}
