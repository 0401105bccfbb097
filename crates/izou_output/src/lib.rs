//! Output delivery for Izou.
//!
//! An [`OutputPlugin`] renders events through a set of [`OutputExtension`]s
//! attached to it. The [`OutputManager`] owns one run loop per plugin and
//! delivers every event to the plugins in priority order:
//!
//! 1. The event's behavior controller sorts the plugins into priority
//!    buckets (see [`izou_model::resolve_delivery_order`]).
//! 2. For each plugin in turn, a [`CompletionSignal`] resource addressed to
//!    the plugin is attached to the event and the event is queued on the
//!    plugin's run loop.
//! 3. The driver waits until the run loop fires the signal or the output
//!    timeout expires, then moves on to the next plugin.
//!
//! The run loop selects the extensions whose resource wishlist matches the
//! event, runs those that report they can run, and hands the merged results
//! to [`OutputPlugin::render_final_output`].

mod error;
mod extension;
mod manager;
mod plugin;
mod signal;
mod value;

pub use error::OutputError;
pub use extension::OutputExtension;
pub use manager::{OutputManager, OutputSettings};
pub use plugin::OutputPlugin;
pub use signal::{COMPLETION_RESOURCE_ID, CompletionSignal};
pub use value::{Value, ValueType};
