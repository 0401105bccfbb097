//! The Izou process root.
//!
//! [`Izou`] owns the identification registry and every manager, wires them
//! into one pipeline and loads [`AddOn`]s into it:
//!
//! ```text
//! Activator ──fire──▶ LocalEventManager ──▶ EventDistributor
//!                                             │  controllers (veto)
//!                                             │  ResourceManager (builders)
//!                                             │  listeners
//!                                             ▼
//!                                           OutputManager ──▶ plugins ──▶ extensions
//! ```

mod addon;
mod error;
mod izou;

pub use addon::{AddOn, AddOnContext, AddOnReport};
pub use error::AddOnError;
pub use izou::Izou;
