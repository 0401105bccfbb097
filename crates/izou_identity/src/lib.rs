//! Component identities for Izou.
//!
//! Every addressable component (activators, output plugins, output extensions,
//! resource builders, controllers) declares a stable string ID through the
//! [`Identifiable`] trait. The [`IdentificationManager`] keeps the set of
//! registered IDs and issues [`Identification`] handles for them.
//!
//! # Provenance
//!
//! A handle obtained from the owning instance
//! ([`IdentificationManager::get_identification`]) is marked as
//! *created from instance*. A handle looked up by a bare string
//! ([`IdentificationManager::get_identification_by_id`]) is not. Permission
//! checks downstream use this flag to decide how far to trust the handle.
//!
//! Managers [`claim`](IdentificationManager::claim) each component they
//! accept. A claimed ID cannot be taken by a second instance, and lookups from
//! such an instance come back untrusted.
//!
//! # Example
//!
//! ```
//! use izou_identity::{Identifiable, IdentificationManager};
//!
//! struct Clock;
//!
//! impl Identifiable for Clock {
//!     fn id(&self) -> &str {
//!         "demo.clock"
//!     }
//! }
//!
//! let registry = IdentificationManager::new();
//! assert!(registry.register(&Clock));
//! assert!(!registry.register(&Clock));
//!
//! let owned = registry.get_identification(&Clock).unwrap();
//! let looked_up = registry.get_identification_by_id("demo.clock").unwrap();
//! assert_eq!(owned, looked_up);
//! assert!(owned.created_from_instance());
//! assert!(!looked_up.created_from_instance());
//! ```

mod identification;
mod registry;

pub use identification::{Identifiable, Identification};
pub use registry::IdentificationManager;
