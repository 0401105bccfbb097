//! A runtime for add-ons that talk through events and resources.
//!

pub use izou_internal::*;

/// Re-export all common types for easy access.
pub mod prelude {
    pub use izou_internal::prelude::*;
}
