//! Error types for resource generation.

use izou_identity::Identification;

/// Errors raised by resource builders and the resource manager.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResourceError {
    /// A builder could not produce the requested resources.
    #[error("resource builder failed: {0}")]
    Failed(String),

    /// No builder with this identity is registered.
    #[error("unknown resource builder: {0}")]
    UnknownBuilder(Identification),
}
