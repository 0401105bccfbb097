//! Activator failure tiers.

use izou_identity::Identification;

/// Why an activator stopped, or why a supervisor call failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ActivatorError {
    /// The activator was refused access to something it needs. Restarted
    /// under the smaller permission ceiling.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// The activator crossed an authorization boundary. Never restarted.
    #[error("security violation: {0}")]
    Security(String),

    /// Ordinary failure. Restarted under the crash ceiling.
    #[error("activator failed: {0}")]
    Failed(String),

    /// The activator panicked. Counted as an ordinary failure.
    #[error("activator panicked")]
    Panicked,

    /// No activator with this identity is registered.
    #[error("unknown activator: {0}")]
    UnknownActivator(Identification),
}
