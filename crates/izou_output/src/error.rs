//! Error types for output delivery.

use izou_identity::Identification;

/// Errors raised by output plugins, extensions and the output manager.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OutputError {
    /// An extension's types do not fit the plugin it declares.
    #[error(
        "extension '{extension}' does not fit plugin '{plugin}': expected {expected}, found {found}"
    )]
    TypeMismatch {
        /// The extension's ID.
        extension: String,
        /// The plugin the extension declared.
        plugin: String,
        /// The type the receiving side accepts.
        expected: &'static str,
        /// The type the providing side offers.
        found: &'static str,
    },

    /// No output plugin with this identity is registered.
    #[error("unknown output plugin: {0}")]
    UnknownPlugin(Identification),

    /// No output extension with this identity is registered.
    #[error("unknown output extension: {0}")]
    UnknownExtension(Identification),

    /// An extension or a plugin's final render failed.
    #[error("output failed: {0}")]
    Failed(String),
}
