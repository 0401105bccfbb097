//! Configuration errors.

/// Errors raised while loading or validating an [`IzouConfig`](crate::IzouConfig).
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The configuration text is not valid JSON of the expected shape.
    #[error("invalid configuration: {0}")]
    Parse(#[from] serde_json::Error),

    /// A field has a value the runtime cannot work with.
    #[error("invalid value for '{field}': {reason}")]
    Invalid {
        /// Name of the offending field.
        field: &'static str,
        /// What is wrong with it.
        reason: &'static str,
    },
}
