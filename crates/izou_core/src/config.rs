//! Runtime configuration.

use core::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::tracing_setup::TracingSetup;

/// Timeouts and restart ceilings for an Izou process.
///
/// Durations are read and written as whole milliseconds:
///
/// ```
/// use core::time::Duration;
/// use izou_core::IzouConfig;
///
/// let config = IzouConfig::from_json_str(r#"{ "resource_timeout": 500 }"#).unwrap();
/// assert_eq!(config.resource_timeout, Duration::from_millis(500));
/// assert_eq!(config.max_activator_crashes, 100);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IzouConfig {
    /// Deadline for one resource generation batch.
    #[serde(with = "millis")]
    pub resource_timeout: Duration,
    /// How long output delivery waits for one plugin.
    #[serde(with = "millis")]
    pub output_timeout: Duration,
    /// Restarts allowed after ordinary activator failures.
    pub max_activator_crashes: u32,
    /// Restarts allowed after activator permission denials.
    pub max_permission_denials: u32,
    /// Subscriber settings.
    pub tracing: TracingSetup,
}

impl Default for IzouConfig {
    fn default() -> Self {
        Self {
            resource_timeout: Duration::from_millis(3000),
            output_timeout: Duration::from_secs(100),
            max_activator_crashes: 100,
            max_permission_denials: 2,
            tracing: TracingSetup::default(),
        }
    }
}

impl IzouConfig {
    /// Creates the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses and validates a JSON configuration. Missing fields keep their
    /// defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed input and
    /// [`ConfigError::Invalid`] for unusable values.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that every timeout is non-zero.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first bad field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.resource_timeout.is_zero() {
            return Err(ConfigError::Invalid {
                field: "resource_timeout",
                reason: "must be greater than zero",
            });
        }
        if self.output_timeout.is_zero() {
            return Err(ConfigError::Invalid {
                field: "output_timeout",
                reason: "must be greater than zero",
            });
        }
        Ok(())
    }

    /// Sets the resource generation deadline.
    #[must_use]
    pub fn with_resource_timeout(mut self, timeout: Duration) -> Self {
        self.resource_timeout = timeout;
        self
    }

    /// Sets the output delivery wait.
    #[must_use]
    pub fn with_output_timeout(mut self, timeout: Duration) -> Self {
        self.output_timeout = timeout;
        self
    }

    /// Sets the ordinary crash ceiling.
    #[must_use]
    pub fn with_max_activator_crashes(mut self, max: u32) -> Self {
        self.max_activator_crashes = max;
        self
    }

    /// Sets the permission denial ceiling.
    #[must_use]
    pub fn with_max_permission_denials(mut self, max: u32) -> Self {
        self.max_permission_denials = max;
        self
    }

    /// Sets the subscriber settings.
    #[must_use]
    pub fn with_tracing(mut self, tracing: TracingSetup) -> Self {
        self.tracing = tracing;
        self
    }
}

mod millis {
    use core::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub(super) fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
