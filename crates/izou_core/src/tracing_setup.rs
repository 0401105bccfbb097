//! Subscriber installation.
//!
//! [`TracingSetup`] configures the global `tracing` subscriber: an
//! [`EnvFilter`] layer plus a `fmt` layer in the chosen [`TracingFormat`].
//!
//! The filter is picked from, in order:
//!
//! 1. the [`LOG_ENV_VAR`] environment variable, if set and valid,
//! 2. the configured filter string, if valid,
//! 3. the configured level.
//!
//! # Example
//!
//! ```
//! use izou_core::{TracingFormat, TracingSetup};
//! use tracing::Level;
//!
//! TracingSetup::default()
//!     .with_level(Level::DEBUG)
//!     .with_format(TracingFormat::Compact)
//!     .with_env_filter("izou_events=trace,izou_output=debug")
//!     .init();
//! ```

use serde::{Deserialize, Serialize};
use tracing::Level;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Environment variable that overrides the configured filter.
pub const LOG_ENV_VAR: &str = "IZOU_LOG";

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TracingFormat {
    /// Human-readable multi-line output.
    #[default]
    Pretty,
    /// Single-line output.
    Compact,
    /// JSON lines for log aggregation.
    Json,
}

/// Settings for the global `tracing` subscriber.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TracingSetup {
    #[serde(with = "level")]
    level: Level,
    format: TracingFormat,
    env_filter: Option<String>,
    span_events: bool,
}

impl Default for TracingSetup {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            format: TracingFormat::Pretty,
            env_filter: None,
            span_events: false,
        }
    }
}

impl TracingSetup {
    /// Sets the maximum level used when no filter applies.
    #[must_use]
    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    /// Sets the output format.
    #[must_use]
    pub fn with_format(mut self, format: TracingFormat) -> Self {
        self.format = format;
        self
    }

    /// Sets a filter in `target=level,...` form.
    #[must_use]
    pub fn with_env_filter(mut self, filter: impl Into<String>) -> Self {
        self.env_filter = Some(filter.into());
        self
    }

    /// Emits span enter and exit events.
    #[must_use]
    pub fn with_span_events(mut self, enabled: bool) -> Self {
        self.span_events = enabled;
        self
    }

    /// Returns the configured level.
    #[must_use]
    pub fn level(&self) -> Level {
        self.level
    }

    /// Returns the configured format.
    #[must_use]
    pub fn format(&self) -> TracingFormat {
        self.format
    }

    /// Returns the configured filter string.
    #[must_use]
    pub fn env_filter(&self) -> Option<&str> {
        self.env_filter.as_deref()
    }

    fn filter(&self) -> EnvFilter {
        std::env::var(LOG_ENV_VAR)
            .ok()
            .and_then(|directives| EnvFilter::try_new(directives).ok())
            .or_else(|| {
                self.env_filter
                    .as_deref()
                    .and_then(|directives| EnvFilter::try_new(directives).ok())
            })
            .unwrap_or_else(|| EnvFilter::new(self.level.as_str()))
    }

    /// Installs the subscriber.
    ///
    /// Returns `false` if a global subscriber was already installed, in
    /// which case nothing changes.
    pub fn init(&self) -> bool {
        let span_events = if self.span_events {
            FmtSpan::ENTER | FmtSpan::EXIT
        } else {
            FmtSpan::NONE
        };
        let registry = tracing_subscriber::registry().with(self.filter());

        let installed = match self.format {
            TracingFormat::Pretty => registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .pretty()
                        .with_span_events(span_events),
                )
                .try_init()
                .is_ok(),
            TracingFormat::Compact => registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .compact()
                        .with_span_events(span_events),
                )
                .try_init()
                .is_ok(),
            TracingFormat::Json => registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_span_events(span_events),
                )
                .try_init()
                .is_ok(),
        };

        if installed {
            tracing::debug!(level = %self.level, format = ?self.format, "tracing initialized");
        }
        installed
    }
}

mod level {
    use serde::{Deserialize, Deserializer, Serializer, de};
    use tracing::Level;

    pub(super) fn serialize<S: Serializer>(level: &Level, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&level.as_str().to_ascii_lowercase())
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Level, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(|_| de::Error::custom(format!("unknown log level '{raw}'")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_info_pretty() {
        let setup = TracingSetup::default();
        assert_eq!(setup.level(), Level::INFO);
        assert_eq!(setup.format(), TracingFormat::Pretty);
        assert_eq!(setup.env_filter(), None);
    }

    #[test]
    fn builders_set_fields() {
        let setup = TracingSetup::default()
            .with_level(Level::TRACE)
            .with_format(TracingFormat::Json)
            .with_env_filter("izou_output=debug")
            .with_span_events(true);
        assert_eq!(setup.level(), Level::TRACE);
        assert_eq!(setup.format(), TracingFormat::Json);
        assert_eq!(setup.env_filter(), Some("izou_output=debug"));
        assert!(setup.span_events);
    }

    #[test]
    fn second_init_is_ignored() {
        TracingSetup::default().init();
        assert!(!TracingSetup::default().init());
    }
}
