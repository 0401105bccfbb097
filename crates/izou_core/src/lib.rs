//! Ambient infrastructure shared by the Izou runtime.
//!
//! - [`IzouConfig`]: timeouts and restart ceilings for every manager.
//! - [`TracingSetup`]: installs the `tracing` subscriber.

mod config;
mod error;
mod tracing_setup;

pub use config::IzouConfig;
pub use error::ConfigError;
pub use tracing_setup::{LOG_ENV_VAR, TracingFormat, TracingSetup};
