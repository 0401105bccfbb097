//! Resource generation for Izou.
//!
//! A [`ResourceBuilder`] announces which resources it can produce and which
//! event topics should trigger it. The [`ResourceManager`] indexes builders in
//! both directions and, when an event arrives, runs every subscribed builder
//! concurrently under one shared deadline. Builders that miss the deadline
//! are cancelled and contribute nothing.
//!
//! # Example
//!
//! ```ignore
//! let manager = ResourceManager::new(registry, ResourceSettings::default());
//! manager.register_resource_builder(Arc::new(WeatherBuilder));
//!
//! let event = Arc::new(Event::new("morning", source));
//! let resources = manager.generate_resources(&event).await;
//! ```

mod builder;
mod error;
mod manager;

pub use builder::ResourceBuilder;
pub use error::ResourceError;
pub use manager::{ResourceManager, ResourceSettings};
