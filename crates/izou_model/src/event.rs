//! Events and their topics.
//!
//! An [`Event`] is created by whichever component wants to signal a change,
//! usually an activator. Its topics (the event type plus any descriptors) are
//! fixed at construction; its [`ResourceContainer`] fills up while the event
//! travels through resource generation and output delivery.

use core::fmt;
use std::sync::Arc;

use izou_identity::Identification;

use crate::behavior::BehaviorController;
use crate::resource::ResourceContainer;

/// Well-known event types.
pub mod event_types {
    /// A direct response to a user request.
    pub const RESPONSE: &str = "response";
    /// Information the user did not ask for.
    pub const NOTIFICATION: &str = "notification";
    /// A short greeting.
    pub const WELCOME: &str = "welcome";
    /// A greeting with all available details.
    pub const FULL_WELCOME: &str = "full_welcome";
    /// A greeting with the most important details.
    pub const MAJOR_WELCOME: &str = "major_welcome";
}

/// An immutable signal distributed to interested components.
pub struct Event {
    event_type: String,
    source: Identification,
    topics: Vec<String>,
    resources: ResourceContainer,
    behavior: Option<Arc<dyn BehaviorController>>,
}

impl Event {
    /// Creates an event of the given type fired on behalf of `source`.
    ///
    /// The event type is always the first topic.
    #[must_use]
    pub fn new(event_type: impl Into<String>, source: Identification) -> Self {
        let event_type = event_type.into();
        Self {
            topics: vec![event_type.clone()],
            event_type,
            source,
            resources: ResourceContainer::new(),
            behavior: None,
        }
    }

    /// Adds a descriptor topic. Duplicates are ignored.
    #[must_use]
    pub fn with_descriptor(mut self, descriptor: impl Into<String>) -> Self {
        let descriptor = descriptor.into();
        if !self.topics.contains(&descriptor) {
            self.topics.push(descriptor);
        }
        self
    }

    /// Adds several descriptor topics.
    #[must_use]
    pub fn with_descriptors<I, S>(self, descriptors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        descriptors
            .into_iter()
            .fold(self, |event, descriptor| event.with_descriptor(descriptor))
    }

    /// Sets the controller deciding the output plugin delivery order.
    #[must_use]
    pub fn with_behavior(mut self, behavior: impl BehaviorController + 'static) -> Self {
        self.behavior = Some(Arc::new(behavior));
        self
    }

    /// Returns the event type.
    #[must_use]
    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    /// Returns the identity of the component that created the event.
    #[must_use]
    pub fn source(&self) -> &Identification {
        &self.source
    }

    /// Returns all topics: the event type followed by the descriptors.
    #[must_use]
    pub fn topics(&self) -> &[String] {
        &self.topics
    }

    /// Returns true if the event carries the given topic.
    #[must_use]
    pub fn contains_descriptor(&self, topic: &str) -> bool {
        self.topics.iter().any(|t| t == topic)
    }

    /// Returns the resources attached to this event.
    #[must_use]
    pub fn resources(&self) -> &ResourceContainer {
        &self.resources
    }

    /// Returns the delivery-order controller, if the creator supplied one.
    #[must_use]
    pub fn behavior(&self) -> Option<&Arc<dyn BehaviorController>> {
        self.behavior.as_ref()
    }
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("event_type", &self.event_type)
            .field("source", &self.source)
            .field("topics", &self.topics)
            .field("resources", &self.resources.len())
            .field("behavior", &self.behavior.is_some())
            .finish()
    }
}
