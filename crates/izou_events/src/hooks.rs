//! Instrumentation hooks around event dispatch.
//!
//! Hooks are named callbacks that run synchronously on the dispatch worker,
//! either before resource generation ([`DispatchPhase::PreDispatch`]) or after
//! listeners were notified ([`DispatchPhase::PostDispatch`]). They execute in
//! registration order. A slow hook delays every event behind it.
//!
//! # Example
//!
//! ```
//! use izou_events::{DispatchHooks, DispatchPhase};
//!
//! let hooks = DispatchHooks::new();
//! hooks
//!     .register(DispatchPhase::PreDispatch, "logger", |event| {
//!         tracing::info!(event_type = event.event_type(), "dispatching");
//!     })
//!     .unwrap();
//!
//! assert!(hooks.register(DispatchPhase::PreDispatch, "logger", |_| {}).is_err());
//! assert_eq!(hooks.len(DispatchPhase::PreDispatch), 1);
//! ```

use core::fmt;
use std::sync::Arc;

use hashbrown::HashMap;
use izou_model::Event;
use parking_lot::RwLock;

type BoxedHook = Arc<dyn Fn(&Event) + Send + Sync>;

/// The point in the dispatch of an event at which a hook runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DispatchPhase {
    /// After the controllers allowed the event, before resource generation.
    PreDispatch,
    /// After listeners were notified, before output delivery is handed off.
    PostDispatch,
}

impl fmt::Display for DispatchPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchPhase::PreDispatch => f.write_str("pre-dispatch"),
            DispatchPhase::PostDispatch => f.write_str("post-dispatch"),
        }
    }
}

/// Errors that can occur during hook registration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HookRegistrationError {
    /// A hook with this name already exists for the phase.
    #[error("hook '{name}' already registered for {phase}")]
    DuplicateName {
        /// The phase where the duplicate was found.
        phase: DispatchPhase,
        /// The duplicate hook name.
        name: String,
    },
}

struct HookEntry {
    name: String,
    hook: BoxedHook,
}

/// Registry of dispatch hooks, keyed by phase.
#[derive(Default)]
pub struct DispatchHooks {
    hooks: RwLock<HashMap<DispatchPhase, Vec<HookEntry>>>,
}

impl fmt::Debug for DispatchHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hooks = self.hooks.read();
        let mut map = f.debug_map();
        for (phase, entries) in hooks.iter() {
            let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
            map.entry(phase, &names);
        }
        map.finish()
    }
}

impl DispatchHooks {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a named hook for a phase.
    ///
    /// # Errors
    ///
    /// Returns [`HookRegistrationError::DuplicateName`] if a hook with the same
    /// name is already registered for `phase`.
    pub fn register(
        &self,
        phase: DispatchPhase,
        name: impl Into<String>,
        hook: impl Fn(&Event) + Send + Sync + 'static,
    ) -> Result<(), HookRegistrationError> {
        let name = name.into();
        let mut hooks = self.hooks.write();
        let entries = hooks.entry(phase).or_default();

        if entries.iter().any(|entry| entry.name == name) {
            return Err(HookRegistrationError::DuplicateName { phase, name });
        }

        entries.push(HookEntry {
            name,
            hook: Arc::new(hook),
        });
        Ok(())
    }

    /// Removes a hook by name. Returns `true` if it existed.
    pub fn unregister(&self, phase: DispatchPhase, name: &str) -> bool {
        let mut hooks = self.hooks.write();
        let Some(entries) = hooks.get_mut(&phase) else {
            return false;
        };
        let before = entries.len();
        entries.retain(|entry| entry.name != name);
        entries.len() != before
    }

    /// Runs every hook registered for `phase`, in registration order.
    pub fn invoke(&self, phase: DispatchPhase, event: &Event) {
        let snapshot: Vec<BoxedHook> = match self.hooks.read().get(&phase) {
            Some(entries) => entries.iter().map(|entry| Arc::clone(&entry.hook)).collect(),
            None => return,
        };
        for hook in snapshot {
            hook(event);
        }
    }

    /// Returns the number of hooks registered for `phase`.
    #[must_use]
    pub fn len(&self, phase: DispatchPhase) -> usize {
        self.hooks.read().get(&phase).map_or(0, Vec::len)
    }

    /// Returns true if no hook is registered for `phase`.
    #[must_use]
    pub fn is_empty(&self, phase: DispatchPhase) -> bool {
        self.len(phase) == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use izou_identity::{Identifiable, IdentificationManager};
    use parking_lot::Mutex;

    struct Source;

    impl Identifiable for Source {
        fn id(&self) -> &str {
            "source"
        }
    }

    fn event() -> Event {
        let source = IdentificationManager::new().claim(&Source).unwrap();
        Event::new("test", source)
    }

    #[test]
    fn hooks_run_in_registration_order() {
        let hooks = DispatchHooks::new();
        let calls = Arc::new(Mutex::new(Vec::new()));

        for name in ["first", "second"] {
            let calls = Arc::clone(&calls);
            hooks
                .register(DispatchPhase::PreDispatch, name, move |_| {
                    calls.lock().push(name);
                })
                .unwrap();
        }

        hooks.invoke(DispatchPhase::PreDispatch, &event());
        hooks.invoke(DispatchPhase::PostDispatch, &event());
        assert_eq!(*calls.lock(), ["first", "second"]);
    }

    #[test]
    fn same_name_allowed_in_different_phases() {
        let hooks = DispatchHooks::new();
        hooks
            .register(DispatchPhase::PreDispatch, "timer", |_| {})
            .unwrap();
        hooks
            .register(DispatchPhase::PostDispatch, "timer", |_| {})
            .unwrap();

        let err = hooks
            .register(DispatchPhase::PostDispatch, "timer", |_| {})
            .unwrap_err();
        assert_eq!(
            err,
            HookRegistrationError::DuplicateName {
                phase: DispatchPhase::PostDispatch,
                name: "timer".into(),
            }
        );
    }

    #[test]
    fn unregister_removes_hook() {
        let hooks = DispatchHooks::new();
        hooks
            .register(DispatchPhase::PostDispatch, "audit", |_| {})
            .unwrap();
        assert!(hooks.unregister(DispatchPhase::PostDispatch, "audit"));
        assert!(!hooks.unregister(DispatchPhase::PostDispatch, "audit"));
        assert!(hooks.is_empty(DispatchPhase::PostDispatch));
    }
}
