//! DOM events - CustomEvent and per-element listener registry.
//!
//! Component-originated events reach the host page as [`CustomEvent`]s
//! dispatched on the adapted element, with the payload arguments carried
//! in order in `detail`. Listeners are tracked per element with numeric
//! subscription ids so removal never needs closure identity.

use std::collections::HashMap;
use std::rc::Rc;

use crate::types::Value;

// =============================================================================
// CustomEvent
// =============================================================================

/// An event dispatched on a DOM element.
///
/// `detail` is the ordered payload argument list of the originating
/// component event (the trailing event-metadata object of the emit call
/// is represented by `event_type` itself, not duplicated in the payload).
#[derive(Debug, Clone, PartialEq)]
pub struct CustomEvent {
    pub event_type: String,
    pub detail: Vec<Value>,
}

impl CustomEvent {
    /// Create an event with a payload.
    pub fn new(event_type: impl Into<String>, detail: Vec<Value>) -> Self {
        Self {
            event_type: event_type.into(),
            detail,
        }
    }

    /// Create a payload-less event.
    pub fn empty(event_type: impl Into<String>) -> Self {
        Self::new(event_type, Vec::new())
    }
}

/// Listener callback. `Rc` so handler lists can be cloned out of the
/// registry before dispatch, keeping dispatch reentrancy-safe.
pub type EventHandler = Rc<dyn Fn(&CustomEvent)>;

/// Token returned by `add_event_listener`, consumed by
/// `remove_event_listener`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventSubscription {
    pub(crate) id: usize,
    pub(crate) event_type: String,
}

// =============================================================================
// Listener Registry
// =============================================================================

/// Per-element listener storage.
#[derive(Default)]
pub(crate) struct ListenerRegistry {
    handlers: HashMap<String, Vec<(usize, EventHandler)>>,
    next_id: usize,
}

impl ListenerRegistry {
    pub(crate) fn add(
        &mut self,
        event_type: &str,
        handler: impl Fn(&CustomEvent) + 'static,
    ) -> EventSubscription {
        let id = self.next_id;
        self.next_id += 1;
        self.handlers
            .entry(event_type.to_string())
            .or_default()
            .push((id, Rc::new(handler)));
        EventSubscription {
            id,
            event_type: event_type.to_string(),
        }
    }

    pub(crate) fn remove(&mut self, subscription: &EventSubscription) {
        if let Some(handlers) = self.handlers.get_mut(&subscription.event_type) {
            handlers.retain(|(id, _)| *id != subscription.id);
            if handlers.is_empty() {
                self.handlers.remove(&subscription.event_type);
            }
        }
    }

    /// Snapshot the handlers for one event type. Cloned out so dispatch
    /// can run without holding the registry borrow.
    pub(crate) fn handlers_for(&self, event_type: &str) -> Vec<EventHandler> {
        self.handlers
            .get(event_type)
            .map(|handlers| handlers.iter().map(|(_, h)| h.clone()).collect())
            .unwrap_or_default()
    }

    pub(crate) fn len(&self) -> usize {
        self.handlers.values().map(Vec::len).sum()
    }
}

// =============================================================================
// Tests
// =============================================================================
