//! Component event emitter.
//!
//! Handler registry for component-originated events: typed subscriptions
//! plus the `'*'` wildcard pattern that matches every emitted event (the
//! adapter relies on the wildcard to relay events outward). Handlers are
//! identified by numeric subscription ids; dispatch clones the handler
//! list out of the registry first, so a handler may subscribe or
//! unsubscribe while events are in flight.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::types::Value;

/// Pattern matching every event type.
pub const WILDCARD: &str = "*";

/// An event emitted by a component.
///
/// `args` is the ordered payload; the event type travels alongside it
/// rather than inside it.
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentEvent {
    pub event_type: String,
    pub args: Vec<Value>,
}

impl ComponentEvent {
    pub fn new(event_type: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            event_type: event_type.into(),
            args,
        }
    }
}

/// Handler callback.
pub type EventCallback = Rc<dyn Fn(&ComponentEvent)>;

/// Token identifying one subscription, consumed by [`Emitter::off`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    id: usize,
    pattern: String,
}

// =============================================================================
// Emitter
// =============================================================================

#[derive(Default)]
struct EmitterInner {
    typed: HashMap<String, Vec<(usize, EventCallback)>>,
    wildcard: Vec<(usize, EventCallback)>,
    next_id: usize,
}

/// Per-instance event emitter with wildcard support.
#[derive(Default)]
pub struct Emitter {
    inner: RefCell<EmitterInner>,
}

impl Emitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to a specific event type, or to every event with the
    /// `'*'` pattern.
    pub fn on(&self, pattern: &str, handler: impl Fn(&ComponentEvent) + 'static) -> Subscription {
        let mut inner = self.inner.borrow_mut();
        let id = inner.next_id;
        inner.next_id += 1;
        let handler: EventCallback = Rc::new(handler);
        if pattern == WILDCARD {
            inner.wildcard.push((id, handler));
        } else {
            inner
                .typed
                .entry(pattern.to_string())
                .or_default()
                .push((id, handler));
        }
        Subscription {
            id,
            pattern: pattern.to_string(),
        }
    }

    /// Remove one subscription. Unknown tokens are a no-op.
    pub fn off(&self, subscription: &Subscription) {
        let mut inner = self.inner.borrow_mut();
        if subscription.pattern == WILDCARD {
            inner.wildcard.retain(|(id, _)| *id != subscription.id);
        } else if let Some(handlers) = inner.typed.get_mut(&subscription.pattern) {
            handlers.retain(|(id, _)| *id != subscription.id);
            if handlers.is_empty() {
                inner.typed.remove(&subscription.pattern);
            }
        }
    }

    /// Dispatch to typed handlers for the event's type, then wildcard
    /// handlers, in subscription order.
    pub fn emit(&self, event: &ComponentEvent) {
        let handlers: Vec<EventCallback> = {
            let inner = self.inner.borrow();
            inner
                .typed
                .get(&event.event_type)
                .into_iter()
                .flatten()
                .chain(inner.wildcard.iter())
                .map(|(_, h)| h.clone())
                .collect()
        };
        for handler in handlers {
            handler(event);
        }
    }

    /// Total live subscriptions (typed + wildcard).
    pub fn subscription_count(&self) -> usize {
        let inner = self.inner.borrow();
        inner.typed.values().map(Vec::len).sum::<usize>() + inner.wildcard.len()
    }

    /// Drop every subscription.
    pub fn clear(&self) {
        let mut inner = self.inner.borrow_mut();
        inner.typed.clear();
        inner.wildcard.clear();
    }
}

// =============================================================================
// Tests
// =============================================================================
