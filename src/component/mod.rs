//! Component base - behavior traits and erased component types.
//!
//! A component is a [`Behavior`] (render logic plus lifecycle hooks)
//! paired with static declarations ([`Component::state`]/[`Component::props`]).
//! [`ComponentType`] erases the concrete type into a value the renderer
//! and the custom-element adapter can store, compare, and instantiate:
//! identity is the Rust `TypeId`, construction goes through `Default`.

mod emitter;
mod instance;
mod schema;

use std::any::TypeId;
use std::fmt;

use crate::error::RenderError;
use crate::renderer::Descriptor;

pub use emitter::{ComponentEvent, Emitter, EventCallback, Subscription, WILDCARD};
pub use instance::{Ctx, Instance};
pub use schema::{FieldDef, Schema};

// =============================================================================
// Behavior
// =============================================================================

/// Object-safe component logic.
///
/// `render` describes the component's subtree as a descriptor. Returning
/// `Ok(None)` (the default) mounts an empty `div` root, so a component
/// without a template is still a valid, visible unit.
pub trait Behavior: 'static {
    /// Produce the component's output for the current config and state.
    fn render(&self, ctx: &Ctx<'_>) -> Result<Option<Descriptor>, RenderError> {
        let _ = ctx;
        Ok(None)
    }

    /// Called once after construction, before the first render. State
    /// written here is part of the initial render.
    fn created(&mut self, ctx: &Ctx<'_>) {
        let _ = ctx;
    }

    /// Called once during disposal.
    fn detached(&mut self) {}
}

/// A declarable component: behavior plus static schema accessors.
///
/// `Default` is the constructor: per-instance data lives in the declared
/// state slots, not in the behavior struct, so construction needs no
/// arguments.
pub trait Component: Behavior + Default {
    /// Display name used in logs and diagnostics.
    const NAME: &'static str;

    /// Declared reactive-state keys and defaults.
    fn state() -> Schema {
        Schema::new()
    }

    /// Declared props. A non-empty props schema switches the
    /// custom-element adapter to the props path (`has_props`).
    fn props() -> Schema {
        Schema::new()
    }
}

// =============================================================================
// ComponentType
// =============================================================================

/// Erased component constructor.
///
/// Cheap to clone and compare; equality is `TypeId` equality, which is
/// what the per-owner registry uses to decide reuse vs. recreate.
#[derive(Clone)]
pub struct ComponentType {
    name: &'static str,
    id: TypeId,
    state: fn() -> Schema,
    props: fn() -> Schema,
    make: fn() -> Box<dyn Behavior>,
}

impl ComponentType {
    /// Erase a concrete component type.
    pub fn of<C: Component>() -> Self {
        fn make<C: Component>() -> Box<dyn Behavior> {
            Box::new(C::default())
        }
        Self {
            name: C::NAME,
            id: TypeId::of::<C>(),
            state: C::state,
            props: C::props,
            make: make::<C>,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn state_schema(&self) -> Schema {
        (self.state)()
    }

    pub fn props_schema(&self) -> Schema {
        (self.props)()
    }

    /// Whether a props schema with at least one entry is declared.
    pub fn has_props(&self) -> bool {
        !self.props_schema().is_empty()
    }

    /// The observed-attribute list: props keys when declared, else the
    /// reactive-state keys. Fixed per type, not per instance.
    pub fn observed_attributes(&self) -> Vec<String> {
        if self.has_props() {
            self.props_schema().keys()
        } else {
            self.state_schema().keys()
        }
    }

    pub(crate) fn instantiate(&self) -> Box<dyn Behavior> {
        (self.make)()
    }
}

impl PartialEq for ComponentType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ComponentType {}

impl fmt::Debug for ComponentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ComponentType").field(&self.name).finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
