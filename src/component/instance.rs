//! Live component instances.
//!
//! An [`Instance`] is a constructed, mounted, disposable unit: it owns
//! its root element, a config snapshot, declared state/props slots
//! (each a `spark-signals` signal), a child registry, and an event
//! emitter. Mounting installs one render effect per instance; the effect
//! subscribes to the invalidation epoch and every declared slot, so a
//! state write or a config re-delivery re-runs the render pass
//! synchronously. Disposal is flag-guarded: exactly one effect teardown
//! and one element detach, no matter how often it is invoked.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;

use bitflags::bitflags;
use spark_signals::{Signal, effect, signal};

use crate::dom::Element;
use crate::error::RenderError;
use crate::renderer::registry::ChildRegistry;
use crate::renderer::{Child, Config};
use crate::types::Value;

use super::emitter::{ComponentEvent, Emitter, Subscription};
use super::schema::Schema;
use super::{Behavior, ComponentType};

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub(crate) struct InstanceFlags: u8 {
        /// First render succeeded and the render effect is live.
        const MOUNTED = 1 << 0;
        /// Disposal ran; the instance is permanently inert.
        const DISPOSED = 1 << 1;
        /// A render pass is executing right now.
        const RENDERING = 1 << 2;
    }
}

pub(crate) struct InstanceData {
    ty: ComponentType,
    behavior: RefCell<Box<dyn Behavior>>,
    config: RefCell<Config>,
    state: RefCell<BTreeMap<String, Signal<Value>>>,
    props: RefCell<BTreeMap<String, Signal<Value>>>,
    element: RefCell<Option<Element>>,
    container: RefCell<Option<Element>>,
    registry: RefCell<ChildRegistry>,
    emitter: Emitter,
    epoch: Signal<u64>,
    epoch_counter: Cell<u64>,
    stop_render: RefCell<Option<Box<dyn FnOnce()>>>,
    pending_error: RefCell<Option<RenderError>>,
    flags: Cell<InstanceFlags>,
}

impl Drop for InstanceData {
    fn drop(&mut self) {
        // The effect closure only holds a weak reference back to this
        // data, so tearing the effect down here cannot re-enter.
        if let Some(stop) = self.stop_render.get_mut().take() {
            stop();
        }
    }
}

/// Shared handle to a live component instance.
#[derive(Clone)]
pub struct Instance {
    data: Rc<InstanceData>,
}

impl std::fmt::Debug for Instance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Instance")
            .field("type", &self.data.ty.name())
            .finish_non_exhaustive()
    }
}

impl Instance {
    // =========================================================================
    // Construction / mounting
    // =========================================================================

    /// Construct an instance from a config mapping. Declared state and
    /// props slots are seeded from schema defaults, overridden by any
    /// like-named config entries. Runs the `created` hook.
    pub fn create(ty: ComponentType, config: Config) -> Self {
        let state = seed_slots(&ty.state_schema(), &config);
        let props_schema = ty.props_schema();
        let props = if props_schema.is_empty() {
            BTreeMap::new()
        } else {
            seed_slots(&props_schema, &config)
        };
        let behavior = ty.instantiate();

        let instance = Self {
            data: Rc::new(InstanceData {
                ty,
                behavior: RefCell::new(behavior),
                config: RefCell::new(config),
                state: RefCell::new(state),
                props: RefCell::new(props),
                element: RefCell::new(None),
                container: RefCell::new(None),
                registry: RefCell::new(ChildRegistry::default()),
                emitter: Emitter::new(),
                epoch: signal(0u64),
                epoch_counter: Cell::new(0),
                stop_render: RefCell::new(None),
                pending_error: RefCell::new(None),
                flags: Cell::new(InstanceFlags::empty()),
            }),
        };
        instance.data.behavior.borrow_mut().created(&Ctx::new(&instance));
        instance
    }

    /// Mount into a container: run the first render synchronously and
    /// install the render effect. A failing first render tears the
    /// effect back down and returns the error; the instance is then
    /// safe to dispose or drop.
    pub fn mount(&self, container: &Element) -> Result<(), RenderError> {
        if self.is_disposed() {
            return Err(RenderError::Disposed);
        }
        *self.data.container.borrow_mut() = Some(container.clone());
        if self.data.flags.get().contains(InstanceFlags::MOUNTED) {
            // Already mounted elsewhere: just re-render into the new
            // container.
            self.invalidate();
            return Ok(());
        }

        let weak = Rc::downgrade(&self.data);
        let stop = effect(move || {
            let Some(data) = weak.upgrade() else { return };
            if data.flags.get().contains(InstanceFlags::DISPOSED) {
                return;
            }

            // Track the epoch and every declared slot; any of them
            // re-runs this effect.
            data.epoch.get();
            for slot in data.state.borrow().values() {
                slot.get();
            }
            for slot in data.props.borrow().values() {
                slot.get();
            }

            if data.flags.get().contains(InstanceFlags::RENDERING) {
                tracing::warn!(
                    component = data.ty.name(),
                    "state mutated during render, skipping nested re-render"
                );
                return;
            }

            let instance = Instance { data: data.clone() };
            if let Err(err) = crate::renderer::render_pass(&instance) {
                if data.flags.get().contains(InstanceFlags::MOUNTED) {
                    tracing::error!(component = data.ty.name(), error = %err, "re-render failed");
                }
                *data.pending_error.borrow_mut() = Some(err);
            }
        });
        *self.data.stop_render.borrow_mut() = Some(Box::new(stop));

        if let Some(err) = self.data.pending_error.borrow_mut().take() {
            if let Some(stop) = self.data.stop_render.borrow_mut().take() {
                stop();
            }
            *self.data.container.borrow_mut() = None;
            return Err(err);
        }

        self.data.flags.set(self.data.flags.get() | InstanceFlags::MOUNTED);
        Ok(())
    }

    // =========================================================================
    // Inputs: config, state, props
    // =========================================================================

    /// Snapshot of the received configuration, including `children`.
    pub fn config(&self) -> Config {
        self.data.config.borrow().clone()
    }

    /// Read a declared state slot. Undeclared names read as `Null`.
    pub fn state(&self, name: &str) -> Value {
        self.data
            .state
            .borrow()
            .get(name)
            .map(|slot| slot.get())
            .unwrap_or(Value::Null)
    }

    /// Write a state slot and re-render. Writing an undeclared name
    /// creates the slot.
    pub fn set_state(&self, name: &str, value: impl Into<Value>) {
        self.write_slot(&self.data.state, name, value.into());
    }

    /// Read a declared props slot. Undeclared names read as `Null`.
    pub fn prop(&self, name: &str) -> Value {
        self.data
            .props
            .borrow()
            .get(name)
            .map(|slot| slot.get())
            .unwrap_or(Value::Null)
    }

    /// Write a props slot and re-render (the adapter's attribute path
    /// for types with declared props).
    pub fn set_prop(&self, name: &str, value: impl Into<Value>) {
        self.write_slot(&self.data.props, name, value.into());
    }

    fn write_slot(
        &self,
        slots: &RefCell<BTreeMap<String, Signal<Value>>>,
        name: &str,
        value: Value,
    ) {
        if self.is_disposed() {
            tracing::warn!(component = self.type_name(), slot = name, "write to disposed instance ignored");
            return;
        }
        let existing = slots.borrow().get(name).cloned();
        match existing {
            Some(slot) => {
                slot.set(value);
            }
            None => {
                slots.borrow_mut().insert(name.to_string(), signal(value));
                // A freshly created slot has no subscriber yet; force the
                // render effect around once so it picks the slot up.
                self.invalidate();
            }
        }
    }

    /// Replace the config snapshot (owner re-render delivering new
    /// configuration) and re-render. The caller inspects
    /// [`Instance::take_pending_error`] afterwards to surface a failed
    /// re-render.
    pub(crate) fn deliver_config(&self, config: Config) {
        *self.data.config.borrow_mut() = config;
        self.data.pending_error.borrow_mut().take();
        self.invalidate();
    }

    /// Error left behind by the most recent effect-driven render pass.
    pub(crate) fn take_pending_error(&self) -> Option<RenderError> {
        self.data.pending_error.borrow_mut().take()
    }

    /// Request a re-render without touching any slot.
    pub fn invalidate(&self) {
        let next = self.data.epoch_counter.get() + 1;
        self.data.epoch_counter.set(next);
        self.data.epoch.set(next);
    }

    // =========================================================================
    // Events
    // =========================================================================

    /// Emit a component event to subscribers (and, through the adapter's
    /// wildcard relay, to the host page).
    pub fn emit(&self, event_type: &str, args: Vec<Value>) {
        self.data.emitter.emit(&ComponentEvent::new(event_type, args));
    }

    /// Subscribe to emitted events; `'*'` matches every type.
    pub fn on(&self, pattern: &str, handler: impl Fn(&ComponentEvent) + 'static) -> Subscription {
        self.data.emitter.on(pattern, handler)
    }

    pub fn off(&self, subscription: &Subscription) {
        self.data.emitter.off(subscription);
    }

    /// Live subscription count (used to verify listener cleanup).
    pub fn subscription_count(&self) -> usize {
        self.data.emitter.subscription_count()
    }

    // =========================================================================
    // Tree access
    // =========================================================================

    /// The instance's mounted root element.
    pub fn element(&self) -> Option<Element> {
        self.data.element.borrow().clone()
    }

    /// Look up a child instance created under a declared key during this
    /// owner's render pass.
    pub fn child(&self, key: &str) -> Option<Instance> {
        self.data.registry.borrow().get_named(key)
    }

    /// Number of live child instances tracked by this owner.
    pub fn child_count(&self) -> usize {
        self.data.registry.borrow().len()
    }

    pub fn type_name(&self) -> &'static str {
        self.data.ty.name()
    }

    /// Identity comparison (same live instance).
    pub fn ptr_eq(&self, other: &Instance) -> bool {
        Rc::ptr_eq(&self.data, &other.data)
    }

    pub fn is_disposed(&self) -> bool {
        self.data.flags.get().contains(InstanceFlags::DISPOSED)
    }

    // =========================================================================
    // Disposal
    // =========================================================================

    /// Tear the instance down: stop the render effect, run the
    /// `detached` hook, dispose children, drop every event subscription,
    /// and detach the root element. Safe to call any number of times;
    /// only the first call does work.
    pub fn dispose(&self) {
        if self.is_disposed() {
            return;
        }
        self.data.flags.set(self.data.flags.get() | InstanceFlags::DISPOSED);

        if let Some(stop) = self.data.stop_render.borrow_mut().take() {
            stop();
        }
        self.data.behavior.borrow_mut().detached();
        self.data.registry.borrow_mut().dispose_all();
        self.data.emitter.clear();
        if let Some(element) = self.data.element.borrow_mut().take() {
            element.detach();
        }
        *self.data.container.borrow_mut() = None;
    }

    // =========================================================================
    // Renderer plumbing
    // =========================================================================

    pub(crate) fn matches_type(&self, ty: &ComponentType) -> bool {
        self.data.ty == *ty
    }

    pub(crate) fn render_output(&self) -> Result<Option<crate::renderer::Descriptor>, RenderError> {
        self.data.behavior.borrow().render(&Ctx::new(self))
    }

    pub(crate) fn registry(&self) -> &RefCell<ChildRegistry> {
        &self.data.registry
    }

    pub(crate) fn mount_container(&self) -> Option<Element> {
        self.data.container.borrow().clone()
    }

    pub(crate) fn set_container(&self, container: &Element) {
        *self.data.container.borrow_mut() = Some(container.clone());
    }

    pub(crate) fn root_element(&self) -> Option<Element> {
        self.data.element.borrow().clone()
    }

    pub(crate) fn set_root_element(&self, element: Element) {
        *self.data.element.borrow_mut() = Some(element);
    }

    pub(crate) fn set_rendering(&self, rendering: bool) {
        let flags = self.data.flags.get();
        self.data.flags.set(if rendering {
            flags | InstanceFlags::RENDERING
        } else {
            flags - InstanceFlags::RENDERING
        });
    }
}

fn seed_slots(schema: &Schema, config: &Config) -> BTreeMap<String, Signal<Value>> {
    let mut slots = BTreeMap::new();
    for field in schema.iter() {
        let initial = config
            .get(field.name)
            .cloned()
            .unwrap_or_else(|| field.default.clone());
        slots.insert(field.name.to_string(), signal(initial));
    }
    slots
}

// =============================================================================
// Ctx
// =============================================================================

/// What a behavior sees while rendering: the received configuration and
/// children, its declared slots, and the event-emission capability.
pub struct Ctx<'a> {
    instance: &'a Instance,
}

impl<'a> Ctx<'a> {
    pub(crate) fn new(instance: &'a Instance) -> Self {
        Self { instance }
    }

    /// A configuration value by name (`Null` when absent).
    pub fn get(&self, name: &str) -> Value {
        self.instance.config().get(name).cloned().unwrap_or(Value::Null)
    }

    /// The received children, in the order the owner's template wrote
    /// them. The component decides which of them (if any) to render.
    pub fn children(&self) -> Vec<Child> {
        self.instance.config().children().to_vec()
    }

    /// One received child by index.
    pub fn child(&self, index: usize) -> Option<Child> {
        self.instance.config().children().get(index).cloned()
    }

    pub fn state(&self, name: &str) -> Value {
        self.instance.state(name)
    }

    pub fn set_state(&self, name: &str, value: impl Into<Value>) {
        self.instance.set_state(name, value);
    }

    pub fn prop(&self, name: &str) -> Value {
        self.instance.prop(name)
    }

    pub fn emit(&self, event_type: &str, args: Vec<Value>) {
        self.instance.emit(event_type, args);
    }

    /// The instance being rendered.
    pub fn instance(&self) -> &Instance {
        self.instance
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::Component;
    use crate::renderer::Descriptor;

    #[derive(Default)]
    struct Counter;
    impl Behavior for Counter {
        fn render(&self, ctx: &Ctx<'_>) -> Result<Option<Descriptor>, RenderError> {
            Ok(Some(
                Descriptor::host("div").text(ctx.state("count").to_text()),
            ))
        }
    }
    impl Component for Counter {
        const NAME: &'static str = "Counter";

        fn state() -> Schema {
            Schema::new().field("count", 0i64)
        }
    }

    #[test]
    fn test_slots_seed_from_config_over_defaults() {
        let instance = Instance::create(
            ComponentType::of::<Counter>(),
            Config::new().with("count", 5i64),
        );
        assert_eq!(instance.state("count"), Value::Int(5));

        let defaulted = Instance::create(ComponentType::of::<Counter>(), Config::new());
        assert_eq!(defaulted.state("count"), Value::Int(0));
    }

    #[test]
    fn test_set_state_rerenders() {
        let container = Element::new("div");
        let instance = Instance::create(ComponentType::of::<Counter>(), Config::new());
        instance.mount(&container).unwrap();

        assert_eq!(container.text_content(), "0");

        instance.set_state("count", 3i64);
        assert_eq!(container.text_content(), "3");
        // Root element survives the re-render.
        assert_eq!(container.child_count(), 1);
    }

    #[test]
    fn test_undeclared_state_reads_null() {
        let instance = Instance::create(ComponentType::of::<Counter>(), Config::new());
        assert_eq!(instance.state("missing"), Value::Null);
    }

    #[test]
    fn test_dispose_is_idempotent() {
        let container = Element::new("div");
        let instance = Instance::create(ComponentType::of::<Counter>(), Config::new());
        instance.mount(&container).unwrap();
        instance.on("*", |_| {});

        instance.dispose();
        assert!(instance.is_disposed());
        assert_eq!(container.child_count(), 0);
        assert_eq!(instance.subscription_count(), 0);

        // Second disposal is a no-op.
        instance.dispose();
        assert!(instance.is_disposed());
    }

    #[test]
    fn test_writes_after_dispose_are_ignored() {
        let container = Element::new("div");
        let instance = Instance::create(ComponentType::of::<Counter>(), Config::new());
        instance.mount(&container).unwrap();
        instance.dispose();

        instance.set_state("count", 9i64);
        assert_eq!(container.child_count(), 0);
    }

    #[test]
    fn test_mount_after_dispose_fails() {
        let container = Element::new("div");
        let instance = Instance::create(ComponentType::of::<Counter>(), Config::new());
        instance.dispose();
        assert!(matches!(
            instance.mount(&container),
            Err(RenderError::Disposed)
        ));
    }

    #[derive(Default)]
    struct Failing;
    impl Behavior for Failing {
        fn render(&self, _ctx: &Ctx<'_>) -> Result<Option<Descriptor>, RenderError> {
            Err(RenderError::failed("boom"))
        }
    }
    impl Component for Failing {
        const NAME: &'static str = "Failing";
    }

    #[test]
    fn test_failed_first_render_propagates() {
        let container = Element::new("div");
        let instance = Instance::create(ComponentType::of::<Failing>(), Config::new());
        let err = instance.mount(&container).unwrap_err();
        assert!(matches!(err, RenderError::Failed(_)));
        assert!(instance.element().is_none());
    }

    #[test]
    fn test_emit_reaches_wildcard() {
        use std::cell::RefCell;

        let instance = Instance::create(ComponentType::of::<Counter>(), Config::new());
        let seen: Rc<RefCell<Vec<String>>> = Rc::new(RefCell::new(Vec::new()));
        let seen_clone = seen.clone();
        instance.on("*", move |event| {
            seen_clone.borrow_mut().push(event.event_type.clone());
        });

        instance.emit("changed", vec![Value::from("x")]);
        assert_eq!(*seen.borrow(), vec!["changed"]);
    }
}
