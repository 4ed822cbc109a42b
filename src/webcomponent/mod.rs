//! Custom element adapter.
//!
//! [`define_custom_element`] packages a component type as a host custom
//! element: the registered lifecycle creates the wrapped instance on
//! connect, destroys it on disconnect, forwards observed-attribute
//! mutations into the instance, and relays every component-emitted event
//! outward as a [`CustomEvent`] on the host element.
//!
//! The adapter is composition, not subclassing: one adapter object per
//! upgraded element, holding at most one wrapped instance at a time.

use std::any::Any;

use crate::component::{ComponentType, Instance, Subscription, WILDCARD};
use crate::dom::{CustomEvent, Document, Element, ElementLifecycle};
use crate::error::RenderError;
use crate::renderer::Config;
use crate::types::Value;

/// Non-observed attribute controlling shadow-root usage at connect time.
pub const USE_SHADOW_DOM_ATTR: &str = "useShadowDOM";

// =============================================================================
// Registration
// =============================================================================

/// Register `component` as a custom element under `tag`.
///
/// The observed-attribute set is computed once, here: the component's
/// declared `PROPS` keys when a props schema exists, else its
/// reactive-state keys. When the document has no custom-element
/// registry this is a deliberate no-op, not an error: registry absence
/// is expected environment variance.
pub fn define_custom_element(document: &Document, tag: &str, component: ComponentType) {
    let Some(registry) = document.custom_elements() else {
        tracing::debug!(tag, "no custom element registry available, skipping definition");
        return;
    };
    let observed = component.observed_attributes();
    let has_props = component.has_props();
    tracing::debug!(tag, component = component.name(), "defining custom element");
    registry.define(tag, observed, move || {
        Box::new(ComponentElementAdapter {
            component: component.clone(),
            has_props,
            wrapped: None,
            relay: None,
        })
    });
}

/// The wrapped instance behind an upgraded element, if it is currently
/// connected. Host-page code uses this to reach component state.
pub fn wrapped_component(element: &Element) -> Option<Instance> {
    element
        .with_lifecycle(|lifecycle| {
            lifecycle
                .as_any()
                .downcast_ref::<ComponentElementAdapter>()
                .and_then(|adapter| adapter.wrapped.clone())
        })
        .flatten()
}

// =============================================================================
// Adapter lifecycle
// =============================================================================

struct ComponentElementAdapter {
    component: ComponentType,
    has_props: bool,
    wrapped: Option<Instance>,
    relay: Option<Subscription>,
}

impl ElementLifecycle for ComponentElementAdapter {
    fn connected(&mut self, host: &Element) -> Result<(), RenderError> {
        // Mount target: an open shadow root when requested, else the
        // host element itself.
        let use_shadow = host
            .get_attribute(USE_SHADOW_DOM_ATTR)
            .map(|value| Value::from(value).is_truthy())
            .unwrap_or(false);
        let target = if use_shadow {
            host.attach_shadow()
        } else {
            host.clone()
        };

        // Snapshot the present observed attributes as the initial
        // config; absent attributes keep their schema defaults.
        let mut config = Config::new();
        for name in self.component.observed_attributes() {
            if let Some(value) = host.get_attribute(&name) {
                config.insert(name, value);
            }
        }

        let instance = Instance::create(self.component.clone(), config);
        instance.mount(&target)?;

        // Relay every component event outward. The host backlink is
        // weak: the instance must not keep the element alive.
        let weak_host = host.downgrade();
        let relay = instance.on(WILDCARD, move |event| {
            if let Some(host) = weak_host.upgrade() {
                host.dispatch_event(&CustomEvent::new(
                    event.event_type.clone(),
                    event.args.clone(),
                ));
            }
        });

        self.wrapped = Some(instance);
        self.relay = Some(relay);
        Ok(())
    }

    fn disconnected(&mut self, host: &Element) {
        // Safe without a prior successful connect: both slots are None.
        if let Some(instance) = self.wrapped.take() {
            tracing::debug!(tag = host.tag(), "disposing wrapped component");
            if let Some(relay) = self.relay.take() {
                instance.off(&relay);
            }
            instance.dispose();
        }
    }

    fn attribute_changed(
        &mut self,
        _host: &Element,
        name: &str,
        _old: Option<&str>,
        new: Option<&str>,
    ) {
        // Every reported change is forwarded, no diffing against the
        // old value.
        let Some(instance) = &self.wrapped else {
            return;
        };
        let value = new.map(Value::from).unwrap_or(Value::Null);
        if self.has_props {
            instance.set_prop(name, value);
        } else {
            instance.set_state(name, value);
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    use crate::component::{Behavior, Component, Ctx, Schema};
    use crate::renderer::Descriptor;

    #[derive(Default)]
    struct Badge;
    impl Behavior for Badge {
        fn render(&self, ctx: &Ctx<'_>) -> Result<Option<Descriptor>, RenderError> {
            Ok(Some(
                Descriptor::host("div")
                    .with("class", "badge")
                    .text(ctx.state("label").to_text()),
            ))
        }
    }
    impl Component for Badge {
        const NAME: &'static str = "Badge";

        fn state() -> Schema {
            Schema::new().field("label", "")
        }
    }

    #[derive(Default)]
    struct PropsBadge;
    impl Behavior for PropsBadge {
        fn render(&self, ctx: &Ctx<'_>) -> Result<Option<Descriptor>, RenderError> {
            Ok(Some(Descriptor::host("span").text(ctx.prop("label").to_text())))
        }
    }
    impl Component for PropsBadge {
        const NAME: &'static str = "PropsBadge";

        fn state() -> Schema {
            Schema::new().field("internal", 0i64)
        }

        fn props() -> Schema {
            Schema::new().field("label", "none")
        }
    }

    #[test]
    fn test_roundtrip_attribute_to_state() {
        let doc = Document::new();
        define_custom_element(&doc, "x-badge", ComponentType::of::<Badge>());

        let el = doc.create_element("x-badge");
        el.set_attribute("label", "v");
        doc.body().append_child(el.clone());

        let wrapped = wrapped_component(&el).expect("wrapped instance after connect");
        assert_eq!(wrapped.state("label"), Value::from("v"));
        assert_eq!(el.text_content(), "v");

        el.detach();
        assert!(wrapped.is_disposed());
        assert_eq!(wrapped.subscription_count(), 0);
        assert!(wrapped_component(&el).is_none());
        assert_eq!(el.child_count(), 0);
    }

    #[test]
    fn test_absent_attribute_keeps_default() {
        let doc = Document::new();
        define_custom_element(&doc, "x-props-badge", ComponentType::of::<PropsBadge>());

        let el = doc.create_element("x-props-badge");
        doc.body().append_child(el.clone());

        let wrapped = wrapped_component(&el).unwrap();
        assert_eq!(wrapped.prop("label"), Value::from("none"));
    }

    #[test]
    fn test_attribute_change_forwards_to_state_path() {
        let doc = Document::new();
        define_custom_element(&doc, "x-badge", ComponentType::of::<Badge>());

        let el = doc.create_element("x-badge");
        doc.body().append_child(el.clone());
        el.set_attribute("label", "updated");

        let wrapped = wrapped_component(&el).unwrap();
        assert_eq!(wrapped.state("label"), Value::from("updated"));
        assert_eq!(el.text_content(), "updated");

        el.remove_attribute("label");
        assert_eq!(wrapped.state("label"), Value::Null);
    }

    #[test]
    fn test_attribute_change_forwards_to_props_path() {
        let doc = Document::new();
        define_custom_element(&doc, "x-props-badge", ComponentType::of::<PropsBadge>());

        let el = doc.create_element("x-props-badge");
        doc.body().append_child(el.clone());
        el.set_attribute("label", "p");

        let wrapped = wrapped_component(&el).unwrap();
        assert_eq!(wrapped.prop("label"), Value::from("p"));
        // Internal state is untouched by the props path.
        assert_eq!(wrapped.state("internal"), Value::Int(0));
        assert_eq!(el.text_content(), "p");
    }

    #[test]
    fn test_event_relay_as_custom_event() {
        let doc = Document::new();
        define_custom_element(&doc, "x-badge", ComponentType::of::<Badge>());

        let el = doc.create_element("x-badge");
        doc.body().append_child(el.clone());

        let seen: Rc<RefCell<Vec<CustomEvent>>> = Rc::new(RefCell::new(Vec::new()));
        let seen_clone = seen.clone();
        // Ancestor listener: relayed events propagate upward.
        doc.body().add_event_listener("changed", move |event| {
            seen_clone.borrow_mut().push(event.clone());
        });

        let wrapped = wrapped_component(&el).unwrap();
        wrapped.emit("changed", vec![Value::from("payloadA")]);

        let seen = seen.borrow();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].event_type, "changed");
        assert_eq!(seen[0].detail, vec![Value::from("payloadA")]);
    }

    #[test]
    fn test_use_shadow_dom_mounts_into_shadow_root() {
        let doc = Document::new();
        define_custom_element(&doc, "x-badge", ComponentType::of::<Badge>());

        let el = doc.create_element("x-badge");
        el.set_attribute(USE_SHADOW_DOM_ATTR, "true");
        el.set_attribute("label", "s");
        doc.body().append_child(el.clone());

        let shadow = el.shadow_root().expect("shadow root attached");
        assert_eq!(el.child_count(), 0);
        assert_eq!(shadow.child_count(), 1);
        assert_eq!(shadow.text_content(), "s");
    }

    #[test]
    fn test_use_shadow_dom_false_mounts_into_host() {
        let doc = Document::new();
        define_custom_element(&doc, "x-badge", ComponentType::of::<Badge>());

        let el = doc.create_element("x-badge");
        el.set_attribute(USE_SHADOW_DOM_ATTR, "false");
        doc.body().append_child(el.clone());

        assert!(el.shadow_root().is_none());
        assert_eq!(el.child_count(), 1);
    }

    #[test]
    fn test_disconnect_without_connect_is_safe() {
        let mut adapter = ComponentElementAdapter {
            component: ComponentType::of::<Badge>(),
            has_props: false,
            wrapped: None,
            relay: None,
        };
        // Must not panic and must stay inert.
        adapter.disconnected(&Element::new("x-badge"));
        assert!(adapter.wrapped.is_none());
    }

    #[test]
    fn test_reconnect_creates_fresh_instance() {
        let doc = Document::new();
        define_custom_element(&doc, "x-badge", ComponentType::of::<Badge>());

        let el = doc.create_element("x-badge");
        el.set_attribute("label", "first");
        doc.body().append_child(el.clone());
        let first = wrapped_component(&el).unwrap();

        el.detach();
        assert!(first.is_disposed());

        el.set_attribute("label", "second");
        doc.body().append_child(el.clone());
        let second = wrapped_component(&el).unwrap();
        assert!(!second.is_disposed());
        assert_eq!(second.state("label"), Value::from("second"));
    }

    #[test]
    fn test_no_registry_is_noop() {
        let doc = Document::without_custom_elements();
        define_custom_element(&doc, "x-badge", ComponentType::of::<Badge>());

        let el = doc.create_element("x-badge");
        doc.body().append_child(el.clone());
        assert!(wrapped_component(&el).is_none());
    }

    #[derive(Default)]
    struct Exploding;
    impl Behavior for Exploding {
        fn render(&self, _ctx: &Ctx<'_>) -> Result<Option<Descriptor>, RenderError> {
            Err(RenderError::failed("explode"))
        }
    }
    impl Component for Exploding {
        const NAME: &'static str = "Exploding";
    }

    #[test]
    fn test_failed_connect_leaves_no_instance_and_safe_disconnect() {
        let doc = Document::new();
        define_custom_element(&doc, "x-explode", ComponentType::of::<Exploding>());

        let el = doc.create_element("x-explode");
        // Tree mutation survives the failing connectedCallback.
        doc.body().append_child(el.clone());
        assert!(wrapped_component(&el).is_none());

        // Disconnect after a failed connect must not panic.
        el.detach();
        assert!(wrapped_component(&el).is_none());
    }
}
