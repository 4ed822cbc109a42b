//! Document - connected root, custom-element registry, upgrades.
//!
//! A [`Document`] owns a connected `body` element and (optionally) the
//! [`CustomElementRegistry`]. Registry absence models an environment
//! without custom-element support: adapter registration against such a
//! document is a deliberate no-op, which keeps everything above this
//! module testable without probing any real host.
//!
//! Custom tags are upgraded (their lifecycle installed) when an element
//! is created through the document, or when a detached element is
//! adopted into a document tree.

use std::any::Any;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::error::RenderError;

use super::node::{Element, Node};

// =============================================================================
// Element Lifecycle
// =============================================================================

/// The custom-element callback interface, as an explicit trait rather
/// than subclassing a platform element: each upgraded element owns one
/// lifecycle object, and the document's mutation machinery invokes these
/// hooks synchronously.
pub trait ElementLifecycle: 'static {
    /// The element joined a connected tree. A failure here is logged by
    /// the caller and must leave the element safely inert (a later
    /// `disconnected` still runs).
    fn connected(&mut self, host: &Element) -> Result<(), RenderError> {
        let _ = host;
        Ok(())
    }

    /// The element left the connected tree. Must tolerate being invoked
    /// without a prior successful `connected`.
    fn disconnected(&mut self, host: &Element) {
        let _ = host;
    }

    /// An observed attribute changed while connected. Fired in mutation
    /// order, once per mutation, with no diffing.
    fn attribute_changed(
        &mut self,
        host: &Element,
        name: &str,
        old: Option<&str>,
        new: Option<&str>,
    ) {
        let _ = (host, name, old, new);
    }

    /// Downcast support for host-page code that needs the concrete
    /// adapter behind an upgraded element.
    fn as_any(&self) -> &dyn Any;
}

// =============================================================================
// Custom Element Registry
// =============================================================================

pub(crate) struct CustomElementDefinition {
    pub(crate) observed: Rc<[String]>,
    pub(crate) make: Box<dyn Fn() -> Box<dyn ElementLifecycle>>,
}

/// Tag-name → definition registry.
pub struct CustomElementRegistry {
    definitions: RefCell<HashMap<String, Rc<CustomElementDefinition>>>,
}

impl CustomElementRegistry {
    pub(crate) fn new() -> Self {
        Self {
            definitions: RefCell::new(HashMap::new()),
        }
    }

    /// Register a definition. The observed-attribute list is fixed here,
    /// at definition time. Redefining a tag keeps the first definition.
    pub fn define(
        &self,
        tag: &str,
        observed: Vec<String>,
        factory: impl Fn() -> Box<dyn ElementLifecycle> + 'static,
    ) {
        let mut definitions = self.definitions.borrow_mut();
        if definitions.contains_key(tag) {
            tracing::warn!(tag, "custom element tag already defined, keeping first definition");
            return;
        }
        definitions.insert(
            tag.to_string(),
            Rc::new(CustomElementDefinition {
                observed: observed.into(),
                make: Box::new(factory),
            }),
        );
    }

    pub fn is_defined(&self, tag: &str) -> bool {
        self.definitions.borrow().contains_key(tag)
    }

    pub(crate) fn get(&self, tag: &str) -> Option<Rc<CustomElementDefinition>> {
        self.definitions.borrow().get(tag).cloned()
    }
}

// =============================================================================
// Document
// =============================================================================

pub(crate) struct DocumentData {
    body: Element,
    registry: Option<CustomElementRegistry>,
}

/// A minimal host document: a connected body plus custom-element support.
#[derive(Clone)]
pub struct Document {
    data: Rc<DocumentData>,
}

impl Document {
    /// Create a document with a custom-element registry.
    pub fn new() -> Self {
        Self::build(true)
    }

    /// Create a document without custom-element support (the
    /// environment-absence case adapter registration probes for).
    pub fn without_custom_elements() -> Self {
        Self::build(false)
    }

    fn build(with_registry: bool) -> Self {
        let data = Rc::new_cyclic(|weak| {
            let body = Element::new("body");
            body.set_document_weak(weak.clone());
            body.mark_connected_root();
            DocumentData {
                body,
                registry: with_registry.then(CustomElementRegistry::new),
            }
        });
        Self { data }
    }

    pub(crate) fn from_data(data: Rc<DocumentData>) -> Self {
        Self { data }
    }

    /// The document's connected root element.
    pub fn body(&self) -> &Element {
        &self.data.body
    }

    /// The registry, if this environment has one.
    pub fn custom_elements(&self) -> Option<&CustomElementRegistry> {
        self.data.registry.as_ref()
    }

    /// Create an element owned by this document, upgrading it when its
    /// tag is registered.
    pub fn create_element(&self, tag: impl Into<String>) -> Element {
        let element = Element::new(tag);
        element.set_document_weak(Rc::downgrade(&self.data));
        self.upgrade(&element);
        element
    }

    /// Install the registered lifecycle on an element whose tag is
    /// defined. Already-upgraded elements are left alone.
    pub(crate) fn upgrade(&self, element: &Element) {
        if element.has_lifecycle() {
            return;
        }
        let Some(registry) = self.custom_elements() else {
            return;
        };
        if let Some(definition) = registry.get(element.tag()) {
            element.install_lifecycle((definition.make)(), definition.observed.clone());
        }
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

/// Adopt a subtree into `document`: point every element at it and upgrade
/// registered tags. Runs before connection callbacks so upgrades are
/// visible to them.
pub(crate) fn adopt_subtree(document: &Document, element: &Element) {
    element.set_document_weak(Rc::downgrade(&document.data));
    document.upgrade(element);
    for child in element.children() {
        if let Node::Element(el) = child {
            adopt_subtree(document, &el);
        }
    }
    if let Some(shadow) = element.shadow_root() {
        adopt_subtree(document, &shadow);
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    /// Counting lifecycle used to observe callback dispatch.
    struct Probe {
        connects: Rc<Cell<u32>>,
        disconnects: Rc<Cell<u32>>,
        attributes: Rc<RefCell<Vec<(String, Option<String>)>>>,
    }

    impl ElementLifecycle for Probe {
        fn connected(&mut self, _host: &Element) -> Result<(), RenderError> {
            self.connects.set(self.connects.get() + 1);
            Ok(())
        }

        fn disconnected(&mut self, _host: &Element) {
            self.disconnects.set(self.disconnects.get() + 1);
        }

        fn attribute_changed(
            &mut self,
            _host: &Element,
            name: &str,
            _old: Option<&str>,
            new: Option<&str>,
        ) {
            self.attributes
                .borrow_mut()
                .push((name.to_string(), new.map(str::to_string)));
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    struct ProbeCounters {
        connects: Rc<Cell<u32>>,
        disconnects: Rc<Cell<u32>>,
        attributes: Rc<RefCell<Vec<(String, Option<String>)>>>,
    }

    fn define_probe(doc: &Document, tag: &str, observed: &[&str]) -> ProbeCounters {
        let counters = ProbeCounters {
            connects: Rc::new(Cell::new(0)),
            disconnects: Rc::new(Cell::new(0)),
            attributes: Rc::new(RefCell::new(Vec::new())),
        };
        let connects = counters.connects.clone();
        let disconnects = counters.disconnects.clone();
        let attributes = counters.attributes.clone();
        doc.custom_elements().unwrap().define(
            tag,
            observed.iter().map(|s| s.to_string()).collect(),
            move || {
                Box::new(Probe {
                    connects: connects.clone(),
                    disconnects: disconnects.clone(),
                    attributes: attributes.clone(),
                })
            },
        );
        counters
    }

    #[test]
    fn test_create_element_upgrades() {
        let doc = Document::new();
        define_probe(&doc, "x-probe", &[]);

        let el = doc.create_element("x-probe");
        assert!(el.has_lifecycle());

        let plain = doc.create_element("div");
        assert!(!plain.has_lifecycle());
    }

    #[test]
    fn test_connect_disconnect_fire_once() {
        let doc = Document::new();
        let counters = define_probe(&doc, "x-probe", &[]);

        let el = doc.create_element("x-probe");
        assert_eq!(counters.connects.get(), 0);

        doc.body().append_child(el.clone());
        assert_eq!(counters.connects.get(), 1);
        assert_eq!(counters.disconnects.get(), 0);

        el.detach();
        assert_eq!(counters.connects.get(), 1);
        assert_eq!(counters.disconnects.get(), 1);
    }

    #[test]
    fn test_adoption_upgrades_detached_elements() {
        let doc = Document::new();
        let counters = define_probe(&doc, "x-probe", &[]);

        // Created outside the document, upgraded on insertion.
        let el = Element::new("x-probe");
        assert!(!el.has_lifecycle());

        doc.body().append_child(el.clone());
        assert!(el.has_lifecycle());
        assert_eq!(counters.connects.get(), 1);
    }

    #[test]
    fn test_attribute_callback_observed_only() {
        let doc = Document::new();
        let counters = define_probe(&doc, "x-probe", &["label"]);

        let el = doc.create_element("x-probe");
        // Not connected yet: mutations are only visible as the connect
        // snapshot, not as individual callbacks.
        el.set_attribute("label", "early");
        assert!(counters.attributes.borrow().is_empty());

        doc.body().append_child(el.clone());
        el.set_attribute("label", "first");
        el.set_attribute("other", "ignored");
        el.set_attribute("label", "second");
        el.remove_attribute("label");

        let seen = counters.attributes.borrow();
        assert_eq!(
            *seen,
            vec![
                ("label".to_string(), Some("first".to_string())),
                ("label".to_string(), Some("second".to_string())),
                ("label".to_string(), None),
            ]
        );
    }

    #[test]
    fn test_redefinition_keeps_first() {
        let doc = Document::new();
        define_probe(&doc, "x-probe", &["a"]);

        struct Noop;
        impl ElementLifecycle for Noop {
            fn as_any(&self) -> &dyn Any {
                self
            }
        }
        doc.custom_elements()
            .unwrap()
            .define("x-probe", vec![], || Box::new(Noop));

        let el = doc.create_element("x-probe");
        doc.body().append_child(el.clone());
        el.set_attribute("a", "v");
        // First definition (observing "a") is still the live one.
        assert!(el.has_lifecycle());
    }

    #[test]
    fn test_without_custom_elements() {
        let doc = Document::without_custom_elements();
        assert!(doc.custom_elements().is_none());
        let el = doc.create_element("x-anything");
        assert!(!el.has_lifecycle());
    }
}
