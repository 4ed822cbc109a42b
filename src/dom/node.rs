//! DOM node model - elements, text nodes, tree mutation.
//!
//! [`Element`] is a cheap-to-clone handle (`Rc` over interior-mutable
//! data); identity comparisons go through [`Element::ptr_eq`]. Tree
//! mutation keeps the custom-element contract: inserting into a connected
//! tree adopts the subtree into the parent's document (upgrading
//! registered tags) and then fires `connected` callbacks parent-first in
//! tree order; removal fires `disconnected` the same way. Both are
//! guarded by the connected flag so every transition invokes its callback
//! exactly once.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::{Rc, Weak};

use bitflags::bitflags;

use super::document::{self, Document, DocumentData, ElementLifecycle};
use super::event::{CustomEvent, EventSubscription, ListenerRegistry};

bitflags! {
    /// Node status bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct NodeFlags: u8 {
        /// Part of a document-connected tree.
        const CONNECTED = 1 << 0;
        /// This element is a shadow root.
        const SHADOW_ROOT = 1 << 1;
    }
}

// =============================================================================
// Node
// =============================================================================

/// A child slot in the tree: element or text.
#[derive(Clone)]
pub enum Node {
    Element(Element),
    Text(TextNode),
}

impl Node {
    /// Create a text node.
    pub fn text(content: impl Into<String>) -> Self {
        Node::Text(TextNode::new(content))
    }

    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Node::Element(el) => Some(el),
            Node::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&TextNode> {
        match self {
            Node::Text(text) => Some(text),
            Node::Element(_) => None,
        }
    }

    /// Concatenated text of this node and its descendants.
    pub fn text_content(&self) -> String {
        match self {
            Node::Element(el) => el.text_content(),
            Node::Text(text) => text.text(),
        }
    }

    /// Identity comparison (same underlying node).
    pub fn ptr_eq(&self, other: &Node) -> bool {
        match (self, other) {
            (Node::Element(a), Node::Element(b)) => a.ptr_eq(b),
            (Node::Text(a), Node::Text(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl From<Element> for Node {
    fn from(element: Element) -> Self {
        Node::Element(element)
    }
}

impl From<TextNode> for Node {
    fn from(text: TextNode) -> Self {
        Node::Text(text)
    }
}

// =============================================================================
// TextNode
// =============================================================================

/// A text node.
#[derive(Clone)]
pub struct TextNode {
    data: Rc<RefCell<String>>,
}

impl TextNode {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            data: Rc::new(RefCell::new(content.into())),
        }
    }

    pub fn text(&self) -> String {
        self.data.borrow().clone()
    }

    pub fn set_text(&self, content: impl Into<String>) {
        *self.data.borrow_mut() = content.into();
    }

    pub fn ptr_eq(&self, other: &TextNode) -> bool {
        Rc::ptr_eq(&self.data, &other.data)
    }
}

// =============================================================================
// Element
// =============================================================================

pub(crate) struct ElementData {
    pub(crate) tag: String,
    pub(crate) attributes: RefCell<BTreeMap<String, String>>,
    pub(crate) children: RefCell<Vec<Node>>,
    pub(crate) parent: RefCell<Option<Weak<ElementData>>>,
    pub(crate) flags: Cell<NodeFlags>,
    pub(crate) listeners: RefCell<ListenerRegistry>,
    pub(crate) lifecycle: RefCell<Option<Box<dyn ElementLifecycle>>>,
    pub(crate) observed: RefCell<Option<Rc<[String]>>>,
    pub(crate) shadow: RefCell<Option<Element>>,
    pub(crate) document: RefCell<Weak<DocumentData>>,
}

/// A DOM element handle.
#[derive(Clone)]
pub struct Element {
    data: Rc<ElementData>,
}

/// Weak counterpart of [`Element`].
#[derive(Clone)]
pub struct WeakElement {
    data: Weak<ElementData>,
}

impl WeakElement {
    pub fn upgrade(&self) -> Option<Element> {
        self.data.upgrade().map(|data| Element { data })
    }
}

impl Element {
    /// Create a detached element with no owner document.
    ///
    /// Elements created through [`Document::create_element`] are upgraded
    /// against the document's custom-element registry; elements created
    /// here are upgraded when they are adopted into a document tree.
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            data: Rc::new(ElementData {
                tag: tag.into(),
                attributes: RefCell::new(BTreeMap::new()),
                children: RefCell::new(Vec::new()),
                parent: RefCell::new(None),
                flags: Cell::new(NodeFlags::empty()),
                listeners: RefCell::new(ListenerRegistry::default()),
                lifecycle: RefCell::new(None),
                observed: RefCell::new(None),
                shadow: RefCell::new(None),
                document: RefCell::new(Weak::new()),
            }),
        }
    }

    pub fn tag(&self) -> &str {
        &self.data.tag
    }

    /// Identity comparison (same underlying element).
    pub fn ptr_eq(&self, other: &Element) -> bool {
        Rc::ptr_eq(&self.data, &other.data)
    }

    /// Stable identity key while any handle to this element is alive.
    pub(crate) fn node_id(&self) -> usize {
        Rc::as_ptr(&self.data) as usize
    }

    /// Weak handle for backlinks that must not keep the element alive.
    pub fn downgrade(&self) -> WeakElement {
        WeakElement {
            data: Rc::downgrade(&self.data),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.data.flags.get().contains(NodeFlags::CONNECTED)
    }

    pub fn is_shadow_root(&self) -> bool {
        self.data.flags.get().contains(NodeFlags::SHADOW_ROOT)
    }

    // =========================================================================
    // Attributes
    // =========================================================================

    pub fn get_attribute(&self, name: &str) -> Option<String> {
        self.data.attributes.borrow().get(name).cloned()
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.data.attributes.borrow().contains_key(name)
    }

    pub fn attribute_names(&self) -> Vec<String> {
        self.data.attributes.borrow().keys().cloned().collect()
    }

    /// Set an attribute, firing `attribute_changed` on the element's
    /// lifecycle when the element is connected and the name is observed.
    /// Every reported mutation is forwarded; no old/new diffing.
    pub fn set_attribute(&self, name: &str, value: impl Into<String>) {
        let value = value.into();
        let old = self
            .data
            .attributes
            .borrow_mut()
            .insert(name.to_string(), value.clone());
        self.notify_attribute(name, old.as_deref(), Some(value.as_str()));
    }

    pub fn remove_attribute(&self, name: &str) {
        let old = self.data.attributes.borrow_mut().remove(name);
        if old.is_some() {
            self.notify_attribute(name, old.as_deref(), None);
        }
    }

    fn notify_attribute(&self, name: &str, old: Option<&str>, new: Option<&str>) {
        if !self.is_connected() || !self.is_observed(name) {
            return;
        }
        let mut slot = self.data.lifecycle.borrow_mut();
        if let Some(lifecycle) = slot.as_mut() {
            lifecycle.attribute_changed(self, name, old, new);
        }
    }

    fn is_observed(&self, name: &str) -> bool {
        self.data
            .observed
            .borrow()
            .as_ref()
            .is_some_and(|observed| observed.iter().any(|attr| attr == name))
    }

    /// Check a whitespace-separated `class` attribute for one class name.
    pub fn has_class(&self, class: &str) -> bool {
        self.get_attribute("class")
            .is_some_and(|classes| classes.split_whitespace().any(|c| c == class))
    }

    // =========================================================================
    // Tree structure
    // =========================================================================

    pub fn parent(&self) -> Option<Element> {
        self.data
            .parent
            .borrow()
            .as_ref()
            .and_then(Weak::upgrade)
            .map(|data| Element { data })
    }

    pub fn children(&self) -> Vec<Node> {
        self.data.children.borrow().clone()
    }

    pub fn child(&self, index: usize) -> Option<Node> {
        self.data.children.borrow().get(index).cloned()
    }

    pub fn child_count(&self) -> usize {
        self.data.children.borrow().len()
    }

    /// Concatenated text of all descendants (light tree only).
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        for child in self.data.children.borrow().iter() {
            out.push_str(&child.text_content());
        }
        out
    }

    /// Append a child, moving it out of its previous parent first. The
    /// subtree is adopted into this element's document and, when this
    /// element is connected, connected in tree order.
    pub fn append_child(&self, child: impl Into<Node>) {
        let child = child.into();
        if let Node::Element(el) = &child {
            el.detach();
            *el.data.parent.borrow_mut() = Some(Rc::downgrade(&self.data));
            if let Some(doc) = self.owner_document() {
                document::adopt_subtree(&doc, el);
            }
        }
        self.data.children.borrow_mut().push(child.clone());
        if self.is_connected() {
            if let Node::Element(el) = &child {
                connect_subtree(el);
            }
        }
    }

    /// Replace `old` with `new` at the same position. Returns false when
    /// `old` is not a child of this element (nothing is mutated).
    pub fn replace_child(&self, new: impl Into<Node>, old: &Node) -> bool {
        let new = new.into();
        let index = {
            let children = self.data.children.borrow();
            match children.iter().position(|c| c.ptr_eq(old)) {
                Some(index) => index,
                None => return false,
            }
        };
        if let Node::Element(el) = &new {
            el.detach();
            *el.data.parent.borrow_mut() = Some(Rc::downgrade(&self.data));
            if let Some(doc) = self.owner_document() {
                document::adopt_subtree(&doc, el);
            }
        }
        let removed = {
            let mut children = self.data.children.borrow_mut();
            std::mem::replace(&mut children[index], new.clone())
        };
        if let Node::Element(el) = &removed {
            *el.data.parent.borrow_mut() = None;
            disconnect_subtree(el);
        }
        if self.is_connected() {
            if let Node::Element(el) = &new {
                connect_subtree(el);
            }
        }
        true
    }

    /// Remove one child. Returns false when `child` is not a child of
    /// this element.
    pub fn remove_child(&self, child: &Node) -> bool {
        let removed = {
            let mut children = self.data.children.borrow_mut();
            match children.iter().position(|c| c.ptr_eq(child)) {
                Some(index) => children.remove(index),
                None => return false,
            }
        };
        if let Node::Element(el) = &removed {
            *el.data.parent.borrow_mut() = None;
            disconnect_subtree(el);
        }
        true
    }

    /// Remove every child (single-owner container reset).
    pub fn clear_children(&self) {
        let children = std::mem::take(&mut *self.data.children.borrow_mut());
        for child in children {
            if let Node::Element(el) = &child {
                *el.data.parent.borrow_mut() = None;
                disconnect_subtree(el);
            }
        }
    }

    /// Remove this element from its parent, if any.
    pub fn detach(&self) {
        if let Some(parent) = self.parent() {
            parent.remove_child(&Node::Element(self.clone()));
        }
    }

    // =========================================================================
    // Shadow root
    // =========================================================================

    /// Attach (or return the existing) open shadow root.
    pub fn attach_shadow(&self) -> Element {
        if let Some(existing) = self.data.shadow.borrow().clone() {
            return existing;
        }
        let shadow = Element::new("#shadow-root");
        shadow.data.flags.set(NodeFlags::SHADOW_ROOT);
        *shadow.data.parent.borrow_mut() = Some(Rc::downgrade(&self.data));
        *shadow.data.document.borrow_mut() = self.data.document.borrow().clone();
        *self.data.shadow.borrow_mut() = Some(shadow.clone());
        if self.is_connected() {
            connect_subtree(&shadow);
        }
        shadow
    }

    pub fn shadow_root(&self) -> Option<Element> {
        self.data.shadow.borrow().clone()
    }

    // =========================================================================
    // Events
    // =========================================================================

    pub fn add_event_listener(
        &self,
        event_type: &str,
        handler: impl Fn(&CustomEvent) + 'static,
    ) -> EventSubscription {
        self.data.listeners.borrow_mut().add(event_type, handler)
    }

    pub fn remove_event_listener(&self, subscription: &EventSubscription) {
        self.data.listeners.borrow_mut().remove(subscription);
    }

    /// Total number of listeners registered on this element.
    pub fn listener_count(&self) -> usize {
        self.data.listeners.borrow().len()
    }

    /// Dispatch an event on this element and let it propagate upward
    /// through ancestors (shadow roots propagate into their host).
    pub fn dispatch_event(&self, event: &CustomEvent) {
        let mut current = Some(self.clone());
        while let Some(el) = current {
            let handlers = el.data.listeners.borrow().handlers_for(&event.event_type);
            for handler in handlers {
                handler(event);
            }
            current = el.parent();
        }
    }

    // =========================================================================
    // Document / lifecycle plumbing
    // =========================================================================

    pub fn owner_document(&self) -> Option<Document> {
        self.data.document.borrow().upgrade().map(Document::from_data)
    }

    pub(crate) fn set_document_weak(&self, document: Weak<DocumentData>) {
        *self.data.document.borrow_mut() = document;
    }

    pub(crate) fn install_lifecycle(
        &self,
        lifecycle: Box<dyn ElementLifecycle>,
        observed: Rc<[String]>,
    ) {
        *self.data.lifecycle.borrow_mut() = Some(lifecycle);
        *self.data.observed.borrow_mut() = Some(observed);
    }

    pub(crate) fn has_lifecycle(&self) -> bool {
        self.data.lifecycle.borrow().is_some()
    }

    /// Run a closure against the installed lifecycle, if any.
    pub(crate) fn with_lifecycle<R>(
        &self,
        f: impl FnOnce(&mut dyn ElementLifecycle) -> R,
    ) -> Option<R> {
        let mut slot = self.data.lifecycle.borrow_mut();
        slot.as_mut().map(|lifecycle| f(lifecycle.as_mut()))
    }

    /// Mark a document root as connected without firing callbacks
    /// (document roots are born connected and have no lifecycle).
    pub(crate) fn mark_connected_root(&self) {
        self.data.flags.set(self.data.flags.get() | NodeFlags::CONNECTED);
    }
}

// =============================================================================
// Connectedness propagation
// =============================================================================

/// Connect an element subtree: flag first (so callbacks observe the new
/// state and freshly appended children connect through the normal path),
/// then the element's own callback, then children and shadow in order.
pub(crate) fn connect_subtree(element: &Element) {
    if element.is_connected() {
        return;
    }
    element
        .data
        .flags
        .set(element.data.flags.get() | NodeFlags::CONNECTED);

    let failed = element
        .with_lifecycle(|lifecycle| lifecycle.connected(element))
        .and_then(Result::err);
    if let Some(err) = failed {
        // Platform semantics: an upgrade callback failure is logged, it
        // does not halt tree mutation or other callbacks.
        tracing::error!(tag = element.tag(), error = %err, "connectedCallback failed");
    }

    for child in element.children() {
        if let Node::Element(el) = child {
            connect_subtree(&el);
        }
    }
    if let Some(shadow) = element.shadow_root() {
        connect_subtree(&shadow);
    }
}

/// Disconnect an element subtree, firing `disconnected` exactly once per
/// previously-connected element.
pub(crate) fn disconnect_subtree(element: &Element) {
    if !element.is_connected() {
        return;
    }
    element
        .data
        .flags
        .set(element.data.flags.get() - NodeFlags::CONNECTED);

    element.with_lifecycle(|lifecycle| lifecycle.disconnected(element));

    for child in element.children() {
        if let Node::Element(el) = child {
            disconnect_subtree(&el);
        }
    }
    if let Some(shadow) = element.shadow_root() {
        disconnect_subtree(&shadow);
    }
}

// =============================================================================
// Tests
// =============================================================================
