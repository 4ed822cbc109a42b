//! Tree rendering - descriptor resolution, mounting, re-render passes.
//!
//! [`render`] is the entry point: it resolves a descriptor (or a bare
//! component type / render function plus config) into a live tree inside
//! a container. Resolution priority is host tag, then component type
//! (reconciled through the owning registry), then plain function
//! (invoked in place, never tracked). `render_pass` is the same
//! machinery driven from an instance's render effect: the owner's
//! registry opens a generation, the output tree is mounted with child
//! components claimed or created against it, and untouched entries are
//! reaped when the pass succeeds.

use std::cell::RefCell;

use crate::component::Instance;
use crate::dom::{Element, Node};
use crate::error::RenderError;

use super::descriptor::{Child, Config, Descriptor, DescriptorType, RenderFn};
use super::registry::{self, ChildRegistry};

/// Bound on render-function chains (a function returning a function
/// returning a function ...), so a cyclic template fails fast instead of
/// overflowing the stack.
const MAX_FUNCTION_DEPTH: usize = 64;

// =============================================================================
// RenderRoot
// =============================================================================

/// Accepted `render` targets.
pub enum RenderRoot {
    Descriptor(Descriptor),
    Component(crate::component::ComponentType),
    Function(RenderFn),
}

impl RenderRoot {
    /// Wrap a plain render function.
    pub fn function(
        f: impl Fn(&Config) -> Result<Descriptor, RenderError> + 'static,
    ) -> Self {
        RenderRoot::Function(std::rc::Rc::new(f))
    }
}

impl From<Descriptor> for RenderRoot {
    fn from(descriptor: Descriptor) -> Self {
        RenderRoot::Descriptor(descriptor)
    }
}

impl From<crate::component::ComponentType> for RenderRoot {
    fn from(ty: crate::component::ComponentType) -> Self {
        RenderRoot::Component(ty)
    }
}

// =============================================================================
// Entry point
// =============================================================================

/// Render into a container.
///
/// `root` is a descriptor, a component type, or a render function
/// (wrapped via [`RenderRoot::function`]); `config` may be `None` when
/// `root` is a descriptor. The container's existing children are cleared
/// first (single-owner container assumption). Returns the top-level
/// instance, or `None` when the root resolves to plain nodes.
///
/// The container itself is the owning registry for components resolved
/// in this call: rendering again into the same container with stable
/// keys updates the existing instances in place and disposes the ones
/// whose keys disappeared.
pub fn render(
    root: impl Into<RenderRoot>,
    config: Option<Config>,
    container: &Element,
) -> Result<Option<Instance>, RenderError> {
    let descriptor = match root.into() {
        RenderRoot::Descriptor(descriptor) => match config {
            Some(config) => descriptor.merged(config),
            None => descriptor,
        },
        RenderRoot::Component(ty) => {
            Descriptor::component(ty).merged(config.unwrap_or_default())
        }
        RenderRoot::Function(f) => {
            Descriptor::new_function(f).merged(config.unwrap_or_default())
        }
    };

    let mut owner = registry::take_container_registry(container);
    owner.begin_pass();
    container.clear_children();

    let owner_cell = RefCell::new(owner);
    let result = mount_descriptor(&descriptor, container, &owner_cell, 0);
    let mut owner = owner_cell.into_inner();

    // Reap only after a successful pass: a failed pass leaves whatever
    // was mounted before the failure, and keeps untouched entries for
    // the next attempt.
    if result.is_ok() {
        owner.end_pass();
    }
    registry::store_container_registry(container, owner);
    result
}

// =============================================================================
// Descriptor mounting
// =============================================================================

/// Mount one descriptor into `parent`, resolving by type priority.
/// Returns the instance when the descriptor resolved to a component.
fn mount_descriptor(
    descriptor: &Descriptor,
    parent: &Element,
    owner: &RefCell<ChildRegistry>,
    depth: usize,
) -> Result<Option<Instance>, RenderError> {
    match descriptor.ty() {
        DescriptorType::Host(tag) => {
            let element = create_host_element(parent, tag);
            apply_config_attributes(&element, descriptor);
            for child in descriptor.child_list() {
                mount_child(child, &element, owner, depth)?;
            }
            // Subtree is built detached and appended once, so custom
            // elements inside connect exactly once.
            parent.append_child(element);
            Ok(None)
        }
        DescriptorType::Component(ty) => {
            let instance = reconcile_component(descriptor, ty.clone(), parent, owner)?;
            Ok(Some(instance))
        }
        DescriptorType::Function(f) => {
            if depth >= MAX_FUNCTION_DEPTH {
                return Err(RenderError::InvalidDescriptor(format!(
                    "render-function chain exceeded {MAX_FUNCTION_DEPTH} levels"
                )));
            }
            let produced = f(&descriptor.to_config())?;
            mount_descriptor(&produced, parent, owner, depth + 1)
        }
    }
}

fn mount_child(
    child: &Child,
    parent: &Element,
    owner: &RefCell<ChildRegistry>,
    depth: usize,
) -> Result<(), RenderError> {
    match child {
        Child::Text(text) => {
            parent.append_child(Node::text(text.clone()));
            Ok(())
        }
        Child::Node(descriptor) => {
            mount_descriptor(descriptor, parent, owner, depth).map(|_| ())
        }
    }
}

/// Claim or create the component for a descriptor through the owner's
/// registry, mounted under `parent`.
fn reconcile_component(
    descriptor: &Descriptor,
    ty: crate::component::ComponentType,
    parent: &Element,
    owner: &RefCell<ChildRegistry>,
) -> Result<Instance, RenderError> {
    let key = owner.borrow_mut().key_for(descriptor.descriptor_key());
    let existing = owner.borrow_mut().claim(&key, &ty);
    let config = descriptor.to_config();

    match existing {
        Some(instance) => {
            instance.set_container(parent);
            instance.deliver_config(config);
            if let Some(err) = instance.take_pending_error() {
                return Err(err);
            }
            // The re-render normally re-attaches the kept root element at
            // the current position; cover the case where it was deferred.
            if let Some(element) = instance.root_element() {
                if element.parent().is_none_or(|p| !p.ptr_eq(parent)) {
                    parent.append_child(element);
                }
            }
            Ok(instance)
        }
        None => {
            let instance = Instance::create(ty, config);
            owner.borrow_mut().insert(key.clone(), instance.clone());
            if let Err(err) = instance.mount(parent) {
                owner.borrow_mut().remove(&key);
                instance.dispose();
                return Err(err);
            }
            Ok(instance)
        }
    }
}

// =============================================================================
// Instance render passes
// =============================================================================

/// Run one render pass for an instance: produce the output descriptor,
/// reconcile the child registry, and attach the root element. Driven by
/// the instance's render effect; the first invocation is the initial
/// mount.
pub(crate) fn render_pass(instance: &Instance) -> Result<(), RenderError> {
    if instance.is_disposed() {
        return Err(RenderError::Disposed);
    }
    let Some(container) = instance.mount_container() else {
        return Ok(());
    };

    instance.set_rendering(true);
    let result = render_pass_inner(instance, &container);
    instance.set_rendering(false);
    result
}

fn render_pass_inner(instance: &Instance, container: &Element) -> Result<(), RenderError> {
    let output = instance.render_output()?;
    // A component without a template still has a root: an empty div.
    let descriptor = output.unwrap_or_else(|| Descriptor::host("div"));

    instance.registry().borrow_mut().begin_pass();
    let root = mount_component_root(instance, &descriptor, container, 0)?;
    instance.registry().borrow_mut().end_pass();

    attach_root(instance, container, root);
    Ok(())
}

/// Resolve a component's output descriptor into its root element,
/// patching the previous root in place when the host tag is unchanged so
/// element identity survives re-renders.
fn mount_component_root(
    instance: &Instance,
    descriptor: &Descriptor,
    container: &Element,
    depth: usize,
) -> Result<Element, RenderError> {
    match descriptor.ty() {
        DescriptorType::Host(tag) => {
            let previous = instance.root_element();
            let element = match previous {
                Some(prev) if prev.tag() == tag.as_str() && !prev.has_lifecycle() => {
                    sync_attributes(&prev, descriptor);
                    prev.clear_children();
                    prev
                }
                _ => {
                    let element = create_host_element(container, tag);
                    apply_config_attributes(&element, descriptor);
                    element
                }
            };
            for child in descriptor.child_list() {
                mount_child(child, &element, instance.registry(), depth)?;
            }
            Ok(element)
        }
        DescriptorType::Component(ty) => {
            // Component root: the nested instance's element doubles as
            // this instance's root.
            let nested =
                reconcile_component(descriptor, ty.clone(), container, instance.registry())?;
            nested.root_element().ok_or_else(|| {
                RenderError::failed(format!(
                    "component `{}` produced no root element",
                    nested.type_name()
                ))
            })
        }
        DescriptorType::Function(f) => {
            if depth >= MAX_FUNCTION_DEPTH {
                return Err(RenderError::InvalidDescriptor(format!(
                    "render-function chain exceeded {MAX_FUNCTION_DEPTH} levels"
                )));
            }
            let produced = f(&descriptor.to_config())?;
            mount_component_root(instance, &produced, container, depth + 1)
        }
    }
}

/// Place the pass's root element into the container, replacing the
/// previous root at its position when it changed.
fn attach_root(instance: &Instance, container: &Element, root: Element) {
    let attached_here = |el: &Element| el.parent().is_some_and(|p| p.ptr_eq(container));
    let previous = instance.root_element();

    match previous {
        Some(prev) if prev.ptr_eq(&root) => {
            if !attached_here(&root) {
                container.append_child(root.clone());
            }
        }
        Some(prev) => {
            if attached_here(&prev) && !attached_here(&root) {
                container.replace_child(root.clone(), &Node::Element(prev));
            } else {
                prev.detach();
                if !attached_here(&root) {
                    container.append_child(root.clone());
                }
            }
        }
        None => {
            if !attached_here(&root) {
                container.append_child(root.clone());
            }
        }
    }
    instance.set_root_element(root);
}

// =============================================================================
// Host elements
// =============================================================================

/// Create a host element through the parent's document (so registered
/// custom tags upgrade), falling back to a detached element when the
/// parent has none.
fn create_host_element(parent: &Element, tag: &str) -> Element {
    match parent.owner_document() {
        Some(document) => document.create_element(tag),
        None => Element::new(tag),
    }
}

/// Apply descriptor config entries as attributes on a fresh element.
/// `Null` entries set nothing.
fn apply_config_attributes(element: &Element, descriptor: &Descriptor) {
    for (name, value) in descriptor.config_entries() {
        if let Some(serialized) = value.to_attribute() {
            element.set_attribute(name, serialized);
        }
    }
}

/// Full attribute sync for a patched root: stale names are removed, then
/// every config entry is applied.
fn sync_attributes(element: &Element, descriptor: &Descriptor) {
    for name in element.attribute_names() {
        if descriptor.get(&name).is_none_or(|v| v.is_null()) {
            element.remove_attribute(&name);
        }
    }
    apply_config_attributes(element, descriptor);
}

// =============================================================================
// Tests
// =============================================================================
