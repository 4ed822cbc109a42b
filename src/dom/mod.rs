//! Host document model.
//!
//! A deliberately small DOM: elements and text nodes in `Rc`-shared
//! trees, attribute maps, `CustomEvent` dispatch with upward propagation,
//! and a custom-element registry with upgrade-on-create/adopt and the
//! connect/disconnect/attribute-changed callback machinery. Everything
//! the renderer and the custom-element adapter need from a host page,
//! nothing more.

mod document;
mod event;
mod node;

pub use document::{CustomElementRegistry, Document, ElementLifecycle};
pub use event::{CustomEvent, EventHandler, EventSubscription};
pub use node::{Element, Node, NodeFlags, TextNode, WeakElement};
