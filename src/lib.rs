//! # weld-ui
//!
//! Reactive component tree renderer with custom-element bridging.
//!
//! Built on [spark-signals](https://crates.io/crates/spark-signals) for
//! fine-grained reactivity.
//!
//! ## Architecture
//!
//! A declarative template compiles to an immutable [`Descriptor`] tree;
//! the renderer resolves each node (host tag, component type, or plain
//! render function), instantiates or updates live instances through
//! per-owner keyed registries, and mounts the result into a container:
//!
//! ```text
//! Descriptor tree → render() → registry reconcile → Instance tree + DOM nodes
//! ```
//!
//! Each mounted [`Instance`] owns one render effect; writing a state
//! slot or re-delivering config re-runs its render pass, updating kept
//! children in place and reaping the rest.
//!
//! Independently, [`define_custom_element`] packages a component type as
//! a host custom element: attribute mutations flow in as input changes,
//! component events flow out as DOM `CustomEvent`s.
//!
//! ## Modules
//!
//! - [`types`] - The dynamic [`Value`] carried by configs, state, events
//! - [`dom`] - Host document model (elements, events, custom-element registry)
//! - [`component`] - Component base: behaviors, schemas, instances, emitter
//! - [`renderer`] - Descriptors, per-owner registries, the render entry point
//! - [`webcomponent`] - The custom element adapter

pub mod component;
pub mod dom;
pub mod error;
pub mod renderer;
pub mod types;
pub mod webcomponent;

// Re-export commonly used items
pub use types::Value;

pub use component::{
    Behavior, Component, ComponentEvent, ComponentType, Ctx, Emitter, Instance, Schema,
    Subscription, WILDCARD,
};

pub use dom::{CustomEvent, Document, Element, ElementLifecycle, EventSubscription, Node, TextNode};

pub use error::RenderError;

pub use renderer::{Child, Config, Descriptor, DescriptorType, RenderRoot, render, reset_render_state};

pub use webcomponent::{USE_SHADOW_DOM_ATTR, define_custom_element, wrapped_component};
