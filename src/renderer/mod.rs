//! Tree renderer - descriptors, per-owner registries, mounting.
//!
//! The renderer turns immutable [`Descriptor`] trees into live component
//! instances and host elements. It owns the incremental-update
//! guarantee: within one owner, stable keys mean stable instances and
//! stable root elements across render passes, and keys that disappear
//! mean disposal.

mod descriptor;
pub(crate) mod registry;
mod render;

pub use descriptor::{Child, Config, Descriptor, DescriptorType, RenderFn};
pub use registry::reset_render_state;
pub use render::{RenderRoot, render};

pub(crate) use render::render_pass;
