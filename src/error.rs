//! Error taxonomy for rendering and lifecycle failures.
//!
//! Failures surface synchronously to the nearest caller; nothing in the
//! crate retries. Callbacks invoked by the document's mutation machinery
//! (connect/disconnect, effect-driven re-renders) have no caller to hand
//! a `Result` to, so those paths log the error and leave the documented
//! partial state instead.

/// Errors produced by the renderer and component lifecycle.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RenderError {
    /// A descriptor could not be resolved to a host element, component,
    /// or render-function output (e.g. a render-function chain exceeding
    /// the nesting bound).
    #[error("invalid element descriptor: {0}")]
    InvalidDescriptor(String),

    /// A component's render step failed.
    #[error("render failed: {0}")]
    Failed(String),

    /// The operation targeted an instance that was already disposed.
    #[error("component instance already disposed")]
    Disposed,
}

impl RenderError {
    /// Shorthand for a component-side render failure.
    pub fn failed(message: impl Into<String>) -> Self {
        RenderError::Failed(message.into())
    }
}
