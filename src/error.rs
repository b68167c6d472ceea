//! Reconciler errors.
//!
//! Two families share one enum:
//! - **Usage errors** - hook lists that do not line up with the previous
//!   render, or updates sent to components that no longer exist. These are
//!   programming mistakes in component code.
//! - **Render failures** - a component reported that it could not produce
//!   its children. The render pass is abandoned and nothing is committed.

use thiserror::Error;

/// Errors raised while rendering or dispatching updates.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReconcileError {
    /// A component consumed fewer hooks than on its previous render.
    #[error("rendered fewer hooks than expected ({rendered} rendered, {expected} expected)")]
    TooFewHooks { expected: usize, rendered: usize },

    /// A component consumed more hooks than on its previous render.
    #[error("rendered more hooks than during the previous render (hook #{index})")]
    TooManyHooks { index: usize },

    /// The hook at a position changed kind or state type between renders.
    #[error("hook #{index} changed between renders: expected {expected}")]
    HookMismatch { index: usize, expected: &'static str },

    /// A component failed to render.
    #[error("component `{component}` failed to render: {message}")]
    Component { component: String, message: String },

    /// A state setter was called after its component was unmounted.
    #[error("state update on an unmounted component")]
    Unmounted,
}

impl ReconcileError {
    /// Build a component failure from inside a component body.
    pub fn component(component: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Component {
            component: component.into(),
            message: message.into(),
        }
    }

    /// True for mistakes in how hooks or setters were used, as opposed to
    /// a component reporting a failure.
    pub fn is_usage_error(&self) -> bool {
        !matches!(self, Self::Component { .. })
    }
}

/// Result of rendering a component.
pub type RenderResult<T> = Result<T, ReconcileError>;
