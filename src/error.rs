//! Error types for rendering, mounting and hydration.
//!
//! Structural misuse (hooks outside a component, hook order drift, runaway
//! effect loops) fails loudly with a dedicated variant. Component failures
//! are plain `Err` values returned from component functions and travel up to
//! whoever called `render_to_string` / `mount` / a state setter.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T, E = RenderError> = std::result::Result<T, E>;

/// Everything that can go wrong while evaluating or committing a tree.
#[derive(Debug, Error)]
pub enum RenderError {
    /// A hook ran with no component being evaluated.
    #[error("{hook}() must be called inside a function component")]
    HookOutsideComponent { hook: &'static str },

    /// A component called a different hook at this slot than last time.
    #[error("hook order changed at `{path}` slot {index}: expected {expected}, found {found}")]
    HookOrder {
        path: String,
        index: usize,
        expected: &'static str,
        found: &'static str,
    },

    /// A component called more or fewer hooks than on its first render.
    #[error("hook count changed at `{path}`: expected {expected} hooks, found {found}")]
    HookCount {
        path: String,
        expected: usize,
        found: usize,
    },

    /// A hook slot holds a value of another type than the hook asked for.
    #[error("hook slot {index} at `{path}` holds a different type than {hook}() expects")]
    SlotType {
        path: String,
        index: usize,
        hook: &'static str,
    },

    /// Effects kept queueing more effects past the configured flush limit.
    #[error("effect queue did not drain after {passes} flush passes")]
    EffectLoop { passes: usize },

    /// Re-render requests kept arriving past the configured commit limit.
    #[error("commit loop did not settle after {passes} passes")]
    RenderLoop { passes: usize },

    /// The node is not (or no longer) part of a live document.
    #[error("node is not attached to a live document")]
    DetachedNode,

    /// A tree operation would put a node inside itself or its own subtree,
    /// or remove the document body.
    #[error("hierarchy request error: {0}")]
    HierarchyRequest(&'static str),

    /// An island key was registered twice on the same registry.
    #[error("island key \"{0}\" is already registered")]
    DuplicateIsland(String),

    /// Hydration found a payload entry with no registered component.
    #[error("island \"{0}\" is not registered")]
    UnknownIsland(String),

    /// A component (or effect, or event handler) reported a failure.
    #[error("{0}")]
    Component(String),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// A browser DOM call threw.
    #[cfg(feature = "web")]
    #[error("javascript error: {0}")]
    Js(String),
}

#[cfg(feature = "web")]
impl From<wasm_bindgen::JsValue> for RenderError {
    fn from(value: wasm_bindgen::JsValue) -> Self {
        value.as_string().map_or_else(|| Self::Js(format!("{value:?}")), Self::Js)
    }
}

impl RenderError {
    /// Build a component failure from any message.
    pub fn component(message: impl std::fmt::Display) -> Self {
        Self::Component(message.to_string())
    }
}
