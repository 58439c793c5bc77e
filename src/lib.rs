//! # spark-vdom
//!
//! Hook-based virtual DOM rendering for Rust, with server rendering and
//! island hydration.
//!
//! ## Architecture
//!
//! A tree of immutable [`VNode`]s is evaluated by a [`Runtime`]. Function
//! components keep their state in hook stores keyed by their position in
//! the tree, so the same position sees the same state on every render. A
//! different component rendered at that position starts from fresh state:
//!
//! ```text
//! VNode tree → Runtime (hooks, context, effects) → Backend → String | DOM
//! ```
//!
//! A one-shot render ([`render_to_string`], [`render_to_dom`]) uses a
//! throwaway runtime where effects never run. A mounted root ([`mount`])
//! keeps its runtime; every state change re-renders the whole tree and
//! swaps the root's children in one synchronous commit.
//!
//! ## Example
//!
//! ```ignore
//! use spark_vdom::*;
//!
//! fn counter(_: &Props) -> Result<Child> {
//!     let (count, set_count) = use_state(0)?;
//!     Ok(h("button")
//!         .on("click", move |_| set_count.update(|n| n + 1))
//!         .child(format!("count:{count}"))
//!         .into())
//! }
//!
//! let doc = Document::new();
//! mount(&doc.body(), component(counter))?;
//! doc.query_selector("button").map(|b| b.click()).transpose()?;
//! assert_eq!(doc.body().text_content(), "count:1");
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Props, prop values, styles, keys
//! - [`vnode`] - VNode model and builders (`h`, `component`, `fragment`)
//! - [`engine`] - Render runtime, hook stores, context
//! - [`hooks`] - `use_state`, `use_effect`, `use_context`, ...
//! - [`renderer`] - String and DOM backends
//! - [`dom`] - In-memory DOM host (browser nodes with the `web` feature)
//! - [`pipeline`] - Mount protocol and commit loop
//! - [`ssr`] - Islands, streaming, page templates, hydration entry

pub mod dom;
pub mod engine;
pub mod error;
pub mod hooks;
pub mod pipeline;
pub mod renderer;
pub mod ssr;
pub mod types;
pub mod vnode;

// Re-export commonly used items
pub use types::*;

pub use error::{RenderError, Result};

pub use vnode::{component, flatten, fragment, h, jsx, Child, Component, NodeBuilder, NodeKind, VNode};

pub use engine::{create_context, Backend, Cleanup, Context, ContextId, Runtime, RuntimeMode, RuntimeOptions};

pub use hooks::{
    use_callback, use_context, use_effect, use_memo, use_reducer, use_reducer_with_init, use_ref, use_state,
    use_state_with, Dispatch, Ref, StateSetter,
};

pub use renderer::{render_to_dom, render_to_string, render_to_string_with, DomBackend, StringBackend};

pub use dom::{Document, Event, NodeId, NodeRef};

pub use pipeline::{mount, mount_with_options, unmount, MountHandle};

#[cfg(feature = "web")]
pub use pipeline::{mount_web, mount_web_with_options, unmount_web};
#[cfg(feature = "web")]
pub use renderer::{render_to_web, WebBackend, WebRender};

pub use ssr::{
    apply_template, deserialize_state, html_chunks, hydrate_root, render_with_router, serialize_islands,
    serialize_state, stream_to_response, ChunkOptions, HydrateOptions, HydrationReport, Island, IslandOptions,
    IslandRegistry, PageParts, RenderedPage, Router,
};
