//! Render Engine - hook stores, the active hook frame and the runtime.
//!
//! The engine owns everything that lives between renders:
//! - Runtime: evaluates a tree against a [`Backend`], keeps one hook store per
//!   component path, context stacks and the effect queue
//! - HookStore: slot arena addressed by hook call index
//! - Frame: the component currently running, so hooks know where to write
//! - Context: typed values handed down through provider nodes
//!
//! # Architecture
//!
//! Components are NOT objects. A component is identified by its position in
//! the tree, and its state lives in the store registered for that path:
//!
//! ```text
//! "0"       App      [ State(todos) ]
//! "0.0"     Header   [ Context(theme) ]
//! "0.0.0.1" Counter  [ State(count), Effect(title) ]
//! ```
//!
//! Rendering the same tree shape again reaches the same paths, so the same
//! hooks see the same slots.

mod context;
pub(crate) mod frame;
mod runtime;
pub(crate) mod store;

pub use context::{create_context, Context, ContextId};
pub use runtime::{Backend, Runtime, RuntimeMode, RuntimeOptions, ROOT_PATH};
pub use store::Cleanup;

pub(crate) use runtime::CommitFlags;
