//! Hooks API - the functions components call to keep state between renders.
//!
//! Every hook claims the next slot of the component being evaluated, so hooks
//! must be called unconditionally and in the same order on every render:
//!
//! ```ignore
//! use spark_vdom::hooks::{use_state, use_effect};
//! use spark_vdom::vnode::{h, Child};
//!
//! fn counter(_: &Props) -> Result<Child> {
//!     let (count, set_count) = use_state(0)?;
//!
//!     use_effect(move || {
//!         tracing::info!(count, "rendered");
//!         Ok(None)
//!     }, Some(count))?;
//!
//!     Ok(h("button")
//!         .on("click", move |_| set_count.update(|n| n + 1))
//!         .child(format!("count:{count}"))
//!         .into())
//! }
//! ```
//!
//! Calling a hook outside a component fails with
//! [`RenderError::HookOutsideComponent`](crate::error::RenderError).

mod context;
mod effect;
mod memo;
mod state;

pub use context::use_context;
pub use effect::use_effect;
pub use memo::{use_callback, use_memo, use_ref, Ref};
pub use state::{use_reducer, use_reducer_with_init, use_state, use_state_with, Dispatch, StateSetter};

pub use crate::engine::{create_context, Cleanup, Context};
