//! Mount pipeline
//!
//! Connects the render runtime to a live DOM root.
//!
//! ```text
//! mount / setter ─► schedule_render ─► commit loop ─► DomBackend ─► root.replace_children
//! ```
//!
//! Every commit builds a complete fresh subtree and swaps it in. There is no
//! node-level diffing: the old subtree is released after the new one is
//! attached.
//!
//! With the `web` feature, the `web` module does the same for a
//! `web_sys::Element`.

pub mod mount;
#[cfg(feature = "web")]
pub mod web;

pub(crate) use mount::{commit, MountTarget};
pub use mount::{mount, mount_with_options, unmount, MountHandle};
#[cfg(feature = "web")]
pub use web::{is_web_mounted, mount_web, mount_web_with_options, unmount_web};
