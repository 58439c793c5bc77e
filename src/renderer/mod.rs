//! Output backends.
//!
//! - [`StringBackend`]: HTML text for server rendering ([`render_to_string`])
//! - [`DomBackend`]: fresh nodes in an in-memory [`Document`](crate::dom::Document),
//!   used by one-shot [`render_to_dom`] and by the mount commit loop
//! - `WebBackend` (feature `web`): browser nodes through `web_sys`
//!
//! Both share the attribute rules in [`html`]: `className` maps to `class`,
//! `true` is a bare attribute, `false`/null and event handlers are skipped.

pub mod html;
mod dom;
mod string;
#[cfg(feature = "web")]
mod web;

pub use dom::{render_to_dom, set_dom_prop, DomBackend};
pub use html::{escape_html, is_void_tag, render_attributes, style_string, VOID_TAGS};
pub use string::{render_to_string, render_to_string_with, StringBackend};
#[cfg(feature = "web")]
pub use web::{render_to_web, Listener, WebBackend, WebRender};
