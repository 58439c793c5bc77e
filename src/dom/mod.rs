//! In-memory DOM - the host the DOM backend and mount protocol write into.
//!
//! A [`Document`] is a node arena with a free-index pool. Handles are
//! [`NodeRef`]s (document + generational [`NodeId`]), so a handle to a
//! released node goes inert instead of aliasing the next node that reuses
//! its slot:
//!
//! ```text
//! slot 3: gen 1 <div>   <- NodeRef { index: 3, generation: 1 }
//! release(3)            -> slot 3 pushed to free pool
//! slot 3: gen 2 "text"  <- old handle no longer resolves
//! ```
//!
//! # Example
//!
//! ```ignore
//! use spark_vdom::dom::Document;
//!
//! let doc = Document::new();
//! let button = doc.create_element("button");
//! button.set_attribute("id", "go");
//! doc.body().append_child(&button)?;
//!
//! doc.query_selector("#go").map(|b| b.click());
//! ```

mod document;
mod event;
mod node;
mod selector;

pub use document::{Document, NodeId, WeakDocument};
pub use event::Event;
pub use node::NodeRef;
