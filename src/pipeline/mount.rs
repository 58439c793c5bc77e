//! Mount API - persistent roots and the commit loop.
//!
//! Mounting binds a tree to a DOM node. The root gets one runtime, cached in
//! the document by node identity, which lives until the root is unmounted
//! or released.
//!
//! # Example
//!
//! ```ignore
//! use spark_vdom::pipeline::mount;
//!
//! let doc = Document::new();
//! let root = doc.create_element("div");
//! doc.body().append_child(&root)?;
//!
//! // Renders synchronously; the DOM is up to date when this returns
//! let handle = mount::mount(&root, component(app))?;
//!
//! // Setters commit synchronously too
//! doc.query_selector("button").map(|b| b.click()).transpose()?;
//!
//! // Run every effect cleanup and clear the root
//! handle.unmount()?;
//! ```
//!
//! # Commit loop
//!
//! ```text
//! schedule_render ──► RENDERING? ──yes──► mark RERENDER_QUEUED, return
//!                         │no
//!                         ▼
//!       ┌──► evaluate tree ─► replace root children ─► prune ─► flush effects
//!       │                                                             │
//!       └──────────────────── RERENDER_QUEUED set meanwhile? ◄────────┘
//! ```
//!
//! Setters called from effects or from nested mounts on the same root only
//! set the flag; the outer loop picks the request up before returning.

use std::rc::Rc;

use tracing::debug;

use crate::dom::{NodeId, NodeRef, WeakDocument};
use crate::engine::{CommitFlags, Runtime, RuntimeOptions, ROOT_PATH};
use crate::error::{RenderError, Result};
use crate::renderer::DomBackend;
use crate::vnode::Child;

// =============================================================================
// Mount target
// =============================================================================

/// Where a mounted runtime puts its output.
pub(crate) trait MountHost {
    /// Evaluate `tree` into fresh nodes and swap them in as the root's
    /// children. `Ok(false)` when the host is gone and there is nothing to
    /// render into. A failed build must not leave any nodes behind.
    fn build(&self, runtime: &Runtime, tree: &Child) -> Result<bool>;
}

/// What a mounted runtime renders and where.
#[derive(Clone)]
pub(crate) struct MountTarget {
    pub host: Rc<dyn MountHost>,
    pub tree: Child,
}

/// Root node of an in-memory [`Document`](crate::dom::Document).
struct DocumentHost {
    document: WeakDocument,
    root: NodeId,
}

impl MountHost for DocumentHost {
    fn build(&self, runtime: &Runtime, tree: &Child) -> Result<bool> {
        let Some(document) = self.document.upgrade() else {
            return Ok(false);
        };
        let Some(root) = document.node(self.root) else {
            return Err(RenderError::DetachedNode);
        };

        let mut backend = DomBackend::new(&document);
        let fresh = match runtime.evaluate(&mut backend, tree, ROOT_PATH) {
            Ok(fresh) => fresh,
            Err(error) => {
                backend.discard();
                return Err(error);
            }
        };
        if let Err(error) = root.replace_children(&fresh) {
            backend.discard();
            return Err(error);
        }
        Ok(true)
    }
}

// =============================================================================
// Mount Handle
// =============================================================================

/// Handle returned by [`mount`]. Dropping it leaves the root mounted.
#[derive(Debug, Clone)]
pub struct MountHandle {
    root: NodeRef,
}

impl MountHandle {
    pub fn root(&self) -> &NodeRef {
        &self.root
    }

    /// Whether the root still has a runtime.
    pub fn is_mounted(&self) -> bool {
        self.root.document().mounted_runtime(self.root.id()).is_some()
    }

    /// Stop rendering this root. See [`unmount`].
    pub fn unmount(self) -> Result<bool> {
        unmount(&self.root)
    }
}

// =============================================================================
// Mount / unmount
// =============================================================================

/// Render `tree` into `root` and keep it live.
///
/// Mounting again on the same root swaps the tree and re-renders with the
/// existing hook state.
pub fn mount(root: &NodeRef, tree: impl Into<Child>) -> Result<MountHandle> {
    mount_with_options(root, tree, RuntimeOptions::default())
}

/// [`mount`] with runtime options. The options only take effect when the
/// root's runtime is created.
pub fn mount_with_options(root: &NodeRef, tree: impl Into<Child>, options: RuntimeOptions) -> Result<MountHandle> {
    if !root.is_alive() {
        return Err(RenderError::DetachedNode);
    }

    let document = root.document();
    let tree = tree.into();

    let runtime = match document.mounted_runtime(root.id()) {
        Some(runtime) => {
            runtime.set_tree(tree);
            runtime
        }
        None => {
            let target = MountTarget {
                host: Rc::new(DocumentHost {
                    document: document.downgrade(),
                    root: root.id(),
                }),
                tree,
            };
            let runtime = Runtime::new_mounted(options, target);
            document.register_runtime(root.id(), runtime.clone());
            debug!(root = ?root.id(), "mounted new root");
            runtime
        }
    };

    runtime.schedule_render()?;
    Ok(MountHandle { root: root.clone() })
}

/// Drop the root's runtime, run all remaining effect cleanups and clear
/// the root. Returns `false` when nothing was mounted there.
pub fn unmount(root: &NodeRef) -> Result<bool> {
    let Some(runtime) = root.document().take_runtime(root.id()) else {
        return Ok(false);
    };

    runtime.detach_host();
    runtime.dispose();
    if root.is_alive() {
        root.clear_children()?;
    }
    debug!(root = ?root.id(), "unmounted root");
    Ok(true)
}

// =============================================================================
// Commit loop
// =============================================================================

/// Run queued re-renders of a mounted runtime until none is left.
///
/// Re-entrant calls (from effects, handlers run during the loop, or a
/// nested `mount` on the same root) return immediately; the running loop
/// sees the queued flag and renders again.
pub(crate) fn commit(runtime: &Runtime) -> Result<()> {
    if runtime.flags().contains(CommitFlags::RENDERING) {
        runtime.set_flag(CommitFlags::RERENDER_QUEUED, true);
        return Ok(());
    }

    runtime.set_flag(CommitFlags::RENDERING, true);
    let result = commit_loop(runtime);
    runtime.set_flag(CommitFlags::RENDERING, false);
    if result.is_err() {
        runtime.set_flag(CommitFlags::RERENDER_QUEUED, false);
    }
    result
}

fn commit_loop(runtime: &Runtime) -> Result<()> {
    let max_passes = runtime.options().max_commit_passes;
    let mut passes = 0;

    while runtime.flags().contains(CommitFlags::RERENDER_QUEUED) {
        runtime.set_flag(CommitFlags::RERENDER_QUEUED, false);

        passes += 1;
        if passes > max_passes {
            return Err(RenderError::RenderLoop { passes: max_passes });
        }

        let Some(target) = runtime.host().clone() else {
            // Unmounted while a commit was queued
            return Ok(());
        };

        if !commit_pass(runtime, &target)? {
            return Ok(());
        }
        debug!(pass = passes, stores = runtime.store_count(), "commit");
    }
    Ok(())
}

/// Build, swap, prune, flush. `Ok(false)` when the host is gone.
fn commit_pass(runtime: &Runtime, target: &MountTarget) -> Result<bool> {
    runtime.prepare();
    if !target.host.build(runtime, &target.tree)? {
        return Ok(false);
    }
    runtime.prune();
    runtime.flush_effects()?;
    Ok(true)
}
