//! Render Runtime - evaluates a tree, owns hook stores, context stacks and
//! the effect queue.
//!
//! # Modes
//!
//! - **Static**: one-shot renders (`render_to_string`, `render_to_dom`).
//!   Hooks work, setters never schedule anything, effects never run.
//! - **Mounted**: bound to a DOM root. Setters call `schedule_render`, which
//!   runs the commit loop in [`crate::pipeline`].
//!
//! # Traversal
//!
//! For a child at path `P`:
//!
//! ```text
//! Empty / Bool        -> backend.empty()
//! Text / Number       -> backend.text()
//! List                -> items at P.i, backend.list()
//! Fragment            -> children at P.f
//! Provider            -> push value, children at P.p, pop
//! Component           -> hooks frame at P, call, output at P.0
//! Element             -> flattened children at P.i (none for void tags)
//! ```
//!
//! After a pass, stores whose path was not visited are dropped (running
//! their effect cleanups) and the effect queue is drained.

use std::cell::{Cell, Ref, RefCell};
use std::collections::{HashMap, HashSet, VecDeque};
use std::rc::{Rc, Weak};

use bitflags::bitflags;
use indexmap::IndexMap;
use tracing::{debug, trace};

use crate::error::{RenderError, Result};
use crate::pipeline::MountTarget;
use crate::renderer::is_void_tag;
use crate::types::{format_number, PropValue, Props};
use crate::vnode::{flatten, Child, Component, NodeKind};

use super::context::ContextId;
use super::frame;
use super::store::{HookKind, HookStore, Slot};

/// Path of the tree root.
pub const ROOT_PATH: &str = "0";

// =============================================================================
// Options / flags
// =============================================================================

/// Runtime configuration, fixed when the runtime is created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeOptions {
    /// Fail when a component calls hooks in a different order or number
    /// than on its first render.
    pub check_hook_order: bool,
    /// Upper bound on drain passes of the effect queue per commit.
    pub max_flush_passes: usize,
    /// Upper bound on back-to-back commits triggered by re-render requests.
    pub max_commit_passes: usize,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self {
            check_hook_order: cfg!(debug_assertions),
            max_flush_passes: 100,
            max_commit_passes: 100,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeMode {
    Static,
    Mounted,
}

bitflags! {
    /// Commit loop state of a mounted runtime.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub(crate) struct CommitFlags: u8 {
        const RENDERING = 1 << 0;
        const RERENDER_QUEUED = 1 << 1;
    }
}

/// Output side of a traversal. The runtime handles components, providers,
/// fragments and paths; a backend only turns leaves and elements into
/// output.
pub trait Backend {
    type Output;

    /// Output for `Empty` / booleans.
    fn empty(&mut self) -> Result<Self::Output>;

    /// Output for text (unescaped input).
    fn text(&mut self, text: &str) -> Result<Self::Output>;

    /// Output for a list of sibling outputs.
    fn list(&mut self, items: Vec<Self::Output>) -> Result<Self::Output>;

    /// Output for an element. `children` is empty for void tags.
    fn element(&mut self, tag: &str, props: &Props, children: Vec<Self::Output>) -> Result<Self::Output>;
}

struct PendingEffect {
    path: Rc<str>,
    store: u64,
    index: usize,
}

// =============================================================================
// Runtime
// =============================================================================

pub(crate) struct RuntimeInner {
    mode: RuntimeMode,
    options: RuntimeOptions,
    stores: RefCell<IndexMap<Rc<str>, HookStore>>,
    next_store_id: Cell<u64>,
    contexts: RefCell<HashMap<ContextId, Vec<PropValue>>>,
    active_paths: RefCell<HashSet<Rc<str>>>,
    pending_effects: RefCell<VecDeque<PendingEffect>>,
    flags: Cell<CommitFlags>,
    host: RefCell<Option<MountTarget>>,
}

/// Shared handle to one render session or one mounted root.
#[derive(Clone)]
pub struct Runtime(Rc<RuntimeInner>);

/// Non-owning runtime handle (held by setters).
#[derive(Clone)]
pub(crate) struct WeakRuntime(Weak<RuntimeInner>);

impl WeakRuntime {
    pub fn upgrade(&self) -> Option<Runtime> {
        self.0.upgrade().map(Runtime)
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        self.0.ptr_eq(&other.0)
    }
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("mode", &self.0.mode)
            .field("stores", &self.0.stores.borrow().len())
            .finish()
    }
}

impl Runtime {
    fn with_mode(mode: RuntimeMode, options: RuntimeOptions, host: Option<MountTarget>) -> Self {
        Self(Rc::new(RuntimeInner {
            mode,
            options,
            stores: RefCell::new(IndexMap::new()),
            next_store_id: Cell::new(0),
            contexts: RefCell::new(HashMap::new()),
            active_paths: RefCell::new(HashSet::new()),
            pending_effects: RefCell::new(VecDeque::new()),
            flags: Cell::new(CommitFlags::empty()),
            host: RefCell::new(host),
        }))
    }

    /// A disposable runtime for one-shot renders.
    pub fn new_static(options: RuntimeOptions) -> Self {
        Self::with_mode(RuntimeMode::Static, options, None)
    }

    pub(crate) fn new_mounted(options: RuntimeOptions, host: MountTarget) -> Self {
        Self::with_mode(RuntimeMode::Mounted, options, Some(host))
    }

    pub fn mode(&self) -> RuntimeMode {
        self.0.mode
    }

    pub fn options(&self) -> &RuntimeOptions {
        &self.0.options
    }

    /// Number of live hook stores (one per rendered component position).
    pub fn store_count(&self) -> usize {
        self.0.stores.borrow().len()
    }

    /// Paths of the live hook stores, in creation order.
    pub fn store_paths(&self) -> Vec<String> {
        self.0.stores.borrow().keys().map(|p| p.to_string()).collect()
    }

    pub(crate) fn downgrade(&self) -> WeakRuntime {
        WeakRuntime(Rc::downgrade(&self.0))
    }

    pub(crate) fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    // -------------------------------------------------------------------------
    // Host (mounted mode)
    // -------------------------------------------------------------------------

    pub(crate) fn host(&self) -> Ref<'_, Option<MountTarget>> {
        self.0.host.borrow()
    }

    pub(crate) fn set_tree(&self, tree: Child) {
        if let Some(host) = self.0.host.borrow_mut().as_mut() {
            host.tree = tree;
        }
    }

    pub(crate) fn detach_host(&self) -> Option<MountTarget> {
        self.0.host.borrow_mut().take()
    }

    pub(crate) fn flags(&self) -> CommitFlags {
        self.0.flags.get()
    }

    pub(crate) fn set_flag(&self, flag: CommitFlags, on: bool) {
        let mut flags = self.0.flags.get();
        flags.set(flag, on);
        self.0.flags.set(flags);
    }

    /// Request a re-render. No-op for static runtimes.
    pub(crate) fn schedule_render(&self) -> Result<()> {
        match self.0.mode {
            RuntimeMode::Static => Ok(()),
            RuntimeMode::Mounted => {
                self.set_flag(CommitFlags::RERENDER_QUEUED, true);
                crate::pipeline::commit(self)
            }
        }
    }

    // -------------------------------------------------------------------------
    // Render pass
    // -------------------------------------------------------------------------

    /// One full pass: evaluate, prune, flush.
    pub fn render<B: Backend>(&self, backend: &mut B, tree: &Child) -> Result<B::Output> {
        self.prepare();
        let output = self.evaluate(backend, tree, ROOT_PATH)?;
        self.prune();
        self.flush_effects()?;
        Ok(output)
    }

    /// Reset per-pass bookkeeping.
    pub(crate) fn prepare(&self) {
        self.0.active_paths.borrow_mut().clear();
        self.0.pending_effects.borrow_mut().clear();
    }

    /// Evaluate `node` at `path` into backend output.
    pub fn evaluate<B: Backend>(&self, backend: &mut B, node: &Child, path: &str) -> Result<B::Output> {
        match node {
            Child::Empty | Child::Bool(_) => backend.empty(),
            Child::Text(text) => backend.text(text),
            Child::Number(number) => backend.text(&format_number(*number)),
            Child::List(items) => {
                let mut outputs = Vec::with_capacity(items.len());
                for (i, item) in items.iter().enumerate() {
                    outputs.push(self.evaluate(backend, item, &format!("{path}.{i}"))?);
                }
                backend.list(outputs)
            }
            Child::Node(vnode) => {
                let props = vnode.props();
                match vnode.kind() {
                    NodeKind::Fragment => self.evaluate(backend, &props.children(), &format!("{path}.f")),
                    NodeKind::Provider(context) => {
                        let value = props.get("value").cloned().unwrap_or_default();
                        let _pushed = self.push_context(*context, value);
                        self.evaluate(backend, &props.children(), &format!("{path}.p"))
                    }
                    NodeKind::Component(component) => {
                        let output = self.invoke(component, props, path)?;
                        self.evaluate(backend, &output, &format!("{path}.0"))
                    }
                    NodeKind::Element(tag) => {
                        let mut children = Vec::new();
                        if !is_void_tag(tag) {
                            for (i, child) in flatten(&props.children()).iter().enumerate() {
                                children.push(self.evaluate(backend, child, &format!("{path}.{i}"))?);
                            }
                        }
                        backend.element(tag, props, children)
                    }
                }
            }
        }
    }

    /// Run a component function with its hook store active.
    fn invoke(&self, component: &Component, props: &Props, path: &str) -> Result<Child> {
        let path: Rc<str> = Rc::from(path);
        self.0.active_paths.borrow_mut().insert(path.clone());
        let store = self.ensure_store(&path, component);

        let frame = frame::enter(self.clone(), path.clone(), store);
        let output = component.call(props)?;
        let hooks = frame.hooks_called();
        drop(frame);

        self.seal_store(&path, hooks)?;
        Ok(output)
    }

    /// Id of the store `component` renders with at `path`.
    ///
    /// A store left behind by another component at the same path is
    /// dropped first (its cleanups run) and a fresh one takes its place.
    pub(crate) fn ensure_store(&self, path: &str, component: &Component) -> u64 {
        let owner = component.key();
        let mut stores = self.0.stores.borrow_mut();
        if let Some(store) = stores.get(path)
            && store.is_owned_by(&owner)
        {
            return store.id();
        }

        let id = self.0.next_store_id.get();
        self.0.next_store_id.set(id + 1);
        trace!(path, component = component.name(), "hook store created");

        let fresh = HookStore::new(id, owner);
        let mut previous = match stores.get_mut(path) {
            Some(existing) => std::mem::replace(existing, fresh),
            None => {
                stores.insert(Rc::from(path), fresh);
                return id;
            }
        };
        drop(stores);

        debug!(path, component = component.name(), "component changed, hook store reset");
        for cleanup in previous.take_cleanups() {
            cleanup();
        }
        id
    }

    fn seal_store(&self, path: &str, hooks: usize) -> Result<()> {
        let check = self.0.options.check_hook_order;
        let mut stores = self.0.stores.borrow_mut();
        let Some(store) = stores.get_mut(path) else {
            return Ok(());
        };

        if check && store.is_rendered() && hooks < store.kinds().len() {
            return Err(RenderError::HookCount {
                path: path.to_string(),
                expected: store.kinds().len(),
                found: hooks,
            });
        }
        store.seal(hooks);
        Ok(())
    }

    /// Validate and record the hook kind for slot `index` of `path`.
    pub(crate) fn claim_slot(&self, path: &str, index: usize, kind: HookKind) -> Result<()> {
        let check = self.0.options.check_hook_order;
        let mut stores = self.0.stores.borrow_mut();
        let Some(store) = stores.get_mut(path) else {
            return Ok(());
        };

        match store.kinds().get(index).copied() {
            Some(expected) if check && expected != kind => Err(RenderError::HookOrder {
                path: path.to_string(),
                index,
                expected: expected.name(),
                found: kind.name(),
            }),
            Some(_) => Ok(()),
            None if check && store.is_rendered() => Err(RenderError::HookCount {
                path: path.to_string(),
                expected: store.kinds().len(),
                found: index + 1,
            }),
            None => {
                store.record_kind(index, kind);
                Ok(())
            }
        }
    }

    pub(crate) fn with_store<R>(&self, path: &str, f: impl FnOnce(&mut HookStore) -> R) -> Option<R> {
        let mut stores = self.0.stores.borrow_mut();
        stores.get_mut(path).map(f)
    }

    // -------------------------------------------------------------------------
    // Context stacks
    // -------------------------------------------------------------------------

    fn push_context(&self, context: ContextId, value: PropValue) -> ContextGuard<'_> {
        self.0.contexts.borrow_mut().entry(context).or_default().push(value);
        ContextGuard {
            runtime: self,
            context,
        }
    }

    /// Innermost provided value for `context`, if any provider is active.
    pub(crate) fn context_value(&self, context: ContextId) -> Option<PropValue> {
        self.0.contexts.borrow().get(&context).and_then(|stack| stack.last().cloned())
    }

    // -------------------------------------------------------------------------
    // Pruning / effects
    // -------------------------------------------------------------------------

    /// Drop stores not visited this pass, running their cleanups.
    pub(crate) fn prune(&self) {
        let mut removed = Vec::new();
        {
            let active = self.0.active_paths.borrow();
            self.0.stores.borrow_mut().retain(|path, store| {
                if active.contains(path) {
                    true
                } else {
                    removed.push(std::mem::take(store));
                    false
                }
            });
        }

        if !removed.is_empty() {
            debug!(count = removed.len(), "pruned hook stores");
        }
        for mut store in removed {
            for cleanup in store.take_cleanups() {
                cleanup();
            }
        }
    }

    /// Drop every store, running all cleanups (unmount).
    pub(crate) fn dispose(&self) {
        let stores = std::mem::take(&mut *self.0.stores.borrow_mut());
        self.0.pending_effects.borrow_mut().clear();
        for (_, mut store) in stores {
            for cleanup in store.take_cleanups() {
                cleanup();
            }
        }
    }

    pub(crate) fn queue_effect(&self, path: Rc<str>, store: u64, index: usize) {
        if self.0.mode == RuntimeMode::Static {
            return;
        }
        self.0
            .pending_effects
            .borrow_mut()
            .push_back(PendingEffect { path, store, index });
    }

    /// Drain the effect queue until it stays empty.
    pub(crate) fn flush_effects(&self) -> Result<()> {
        if self.0.mode == RuntimeMode::Static {
            return Ok(());
        }

        let mut passes = 0;
        loop {
            let batch: Vec<PendingEffect> = self.0.pending_effects.borrow_mut().drain(..).collect();
            if batch.is_empty() {
                return Ok(());
            }

            passes += 1;
            if passes > self.0.options.max_flush_passes {
                self.0.pending_effects.borrow_mut().clear();
                return Err(RenderError::EffectLoop {
                    passes: self.0.options.max_flush_passes,
                });
            }

            for pending in batch {
                self.run_effect(&pending)?;
            }
        }
    }

    /// Previous cleanup, then the new body; keep the body's cleanup.
    fn run_effect(&self, pending: &PendingEffect) -> Result<()> {
        let taken = self.with_store(&pending.path, |store| {
            if store.id() != pending.store {
                return None;
            }
            match store.slot_mut(pending.index) {
                Some(Slot::Effect(entry)) => Some((entry.cleanup.take(), entry.effect.take())),
                _ => None,
            }
        });
        let Some(Some((cleanup, effect))) = taken else {
            return Ok(());
        };

        trace!(path = %pending.path, slot = pending.index, "running effect");
        if let Some(cleanup) = cleanup {
            cleanup();
        }
        let Some(effect) = effect else {
            return Ok(());
        };

        let next_cleanup = effect()?;
        let orphan = {
            let mut stores = self.0.stores.borrow_mut();
            let store = stores.get_mut(&*pending.path).filter(|s| s.id() == pending.store);
            match store.and_then(|s| s.slot_mut(pending.index)) {
                Some(Slot::Effect(entry)) => {
                    entry.cleanup = next_cleanup;
                    None
                }
                _ => next_cleanup,
            }
        };

        // The component left the tree while its effect ran
        if let Some(cleanup) = orphan {
            cleanup();
        }
        Ok(())
    }
}

/// Pops a context value when the provider's subtree is done (or failed).
struct ContextGuard<'a> {
    runtime: &'a Runtime,
    context: ContextId,
}

impl Drop for ContextGuard<'_> {
    fn drop(&mut self) {
        let mut contexts = self.runtime.0.contexts.borrow_mut();
        if let Some(stack) = contexts.get_mut(&self.context) {
            stack.pop();
            if stack.is_empty() {
                contexts.remove(&self.context);
            }
        }
    }
}
