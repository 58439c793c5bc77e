//! Node arena, page globals and the per-root runtime cache.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;
use serde_json::Value;
use tracing::trace;

use crate::engine::Runtime;
use crate::types::EventHandler;

use super::NodeRef;

// =============================================================================
// Node storage
// =============================================================================

/// Generational handle into a document's node arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId {
    index: usize,
    generation: u32,
}

#[derive(Debug, Clone)]
pub(crate) enum NodeType {
    Element(Rc<str>),
    Text(String),
    Fragment,
}

pub(crate) struct NodeData {
    pub node_type: NodeType,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub attributes: IndexMap<String, String>,
    pub style: IndexMap<String, String>,
    pub listeners: Vec<(String, EventHandler)>,
}

impl NodeData {
    fn new(node_type: NodeType) -> Self {
        Self {
            node_type,
            parent: None,
            children: Vec::new(),
            attributes: IndexMap::new(),
            style: IndexMap::new(),
            listeners: Vec::new(),
        }
    }
}

struct Entry {
    generation: u32,
    data: Option<NodeData>,
}

#[derive(Default)]
struct Arena {
    entries: Vec<Entry>,
    /// Released indices for reuse.
    free: Vec<usize>,
}

impl Arena {
    fn allocate(&mut self, data: NodeData) -> NodeId {
        match self.free.pop() {
            Some(index) => {
                let entry = &mut self.entries[index];
                entry.generation = entry.generation.wrapping_add(1);
                entry.data = Some(data);
                NodeId {
                    index,
                    generation: entry.generation,
                }
            }
            None => {
                let index = self.entries.len();
                self.entries.push(Entry {
                    generation: 0,
                    data: Some(data),
                });
                NodeId { index, generation: 0 }
            }
        }
    }

    fn get(&self, id: NodeId) -> Option<&NodeData> {
        self.entries
            .get(id.index)
            .filter(|entry| entry.generation == id.generation)
            .and_then(|entry| entry.data.as_ref())
    }

    fn get_mut(&mut self, id: NodeId) -> Option<&mut NodeData> {
        self.entries
            .get_mut(id.index)
            .filter(|entry| entry.generation == id.generation)
            .and_then(|entry| entry.data.as_mut())
    }

    /// Free `id` and its whole subtree. Returns the freed ids.
    fn release(&mut self, id: NodeId) -> Vec<NodeId> {
        let mut freed = Vec::new();
        let mut stack = vec![id];

        while let Some(current) = stack.pop() {
            let Some(entry) = self.entries.get_mut(current.index) else {
                continue;
            };
            if entry.generation != current.generation {
                continue;
            }
            if let Some(data) = entry.data.take() {
                stack.extend(data.children);
                self.free.push(current.index);
                freed.push(current);
            }
        }
        freed
    }

    fn live_count(&self) -> usize {
        self.entries.iter().filter(|entry| entry.data.is_some()).count()
    }
}

// =============================================================================
// Document
// =============================================================================

pub(crate) struct DocumentInner {
    arena: RefCell<Arena>,
    body: NodeId,
    globals: RefCell<HashMap<String, Value>>,
    /// Mounted runtimes keyed by their root node.
    runtimes: RefCell<HashMap<NodeId, Runtime>>,
}

/// Shared handle to an in-memory document.
#[derive(Clone)]
pub struct Document(Rc<DocumentInner>);

/// Non-owning document handle (held by mounted runtimes).
#[derive(Clone)]
pub struct WeakDocument(Weak<DocumentInner>);

impl WeakDocument {
    pub fn upgrade(&self) -> Option<Document> {
        self.0.upgrade().map(Document)
    }
}

impl std::fmt::Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Document")
            .field("nodes", &self.node_count())
            .field("mounted", &self.0.runtimes.borrow().len())
            .finish()
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Empty document with a `<body>`.
    pub fn new() -> Self {
        let mut arena = Arena::default();
        let body = arena.allocate(NodeData::new(NodeType::Element("body".into())));
        Self(Rc::new(DocumentInner {
            arena: RefCell::new(arena),
            body,
            globals: RefCell::new(HashMap::new()),
            runtimes: RefCell::new(HashMap::new()),
        }))
    }

    pub fn downgrade(&self) -> WeakDocument {
        WeakDocument(Rc::downgrade(&self.0))
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub fn body(&self) -> NodeRef {
        NodeRef::new(self.clone(), self.0.body)
    }

    /// Handle for `id`, if the node is still alive.
    pub fn node(&self, id: NodeId) -> Option<NodeRef> {
        self.contains(id).then(|| NodeRef::new(self.clone(), id))
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.0.arena.borrow().get(id).is_some()
    }

    /// Number of live nodes, `<body>` included.
    pub fn node_count(&self) -> usize {
        self.0.arena.borrow().live_count()
    }

    pub fn create_element(&self, tag: &str) -> NodeRef {
        self.create(NodeType::Element(tag.to_ascii_lowercase().into()))
    }

    pub fn create_text_node(&self, text: &str) -> NodeRef {
        self.create(NodeType::Text(text.to_string()))
    }

    /// A fragment: appending it moves its children instead.
    pub fn create_fragment(&self) -> NodeRef {
        self.create(NodeType::Fragment)
    }

    fn create(&self, node_type: NodeType) -> NodeRef {
        let id = self.0.arena.borrow_mut().allocate(NodeData::new(node_type));
        NodeRef::new(self.clone(), id)
    }

    /// First match for `selector` in the document, `<body>` included.
    pub fn query_selector(&self, selector: &str) -> Option<NodeRef> {
        let body = self.body();
        if body.matches(selector) {
            return Some(body);
        }
        body.query_selector(selector)
    }

    // -------------------------------------------------------------------------
    // Globals
    // -------------------------------------------------------------------------

    /// Set a page global (the `window[key]` of a browser page).
    pub fn set_global(&self, key: &str, value: Value) {
        self.0.globals.borrow_mut().insert(key.to_string(), value);
    }

    pub fn global(&self, key: &str) -> Option<Value> {
        self.0.globals.borrow().get(key).cloned()
    }

    pub fn remove_global(&self, key: &str) -> Option<Value> {
        self.0.globals.borrow_mut().remove(key)
    }

    // -------------------------------------------------------------------------
    // Arena access
    // -------------------------------------------------------------------------

    pub(crate) fn with_node<R>(&self, id: NodeId, f: impl FnOnce(&NodeData) -> R) -> Option<R> {
        self.0.arena.borrow().get(id).map(f)
    }

    pub(crate) fn with_node_mut<R>(&self, id: NodeId, f: impl FnOnce(&mut NodeData) -> R) -> Option<R> {
        self.0.arena.borrow_mut().get_mut(id).map(f)
    }

    /// Free a detached subtree. Runtimes mounted anywhere inside it are
    /// disposed after the arena is updated.
    pub(crate) fn release(&self, id: NodeId) {
        let freed = self.0.arena.borrow_mut().release(id);
        trace!(count = freed.len(), "released dom nodes");

        let orphaned: Vec<Runtime> = {
            let mut runtimes = self.0.runtimes.borrow_mut();
            if runtimes.is_empty() {
                return;
            }
            freed.iter().filter_map(|id| runtimes.remove(id)).collect()
        };

        for runtime in orphaned {
            runtime.detach_host();
            runtime.dispose();
        }
    }

    // -------------------------------------------------------------------------
    // Runtime cache
    // -------------------------------------------------------------------------

    pub(crate) fn mounted_runtime(&self, root: NodeId) -> Option<Runtime> {
        self.0.runtimes.borrow().get(&root).cloned()
    }

    pub(crate) fn register_runtime(&self, root: NodeId, runtime: Runtime) {
        self.0.runtimes.borrow_mut().insert(root, runtime);
    }

    pub(crate) fn take_runtime(&self, root: NodeId) -> Option<Runtime> {
        self.0.runtimes.borrow_mut().remove(&root)
    }

    /// Number of roots with a mounted runtime.
    pub fn mounted_count(&self) -> usize {
        self.0.runtimes.borrow().len()
    }
}
