//! Context - values handed down the tree without prop drilling.
//!
//! A [`Context`] is an id plus a default value. `Context::provider` builds a
//! `NodeKind::Provider` node; while the runtime evaluates that node's
//! children the value sits on top of the context's stack, and
//! [`use_context`](crate::hooks::use_context) reads it back.

use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::types::PropValue;
use crate::vnode::{Child, NodeBuilder, NodeKind, VNode};

static NEXT_CONTEXT_ID: AtomicUsize = AtomicUsize::new(0);

/// Identity of a context, used as the key of the runtime's value stacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextId(usize);

/// A typed context with a default value.
pub struct Context<T> {
    id: ContextId,
    default_value: Rc<T>,
}

impl<T> Clone for Context<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            default_value: self.default_value.clone(),
        }
    }
}

impl<T> fmt::Debug for Context<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context").field("id", &self.id).finish()
    }
}

/// Create a new context. Consumers with no provider above them see
/// `default_value`.
pub fn create_context<T: 'static>(default_value: T) -> Context<T> {
    Context {
        id: ContextId(NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed)),
        default_value: Rc::new(default_value),
    }
}

impl<T: 'static> Context<T> {
    pub fn id(&self) -> ContextId {
        self.id
    }

    pub fn default_value(&self) -> &T {
        &self.default_value
    }

    /// Provider node: `value` is visible to every consumer in `children`.
    pub fn provider(&self, value: T, children: impl Into<Child>) -> VNode {
        NodeBuilder::new(NodeKind::Provider(self.id))
            .prop("value", PropValue::data(value))
            .child(children)
            .build()
    }
}
