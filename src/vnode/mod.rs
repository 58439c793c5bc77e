//! VNode model - immutable descriptions of elements and component calls.
//!
//! A tree is a [`Child`]: text, numbers, booleans, nothing, nested lists, or
//! a [`VNode`]. A `VNode` carries a [`NodeKind`] that says up front what it
//! is, so the runtime dispatches with a `match` instead of sniffing types:
//!
//! ```text
//! Element("div")        -> backend emits an element, children at P.i
//! Component(counter)    -> runtime runs hooks + function, output at P.0
//! Fragment              -> children at P.f, no wrapper
//! Provider(context id)  -> pushes props["value"], children at P.p
//! ```

mod builder;

use std::any::TypeId;
use std::fmt;
use std::rc::Rc;

pub use builder::*;

use crate::engine::ContextId;
use crate::error::Result;
use crate::types::{Key, Props};

// =============================================================================
// Component
// =============================================================================

/// A function component: props in, tree out.
#[derive(Clone)]
pub struct Component {
    name: Rc<str>,
    render_type: TypeId,
    render: Rc<dyn Fn(&Props) -> Result<Child>>,
}

/// Identity of a component across renders: the render function's type plus
/// the component name. Every render builds a fresh `Component`, so the
/// `Rc` itself cannot serve as identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ComponentKey {
    render_type: TypeId,
    name: Rc<str>,
}

impl Component {
    /// Wrap a function. The name is taken from the function's path
    /// (`"anonymous"` for closures).
    pub fn new<F>(render: F) -> Self
    where
        F: Fn(&Props) -> Result<Child> + 'static,
    {
        Self::named(fn_name::<F>().unwrap_or("anonymous"), render)
    }

    pub fn named<F>(name: impl Into<Rc<str>>, render: F) -> Self
    where
        F: Fn(&Props) -> Result<Child> + 'static,
    {
        Self {
            name: name.into(),
            render_type: TypeId::of::<F>(),
            render: Rc::new(render),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether `other` is the same component (same function and name).
    pub fn same_as(&self, other: &Component) -> bool {
        self.key() == other.key()
    }

    pub(crate) fn key(&self) -> ComponentKey {
        ComponentKey {
            render_type: self.render_type,
            name: self.name.clone(),
        }
    }

    pub(crate) fn call(&self, props: &Props) -> Result<Child> {
        (self.render)(props)
    }
}

impl fmt::Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Component({})", self.name)
    }
}

/// Last path segment of a function item's type name, or `None` for closures.
pub(crate) fn fn_name<F>() -> Option<&'static str> {
    let full = std::any::type_name::<F>();
    if full.contains("{{closure}}") {
        return None;
    }
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().filter(|name| !name.is_empty())
}

// =============================================================================
// NodeKind / VNode
// =============================================================================

/// What a [`VNode`] is.
#[derive(Debug, Clone)]
pub enum NodeKind {
    /// Host element by tag name.
    Element(Rc<str>),
    /// Function component.
    Component(Component),
    /// Children without a wrapping element.
    Fragment,
    /// Context provider; the value lives in `props["value"]`.
    Provider(ContextId),
}

/// Immutable description of one element or component invocation.
#[derive(Debug, Clone)]
pub struct VNode {
    kind: NodeKind,
    props: Props,
    key: Option<Key>,
}

impl VNode {
    pub fn new(kind: NodeKind, props: Props, key: Option<Key>) -> Self {
        Self { kind, props, key }
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub fn props(&self) -> &Props {
        &self.props
    }

    pub fn key(&self) -> Option<&Key> {
        self.key.as_ref()
    }

    /// Tag name for element nodes.
    pub fn tag(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Element(tag) => Some(tag),
            _ => None,
        }
    }
}

// =============================================================================
// Child
// =============================================================================

/// Anything that can appear in a tree position.
#[derive(Debug, Clone, Default)]
pub enum Child {
    /// `null` / `undefined`: renders nothing.
    #[default]
    Empty,
    /// Booleans render nothing (they exist so `cond && node` patterns work).
    Bool(bool),
    Text(Rc<str>),
    Number(f64),
    Node(Rc<VNode>),
    List(Vec<Child>),
}

impl Child {
    pub fn is_empty(&self) -> bool {
        matches!(self, Child::Empty)
    }

    pub fn as_node(&self) -> Option<&VNode> {
        match self {
            Child::Node(node) => Some(node),
            _ => None,
        }
    }
}

/// Flatten nested lists into one ordered sequence.
///
/// A top-level `Empty` yields nothing; `Empty` entries inside lists are kept
/// so they still occupy their index.
pub fn flatten(child: &Child) -> Vec<Child> {
    fn walk(child: &Child, out: &mut Vec<Child>) {
        match child {
            Child::List(items) => {
                for item in items {
                    walk(item, out);
                }
            }
            other => out.push(other.clone()),
        }
    }

    let mut out = Vec::new();
    if !child.is_empty() {
        walk(child, &mut out);
    }
    out
}

impl From<VNode> for Child {
    fn from(node: VNode) -> Self {
        Child::Node(Rc::new(node))
    }
}

impl From<Rc<VNode>> for Child {
    fn from(node: Rc<VNode>) -> Self {
        Child::Node(node)
    }
}

impl From<&str> for Child {
    fn from(text: &str) -> Self {
        Child::Text(text.into())
    }
}

impl From<String> for Child {
    fn from(text: String) -> Self {
        Child::Text(text.into())
    }
}

impl From<&String> for Child {
    fn from(text: &String) -> Self {
        Child::Text(text.as_str().into())
    }
}

impl From<Rc<str>> for Child {
    fn from(text: Rc<str>) -> Self {
        Child::Text(text)
    }
}

impl From<bool> for Child {
    fn from(value: bool) -> Self {
        Child::Bool(value)
    }
}

impl From<()> for Child {
    fn from(_: ()) -> Self {
        Child::Empty
    }
}

impl<T: Into<Child>> From<Option<T>> for Child {
    fn from(value: Option<T>) -> Self {
        value.map_or(Child::Empty, Into::into)
    }
}

impl<T: Into<Child>> From<Vec<T>> for Child {
    fn from(items: Vec<T>) -> Self {
        Child::List(items.into_iter().map(Into::into).collect())
    }
}

macro_rules! number_child {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Child {
                fn from(value: $ty) -> Self {
                    Child::Number(value as f64)
                }
            }
        )*
    };
}

number_child!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize, f32, f64);

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(children: &[Child]) -> Vec<String> {
        children
            .iter()
            .map(|c| match c {
                Child::Text(t) => t.to_string(),
                Child::Empty => "<empty>".to_string(),
                other => format!("{other:?}"),
            })
            .collect()
    }

    #[test]
    fn test_flatten_nested_lists() {
        let tree = Child::from(vec![
            Child::from("a"),
            Child::from(vec![Child::from("b"), Child::from(vec!["c"])]),
            Child::from("d"),
        ]);

        assert_eq!(texts(&flatten(&tree)), vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn test_flatten_top_level_empty_is_nothing() {
        assert!(flatten(&Child::Empty).is_empty());
    }

    #[test]
    fn test_flatten_keeps_inner_empty_slots() {
        let tree = Child::from(vec![Child::from("a"), Child::Empty, Child::from("b")]);
        assert_eq!(texts(&flatten(&tree)), vec!["a", "<empty>", "b"]);
    }

    #[test]
    fn test_flatten_single_child() {
        let flat = flatten(&Child::from(7));
        assert_eq!(flat.len(), 1);
        assert!(matches!(flat[0], Child::Number(n) if n == 7.0));
    }

    fn sample_component(_: &Props) -> Result<Child> {
        Ok(Child::Empty)
    }

    #[test]
    fn test_component_names() {
        assert_eq!(Component::new(sample_component).name(), "sample_component");
        assert_eq!(Component::new(|_: &Props| Ok(Child::Empty)).name(), "anonymous");
        assert_eq!(Component::named("Counter", sample_component).name(), "Counter");
    }

    fn other_component(_: &Props) -> Result<Child> {
        Ok(Child::Empty)
    }

    #[test]
    fn test_component_identity() {
        let make = || Component::new(sample_component);
        assert!(make().same_as(&make()), "fresh wrappers of one fn are the same component");
        assert!(!make().same_as(&Component::new(other_component)));
        assert!(!make().same_as(&Component::named("Renamed", sample_component)));
    }
}
