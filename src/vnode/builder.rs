//! Node builders - the Rust stand-in for JSX.
//!
//! ```ignore
//! use spark_vdom::vnode::{h, component};
//!
//! let tree = h("section")
//!     .class_name("box")
//!     .style(Style::new().with("backgroundColor", "red"))
//!     .child(h("h1").child("Hello"))
//!     .child(component(counter).prop("start", 3))
//!     .build();
//! ```

use crate::dom::Event;
use crate::error::Result;
use crate::types::{EventHandler, Key, PropValue, Props, Style};

use super::{Child, Component, NodeKind, VNode};

/// Raw constructor, equivalent to a compiled JSX call.
pub fn jsx(kind: NodeKind, props: Props, key: Option<Key>) -> VNode {
    VNode::new(kind, props, key)
}

/// Start an element node.
pub fn h(tag: &str) -> NodeBuilder {
    NodeBuilder::new(NodeKind::Element(tag.into()))
}

/// Start a function-component node.
pub fn component<F>(render: F) -> NodeBuilder
where
    F: Fn(&Props) -> Result<Child> + 'static,
{
    NodeBuilder::new(NodeKind::Component(Component::new(render)))
}

/// Group children without a wrapping element.
pub fn fragment(children: impl Into<Child>) -> VNode {
    NodeBuilder::new(NodeKind::Fragment).child(children).build()
}

/// Fluent builder for a [`VNode`].
#[derive(Debug, Clone)]
pub struct NodeBuilder {
    kind: NodeKind,
    props: Props,
    key: Option<Key>,
    children: Vec<Child>,
}

impl NodeBuilder {
    pub fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            props: Props::new(),
            key: None,
            children: Vec::new(),
        }
    }

    /// Set any prop.
    pub fn prop(mut self, name: &str, value: impl Into<PropValue>) -> Self {
        self.props.insert(name, value);
        self
    }

    /// Attach typed data as a prop (read back with `Props::data`).
    pub fn data<T: 'static>(self, name: &str, value: T) -> Self {
        self.prop(name, PropValue::data(value))
    }

    pub fn id(self, id: &str) -> Self {
        self.prop("id", id)
    }

    pub fn class_name(self, class: &str) -> Self {
        self.prop("className", class)
    }

    pub fn style(self, style: Style) -> Self {
        self.prop("style", style)
    }

    /// Attach an event listener: `.on("click", ..)` sets the `onClick` prop.
    pub fn on<F>(self, event: &str, handler: F) -> Self
    where
        F: Fn(&Event) -> Result<()> + 'static,
    {
        let mut name = String::with_capacity(event.len() + 2);
        name.push_str("on");
        let mut chars = event.chars();
        if let Some(first) = chars.next() {
            name.extend(first.to_uppercase());
            name.push_str(chars.as_str());
        }
        self.prop(&name, EventHandler::new(handler))
    }

    pub fn key(mut self, key: impl Into<Key>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn child(mut self, child: impl Into<Child>) -> Self {
        self.children.push(child.into());
        self
    }

    pub fn children<I, C>(mut self, children: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<Child>,
    {
        self.children.extend(children.into_iter().map(Into::into));
        self
    }

    pub fn build(self) -> VNode {
        let Self {
            kind,
            mut props,
            key,
            mut children,
        } = self;

        // One child is stored bare, several as a list (jsx vs jsxs)
        match children.len() {
            0 => {}
            1 => props.insert("children", children.remove(0)),
            _ => props.insert("children", Child::List(children)),
        }

        VNode::new(kind, props, key)
    }
}

impl From<NodeBuilder> for VNode {
    fn from(builder: NodeBuilder) -> Self {
        builder.build()
    }
}

impl From<NodeBuilder> for Child {
    fn from(builder: NodeBuilder) -> Self {
        builder.build().into()
    }
}

impl From<NodeBuilder> for PropValue {
    fn from(builder: NodeBuilder) -> Self {
        PropValue::Children(builder.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_child_stored_bare() {
        let node = h("p").child("hi").build();
        assert!(matches!(node.props().children(), Child::Text(ref t) if &**t == "hi"));
    }

    #[test]
    fn test_many_children_stored_as_list() {
        let node = h("ul").child(h("li")).child(h("li")).build();
        assert!(matches!(node.props().children(), Child::List(ref items) if items.len() == 2));
    }

    #[test]
    fn test_on_builds_camel_case_prop() {
        let node = h("button").on("click", |_| Ok(())).build();
        assert!(matches!(node.props().get("onClick"), Some(PropValue::Handler(_))));
    }

    #[test]
    fn test_key_and_kind() {
        let node = h("li").key(3).build();
        assert_eq!(node.key(), Some(&Key::Int(3)));
        assert_eq!(node.tag(), Some("li"));

        let frag = fragment(vec!["a", "b"]);
        assert!(matches!(frag.kind(), NodeKind::Fragment));
        assert!(frag.tag().is_none());
    }
}
