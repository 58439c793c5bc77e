//! Node handles and tree operations.

use std::fmt;

use crate::error::{RenderError, Result};
use crate::renderer::{escape_html, is_void_tag};
use crate::types::EventHandler;

use super::document::{NodeData, NodeType};
use super::selector::Selector;
use super::{Document, Event, NodeId};

/// Handle to one node of a [`Document`].
///
/// Read operations on a released node return empty values and setters are
/// ignored. Tree operations fail with [`RenderError::DetachedNode`].
#[derive(Clone)]
pub struct NodeRef {
    doc: Document,
    id: NodeId,
}

impl PartialEq for NodeRef {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.doc.ptr_eq(&other.doc)
    }
}

impl fmt::Debug for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = self.doc.with_node(self.id, |node| match &node.node_type {
            NodeType::Element(tag) => format!("<{tag}>"),
            NodeType::Text(text) => format!("{text:?}"),
            NodeType::Fragment => "#fragment".to_string(),
        });
        f.debug_struct("NodeRef")
            .field("id", &self.id)
            .field("node", &label.unwrap_or_else(|| "released".to_string()))
            .finish()
    }
}

impl NodeRef {
    pub(crate) fn new(doc: Document, id: NodeId) -> Self {
        Self { doc, id }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn document(&self) -> &Document {
        &self.doc
    }

    pub fn is_alive(&self) -> bool {
        self.doc.contains(self.id)
    }

    fn live(&self) -> Result<()> {
        if self.is_alive() { Ok(()) } else { Err(RenderError::DetachedNode) }
    }

    /// Lowercase tag name, `None` for text and fragment nodes.
    pub fn tag_name(&self) -> Option<String> {
        self.doc
            .with_node(self.id, |node| match &node.node_type {
                NodeType::Element(tag) => Some(tag.to_string()),
                _ => None,
            })
            .flatten()
    }

    pub fn is_text(&self) -> bool {
        self.doc
            .with_node(self.id, |node| matches!(node.node_type, NodeType::Text(_)))
            .unwrap_or(false)
    }

    pub fn parent(&self) -> Option<NodeRef> {
        self.doc
            .with_node(self.id, |node| node.parent)
            .flatten()
            .map(|id| NodeRef::new(self.doc.clone(), id))
    }

    pub fn children(&self) -> Vec<NodeRef> {
        self.doc
            .with_node(self.id, |node| node.children.clone())
            .unwrap_or_default()
            .into_iter()
            .map(|id| NodeRef::new(self.doc.clone(), id))
            .collect()
    }

    // =========================================================================
    // Tree mutation
    // =========================================================================

    /// Whether `other` is this node or one of its descendants.
    pub fn contains(&self, other: &NodeRef) -> bool {
        if !self.doc.ptr_eq(&other.doc) {
            return false;
        }
        let mut current = Some(other.id);
        while let Some(id) = current {
            if id == self.id {
                return true;
            }
            current = self.doc.with_node(id, |node| node.parent).flatten();
        }
        false
    }

    /// Append `child`, moving it out of its current parent. Appending a
    /// fragment moves the fragment's children and releases the fragment.
    ///
    /// Fails with [`RenderError::HierarchyRequest`] when `child` is this
    /// node or one of its ancestors.
    pub fn append_child(&self, child: &NodeRef) -> Result<()> {
        self.live()?;
        child.live()?;
        if child.contains(self) {
            return Err(RenderError::HierarchyRequest("cannot insert a node into its own subtree"));
        }

        let fragment_children = self.doc.with_node(child.id, |node| match node.node_type {
            NodeType::Fragment => Some(node.children.clone()),
            _ => None,
        });

        match fragment_children.flatten() {
            Some(moved) => {
                for id in moved {
                    self.attach(id);
                }
                self.doc.with_node_mut(child.id, |node| node.children.clear());
                self.doc.release(child.id);
            }
            None => self.attach(child.id),
        }
        Ok(())
    }

    fn attach(&self, id: NodeId) {
        let old_parent = self.doc.with_node(id, |node| node.parent).flatten();
        if let Some(old_parent) = old_parent {
            self.doc
                .with_node_mut(old_parent, |node| node.children.retain(|c| *c != id));
        }
        self.doc.with_node_mut(id, |node| node.parent = Some(self.id));
        self.doc.with_node_mut(self.id, |node| node.children.push(id));
    }

    /// Swap every child for `fresh`, then release the old children.
    ///
    /// `fresh` is attached before anything is released, so the node is never
    /// left pointing at freed children.
    /// `fresh` may already be one of the children; it is kept.
    pub fn replace_children(&self, fresh: &NodeRef) -> Result<()> {
        self.live()?;
        fresh.live()?;
        if fresh.contains(self) {
            return Err(RenderError::HierarchyRequest("cannot insert a node into its own subtree"));
        }

        let old = self
            .doc
            .with_node_mut(self.id, |node| std::mem::take(&mut node.children))
            .unwrap_or_default();
        for id in &old {
            self.doc.with_node_mut(*id, |node| node.parent = None);
        }

        self.append_child(fresh)?;
        for id in old.into_iter().filter(|id| *id != fresh.id) {
            self.doc.release(id);
        }
        Ok(())
    }

    /// Detach this node from its parent and release it with its subtree.
    ///
    /// This is how a detached tree (a dropped `render_to_dom` result, say)
    /// gives its nodes back. The document body cannot be removed.
    pub fn remove(&self) -> Result<()> {
        self.live()?;
        if *self == self.doc.body() {
            return Err(RenderError::HierarchyRequest("the document body cannot be removed"));
        }

        if let Some(parent) = self.doc.with_node(self.id, |node| node.parent).flatten() {
            self.doc
                .with_node_mut(parent, |node| node.children.retain(|c| *c != self.id));
        }
        self.doc.release(self.id);
        Ok(())
    }

    /// Remove and release every child.
    pub fn clear_children(&self) -> Result<()> {
        self.live()?;
        let old = self
            .doc
            .with_node_mut(self.id, |node| std::mem::take(&mut node.children))
            .unwrap_or_default();
        for id in old {
            self.doc.release(id);
        }
        Ok(())
    }

    // =========================================================================
    // Attributes, style, listeners
    // =========================================================================

    pub fn set_attribute(&self, name: &str, value: &str) {
        self.doc.with_node_mut(self.id, |node| {
            node.attributes.insert(name.to_string(), value.to_string());
        });
    }

    pub fn remove_attribute(&self, name: &str) {
        self.doc.with_node_mut(self.id, |node| {
            node.attributes.shift_remove(name);
        });
    }

    pub fn attribute(&self, name: &str) -> Option<String> {
        self.doc
            .with_node(self.id, |node| node.attributes.get(name).cloned())
            .flatten()
    }

    /// Set one CSS property (kebab-case name).
    pub fn set_style_property(&self, property: &str, value: &str) {
        self.doc.with_node_mut(self.id, |node| {
            node.style.insert(property.to_string(), value.to_string());
        });
    }

    pub fn style_property(&self, property: &str) -> Option<String> {
        self.doc
            .with_node(self.id, |node| node.style.get(property).cloned())
            .flatten()
    }

    pub fn add_event_listener(&self, event_type: &str, handler: EventHandler) {
        self.doc.with_node_mut(self.id, |node| {
            node.listeners.push((event_type.to_string(), handler));
        });
    }

    pub fn listener_count(&self, event_type: &str) -> usize {
        self.doc
            .with_node(self.id, |node| node.listeners.iter().filter(|(t, _)| t == event_type).count())
            .unwrap_or(0)
    }

    // =========================================================================
    // Events
    // =========================================================================

    /// Dispatch `event` at this node and bubble it through the ancestors.
    ///
    /// The propagation path and its listeners are captured before the first
    /// listener runs, so listeners may freely rebuild the tree.
    pub fn dispatch_event(&self, event: &Event) -> Result<()> {
        let mut path = Vec::new();
        let mut current = Some(self.id);
        while let Some(id) = current {
            let Some((handlers, parent)) = self.doc.with_node(id, |node| {
                let handlers: Vec<EventHandler> = node
                    .listeners
                    .iter()
                    .filter(|(t, _)| t == event.event_type())
                    .map(|(_, h)| h.clone())
                    .collect();
                (handlers, node.parent)
            }) else {
                break;
            };
            path.push((id, handlers));
            current = parent;
        }

        for (id, handlers) in path {
            event.set_current_target(id);
            for handler in handlers {
                handler.call(event)?;
            }
            if event.propagation_stopped() {
                break;
            }
        }
        Ok(())
    }

    /// Dispatch a bubbling `click`.
    pub fn click(&self) -> Result<()> {
        self.dispatch_event(&Event::new("click", self.clone()))
    }

    // =========================================================================
    // Queries / serialization
    // =========================================================================

    pub(crate) fn matches(&self, selector: &str) -> bool {
        let Some(selector) = Selector::parse(selector) else {
            return false;
        };
        self.doc.with_node(self.id, |node| selector.matches(node)).unwrap_or(false)
    }

    /// First descendant matching `selector`, in document order.
    pub fn query_selector(&self, selector: &str) -> Option<NodeRef> {
        self.query(selector, true).into_iter().next()
    }

    /// Every descendant matching `selector`, in document order.
    pub fn query_selector_all(&self, selector: &str) -> Vec<NodeRef> {
        self.query(selector, false)
    }

    fn query(&self, selector: &str, first_only: bool) -> Vec<NodeRef> {
        let Some(selector) = Selector::parse(selector) else {
            return Vec::new();
        };

        let mut found = Vec::new();
        let mut stack: Vec<NodeId> = self.children().iter().rev().map(NodeRef::id).collect();
        while let Some(id) = stack.pop() {
            let visited = self.doc.with_node(id, |node| {
                (selector.matches(node), node.children.clone())
            });
            let Some((matched, children)) = visited else {
                continue;
            };
            if matched {
                found.push(NodeRef::new(self.doc.clone(), id));
                if first_only {
                    break;
                }
            }
            stack.extend(children.into_iter().rev());
        }
        found
    }

    /// Concatenated text of this node and its descendants.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        self.collect_text(self.id, &mut out);
        out
    }

    fn collect_text(&self, id: NodeId, out: &mut String) {
        let children = self.doc.with_node(id, |node| {
            if let NodeType::Text(text) = &node.node_type {
                out.push_str(text);
            }
            node.children.clone()
        });
        for child in children.unwrap_or_default() {
            self.collect_text(child, out);
        }
    }

    /// Serialized markup of the children.
    pub fn inner_html(&self) -> String {
        let mut out = String::new();
        for child in self.doc.with_node(self.id, |node| node.children.clone()).unwrap_or_default() {
            self.serialize(child, &mut out);
        }
        out
    }

    /// Serialized markup of this node.
    pub fn outer_html(&self) -> String {
        let mut out = String::new();
        self.serialize(self.id, &mut out);
        out
    }

    fn serialize(&self, id: NodeId, out: &mut String) {
        let children = self.doc.with_node(id, |node| {
            write_open(node, out);
            node.children.clone()
        });
        let Some(children) = children else {
            return;
        };

        for child in children {
            self.serialize(child, out);
        }

        self.doc.with_node(id, |node| {
            if let NodeType::Element(tag) = &node.node_type
                && !is_void_tag(tag)
            {
                out.push_str("</");
                out.push_str(tag);
                out.push('>');
            }
        });
    }
}

fn write_open(node: &NodeData, out: &mut String) {
    let tag = match &node.node_type {
        NodeType::Text(text) => {
            out.push_str(&escape_html(text));
            return;
        }
        NodeType::Fragment => return,
        NodeType::Element(tag) => tag,
    };

    out.push('<');
    out.push_str(tag);
    for (name, value) in &node.attributes {
        out.push(' ');
        out.push_str(name);
        if !value.is_empty() {
            out.push_str("=\"");
            out.push_str(&escape_html(value));
            out.push('"');
        }
    }
    if !node.style.is_empty() && !node.attributes.contains_key("style") {
        let style: Vec<String> = node.style.iter().map(|(k, v)| format!("{k}:{v}")).collect();
        out.push_str(" style=\"");
        out.push_str(&escape_html(&style.join(";")));
        out.push('"');
    }
    out.push('>');
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn tree() -> (Document, NodeRef, NodeRef) {
        let doc = Document::new();
        let outer = doc.create_element("div");
        outer.set_attribute("id", "outer");
        let button = doc.create_element("button");
        button.set_attribute("data-role", "go");
        let label = doc.create_text_node("Go <now>");

        button.append_child(&label).unwrap();
        outer.append_child(&button).unwrap();
        doc.body().append_child(&outer).unwrap();
        (doc, outer, button)
    }

    #[test]
    fn test_inner_html_and_text() {
        let (doc, outer, _) = tree();
        assert_eq!(
            doc.body().inner_html(),
            "<div id=\"outer\"><button data-role=\"go\">Go &lt;now&gt;</button></div>"
        );
        assert_eq!(outer.text_content(), "Go <now>");
    }

    #[test]
    fn test_query_selector() {
        let (doc, outer, button) = tree();
        assert_eq!(doc.query_selector("#outer"), Some(outer.clone()));
        assert_eq!(doc.query_selector("[data-role=\"go\"]"), Some(button.clone()));
        assert_eq!(outer.query_selector("button"), Some(button));
        assert!(outer.query_selector("#outer").is_none(), "descendants only");
        assert!(doc.query_selector("span").is_none());
    }

    #[test]
    fn test_fragment_children_are_spliced() {
        let doc = Document::new();
        let list = doc.create_element("ul");
        let frag = doc.create_fragment();
        for text in ["a", "b"] {
            let li = doc.create_element("li");
            li.append_child(&doc.create_text_node(text)).unwrap();
            frag.append_child(&li).unwrap();
        }

        list.append_child(&frag).unwrap();
        assert_eq!(list.inner_html(), "<li>a</li><li>b</li>");
        assert!(!frag.is_alive(), "emptied fragment is released");
    }

    #[test]
    fn test_replace_children_releases_old_subtree() {
        let (doc, outer, button) = tree();
        let fresh = doc.create_text_node("fresh");

        outer.replace_children(&fresh).unwrap();
        assert_eq!(outer.inner_html(), "fresh");
        assert!(!button.is_alive());
        assert!(matches!(button.append_child(&fresh), Err(RenderError::DetachedNode)));
    }

    #[test]
    fn test_events_bubble_until_stopped() {
        let (doc, outer, button) = tree();
        let log = Rc::new(RefCell::new(Vec::new()));

        for (node, name, stop) in [(&button, "button", false), (&outer, "outer", true)] {
            let log = log.clone();
            node.add_event_listener(
                "click",
                EventHandler::new(move |event| {
                    log.borrow_mut().push(name);
                    if stop {
                        event.stop_propagation();
                    }
                    Ok(())
                }),
            );
        }
        let body_log = log.clone();
        doc.body().add_event_listener(
            "click",
            EventHandler::new(move |_| {
                body_log.borrow_mut().push("body");
                Ok(())
            }),
        );

        button.click().unwrap();
        assert_eq!(*log.borrow(), vec!["button", "outer"]);
    }

    #[test]
    fn test_void_and_boolean_attributes_serialize() {
        let doc = Document::new();
        let input = doc.create_element("input");
        input.set_attribute("disabled", "");
        input.set_style_property("font-size", "12px");
        doc.body().append_child(&input).unwrap();
        assert_eq!(doc.body().inner_html(), "<input disabled style=\"font-size:12px\">");
    }

    #[test]
    fn test_append_into_own_subtree_rejected() {
        let (doc, outer, button) = tree();
        let before = doc.body().inner_html();

        assert!(matches!(button.append_child(&outer), Err(RenderError::HierarchyRequest(_))));
        assert!(matches!(outer.append_child(&outer), Err(RenderError::HierarchyRequest(_))));
        assert!(matches!(button.append_child(&doc.body()), Err(RenderError::HierarchyRequest(_))));
        assert!(matches!(button.replace_children(&outer), Err(RenderError::HierarchyRequest(_))));
        assert_eq!(doc.body().inner_html(), before, "tree untouched");
        assert_eq!(outer.text_content(), "Go <now>");
    }

    #[test]
    fn test_replace_children_with_existing_child_keeps_it() {
        let (doc, outer, button) = tree();
        let extra = doc.create_element("span");
        outer.append_child(&extra).unwrap();

        outer.replace_children(&button).unwrap();
        assert!(button.is_alive());
        assert!(!extra.is_alive());
        assert_eq!(outer.inner_html(), "<button data-role=\"go\">Go &lt;now&gt;</button>");
    }

    #[test]
    fn test_remove_releases_subtree() {
        let (doc, outer, button) = tree();
        let before = doc.node_count();

        button.remove().unwrap();
        assert_eq!(doc.node_count(), before - 2, "button and its text");
        assert_eq!(outer.inner_html(), "");
        assert!(matches!(button.remove(), Err(RenderError::DetachedNode)));
        assert!(matches!(doc.body().remove(), Err(RenderError::HierarchyRequest(_))));

        let detached = doc.create_element("p");
        detached.append_child(&doc.create_text_node("loose")).unwrap();
        detached.remove().unwrap();
        assert_eq!(doc.node_count(), before - 2);
    }
}
