//! DOM backend - builds fresh nodes in a [`Document`].

use crate::dom::{Document, NodeId, NodeRef};
use crate::engine::{Backend, Runtime, RuntimeOptions};
use crate::error::Result;
use crate::types::{css_property_name, format_number, PropValue, Props};
use crate::vnode::Child;

use super::html::{attribute_name, is_reserved_prop};

/// Backend producing detached DOM nodes. Lists become fragments.
///
/// The backend remembers every node it creates, so a build that fails
/// halfway can hand them back with [`DomBackend::discard`].
#[derive(Debug, Clone)]
pub struct DomBackend {
    document: Document,
    created: Vec<NodeId>,
}

impl DomBackend {
    pub fn new(document: &Document) -> Self {
        Self {
            document: document.clone(),
            created: Vec::new(),
        }
    }

    fn track(&mut self, node: NodeRef) -> NodeRef {
        self.created.push(node.id());
        node
    }

    /// Release every node this backend created that is still alive.
    ///
    /// Only call this when the output was never attached to a live tree.
    pub fn discard(&mut self) {
        for id in self.created.drain(..) {
            if let Some(node) = self.document.node(id) {
                // Only fails for the body, which a backend never creates
                let _ = node.remove();
            }
        }
    }
}

impl Backend for DomBackend {
    type Output = NodeRef;

    fn empty(&mut self) -> Result<NodeRef> {
        let node = self.document.create_text_node("");
        Ok(self.track(node))
    }

    fn text(&mut self, text: &str) -> Result<NodeRef> {
        let node = self.document.create_text_node(text);
        Ok(self.track(node))
    }

    fn list(&mut self, items: Vec<NodeRef>) -> Result<NodeRef> {
        let fragment = self.document.create_fragment();
        let fragment = self.track(fragment);
        for item in &items {
            fragment.append_child(item)?;
        }
        Ok(fragment)
    }

    fn element(&mut self, tag: &str, props: &Props, children: Vec<NodeRef>) -> Result<NodeRef> {
        let element = self.document.create_element(tag);
        let element = self.track(element);
        for (name, value) in props.iter() {
            set_dom_prop(&element, name, value);
        }
        for child in &children {
            element.append_child(child)?;
        }
        Ok(element)
    }
}

/// Apply one prop to an element: `on*` handlers become listeners, `style`
/// is applied per property, `true` is an empty attribute.
pub fn set_dom_prop(element: &NodeRef, name: &str, value: &PropValue) {
    if is_reserved_prop(name) {
        return;
    }

    if let (Some(event), PropValue::Handler(handler)) = (name.strip_prefix("on"), value) {
        element.add_event_listener(&event.to_lowercase(), handler.clone());
        return;
    }

    match value {
        PropValue::Null | PropValue::Bool(false) | PropValue::Handler(_) => {}
        PropValue::Bool(true) => element.set_attribute(attribute_name(name), ""),
        PropValue::Style(style) if name == "style" => {
            for (property, value) in style.iter() {
                element.set_style_property(&css_property_name(property), value);
            }
        }
        PropValue::Style(style) => element.set_attribute(attribute_name(name), &super::html::style_string(style)),
        PropValue::Text(text) => element.set_attribute(attribute_name(name), text),
        PropValue::Number(number) => element.set_attribute(attribute_name(name), &format_number(*number)),
        PropValue::Children(_) | PropValue::Data(_) => {}
    }
}

/// Render `node` into a detached DOM subtree with a disposable static
/// runtime.
///
/// On failure the partial subtree is released. A result that is never
/// attached should be given back with [`NodeRef::remove`].
pub fn render_to_dom(document: &Document, node: &Child) -> Result<NodeRef> {
    let mut backend = DomBackend::new(document);
    Runtime::new_static(RuntimeOptions::default())
        .render(&mut backend, node)
        .inspect_err(|_| backend.discard())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RenderError;
    use crate::types::{EventHandler, Style};
    use crate::vnode::{component, h};

    #[test]
    fn test_element_props_applied() {
        let doc = Document::new();
        let tree = h("input")
            .class_name("field")
            .prop("disabled", true)
            .prop("hidden", false)
            .prop("maxLength", 8)
            .style(Style::new().with("fontSize", "12px"))
            .prop("onInput", EventHandler::new(|_| Ok(())))
            .child("never rendered")
            .build();

        let node = render_to_dom(&doc, &tree.into()).unwrap();
        assert_eq!(node.attribute("class").as_deref(), Some("field"));
        assert_eq!(node.attribute("disabled").as_deref(), Some(""));
        assert_eq!(node.attribute("hidden"), None);
        assert_eq!(node.attribute("maxLength").as_deref(), Some("8"));
        assert_eq!(node.style_property("font-size").as_deref(), Some("12px"));
        assert_eq!(node.listener_count("input"), 1);
        assert!(node.children().is_empty(), "void tags get no children");
    }

    #[test]
    fn test_lists_become_fragments() {
        let doc = Document::new();
        let tree: Child = vec![h("b").child("1"), h("i").child("2")].into();

        let fragment = render_to_dom(&doc, &tree).unwrap();
        assert!(fragment.tag_name().is_none());
        doc.body().append_child(&fragment).unwrap();
        assert_eq!(doc.body().inner_html(), "<b>1</b><i>2</i>");
    }

    #[test]
    fn test_removed_results_free_their_nodes() {
        let doc = Document::new();
        let tree: Child = h("ul").children((0..5).map(|i| h("li").child(i))).build().into();

        for _ in 0..20 {
            render_to_dom(&doc, &tree).unwrap().remove().unwrap();
        }
        assert_eq!(doc.node_count(), 1, "only the body is left");
    }

    #[test]
    fn test_failed_render_releases_partial_tree() {
        let doc = Document::new();
        let tree: Child = h("section")
            .child(h("p").child("built first"))
            .child(component(|_| Err(RenderError::component("late failure"))))
            .build()
            .into();

        for _ in 0..10 {
            assert!(matches!(render_to_dom(&doc, &tree), Err(RenderError::Component(_))));
        }
        assert_eq!(doc.node_count(), 1);
    }
}
