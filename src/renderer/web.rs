//! Browser backend - builds `web_sys` nodes in a real page.
//!
//! Only compiled with the `web` feature. Props follow the same rules as the
//! in-memory [`DomBackend`](super::DomBackend); event handlers are not bound
//! by the backend itself but collected as [`Listener`]s, so the caller
//! decides how they reach the page (direct listeners for one-shot renders,
//! root delegation for mounted roots).

use wasm_bindgen::closure::Closure;
use wasm_bindgen::JsCast;
use web_sys::{Document, Element, HtmlElement, Node};

use tracing::warn;

use crate::dom::Event;
use crate::engine::{Backend, Runtime, RuntimeOptions};
use crate::error::Result;
use crate::types::{css_property_name, format_number, EventHandler, PropValue, Props};
use crate::vnode::Child;

use super::html::{attribute_name, is_reserved_prop, style_string};

/// Handler for one event type on one element.
#[derive(Debug, Clone)]
pub struct Listener {
    pub element: Element,
    /// Lowercase event type (`"click"`, `"input"`).
    pub event_type: String,
    pub handler: EventHandler,
}

/// Backend producing detached browser nodes. Lists become document
/// fragments.
#[derive(Debug)]
pub struct WebBackend {
    document: Document,
    listeners: Vec<Listener>,
}

impl WebBackend {
    pub fn new(document: &Document) -> Self {
        Self {
            document: document.clone(),
            listeners: Vec::new(),
        }
    }

    /// Handlers found while building, in document order of their elements.
    pub fn into_listeners(self) -> Vec<Listener> {
        self.listeners
    }

    fn set_prop(&mut self, element: &Element, name: &str, value: &PropValue) -> Result<()> {
        if is_reserved_prop(name) {
            return Ok(());
        }

        if let (Some(event), PropValue::Handler(handler)) = (name.strip_prefix("on"), value) {
            self.listeners.push(Listener {
                element: element.clone(),
                event_type: event.to_lowercase(),
                handler: handler.clone(),
            });
            return Ok(());
        }

        match value {
            PropValue::Null | PropValue::Bool(false) | PropValue::Handler(_) => {}
            PropValue::Bool(true) => element.set_attribute(attribute_name(name), "")?,
            PropValue::Style(style) if name == "style" => match element.dyn_ref::<HtmlElement>() {
                Some(html) => {
                    let declaration = html.style();
                    for (property, value) in style.iter() {
                        declaration.set_property(&css_property_name(property), value)?;
                    }
                }
                // SVG and other non-HTML elements
                None => element.set_attribute("style", &style_string(style))?,
            },
            PropValue::Style(style) => element.set_attribute(attribute_name(name), &style_string(style))?,
            PropValue::Text(text) => element.set_attribute(attribute_name(name), text)?,
            PropValue::Number(number) => element.set_attribute(attribute_name(name), &format_number(*number))?,
            PropValue::Children(_) | PropValue::Data(_) => {}
        }
        Ok(())
    }
}

impl Backend for WebBackend {
    type Output = Node;

    fn empty(&mut self) -> Result<Node> {
        Ok(self.document.create_text_node("").into())
    }

    fn text(&mut self, text: &str) -> Result<Node> {
        Ok(self.document.create_text_node(text).into())
    }

    fn list(&mut self, items: Vec<Node>) -> Result<Node> {
        let fragment = self.document.create_document_fragment();
        for item in &items {
            fragment.append_child(item)?;
        }
        Ok(fragment.into())
    }

    fn element(&mut self, tag: &str, props: &Props, children: Vec<Node>) -> Result<Node> {
        let element = self.document.create_element(tag)?;
        for (name, value) in props.iter() {
            self.set_prop(&element, name, value)?;
        }
        for child in &children {
            element.append_child(child)?;
        }
        Ok(element.into())
    }
}

type NativeListener = Closure<dyn FnMut(web_sys::Event)>;

/// Output of [`render_to_web`]: the detached node plus the listener
/// closures bound to its elements.
///
/// Handlers stop working once this value is dropped, so keep it alive for
/// as long as the nodes are on the page.
#[derive(Debug)]
pub struct WebRender {
    node: Node,
    closures: Vec<NativeListener>,
}

impl WebRender {
    pub fn node(&self) -> &Node {
        &self.node
    }

    /// Number of bound event listeners.
    pub fn listener_count(&self) -> usize {
        self.closures.len()
    }
}

/// Render `node` into a detached browser subtree with a disposable static
/// runtime. Each handler is bound directly on its element.
pub fn render_to_web(document: &Document, node: &Child) -> Result<WebRender> {
    let mut backend = WebBackend::new(document);
    let rendered = Runtime::new_static(RuntimeOptions::default()).render(&mut backend, node)?;

    let mut closures = Vec::new();
    for listener in backend.into_listeners() {
        let handler = listener.handler;
        let closure = NativeListener::new(move |native: web_sys::Event| {
            if let Err(error) = handler.call(&Event::from_native(native)) {
                warn!(%error, "event handler failed");
            }
        });
        listener
            .element
            .add_event_listener_with_callback(&listener.event_type, closure.as_ref().unchecked_ref())?;
        closures.push(closure);
    }

    Ok(WebRender {
        node: rendered,
        closures,
    })
}

#[cfg(all(test, target_arch = "wasm32"))]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    use wasm_bindgen_test::*;

    use crate::types::Style;
    use crate::vnode::h;

    wasm_bindgen_test_configure!(run_in_browser);

    fn document() -> Document {
        web_sys::window().unwrap().document().unwrap()
    }

    #[wasm_bindgen_test]
    fn test_props_and_children() {
        let doc = document();
        let tree: Child = h("section")
            .class_name("box")
            .prop("hidden", false)
            .prop("tabIndex", 2)
            .style(Style::new().with("backgroundColor", "red"))
            .child(h("b").child("bold"))
            .child(vec!["a", "b"])
            .into();

        let rendered = render_to_web(&doc, &tree).unwrap();
        let element = rendered.node().dyn_ref::<HtmlElement>().unwrap();
        assert_eq!(element.get_attribute("class").as_deref(), Some("box"));
        assert_eq!(element.get_attribute("hidden"), None);
        assert_eq!(element.get_attribute("tabindex").as_deref(), Some("2"));
        assert_eq!(element.style().get_property_value("background-color").unwrap(), "red");
        assert_eq!(element.inner_html(), "<b>bold</b>ab");
    }

    #[wasm_bindgen_test]
    fn test_handlers_bound_while_render_lives() {
        let doc = document();
        let clicks = Rc::new(Cell::new(0));
        let seen = clicks.clone();
        let tree: Child = h("button")
            .on("click", move |_| {
                seen.set(seen.get() + 1);
                Ok(())
            })
            .into();

        let rendered = render_to_web(&doc, &tree).unwrap();
        assert_eq!(rendered.listener_count(), 1);
        rendered.node().dyn_ref::<HtmlElement>().unwrap().click();
        rendered.node().dyn_ref::<HtmlElement>().unwrap().click();
        assert_eq!(clicks.get(), 2);
    }
}
