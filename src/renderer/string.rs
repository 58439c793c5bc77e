//! String backend - one-shot HTML rendering.

use crate::engine::{Backend, Runtime, RuntimeOptions};
use crate::error::Result;
use crate::types::Props;
use crate::vnode::Child;

use super::html::{escape_html, is_void_tag, render_attributes};

/// Backend producing HTML text.
#[derive(Debug, Default, Clone, Copy)]
pub struct StringBackend;

impl Backend for StringBackend {
    type Output = String;

    fn empty(&mut self) -> Result<String> {
        Ok(String::new())
    }

    fn text(&mut self, text: &str) -> Result<String> {
        Ok(escape_html(text))
    }

    fn list(&mut self, items: Vec<String>) -> Result<String> {
        Ok(items.concat())
    }

    fn element(&mut self, tag: &str, props: &Props, children: Vec<String>) -> Result<String> {
        let attributes = render_attributes(props);
        if is_void_tag(tag) {
            return Ok(format!("<{tag}{attributes}>"));
        }
        Ok(format!("<{tag}{attributes}>{}</{tag}>", children.concat()))
    }
}

/// Render `node` to HTML with a disposable static runtime. Hooks work,
/// effects never run and setters do nothing.
pub fn render_to_string(node: &Child) -> Result<String> {
    render_to_string_with(node, RuntimeOptions::default())
}

pub fn render_to_string_with(node: &Child, options: RuntimeOptions) -> Result<String> {
    Runtime::new_static(options).render(&mut StringBackend, node)
}
