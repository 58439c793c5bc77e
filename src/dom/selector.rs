//! Minimal selector matching: `tag`, `#id`, `.class`, `[attr]`,
//! `[attr="value"]` and compounds of those (`div#main`, `button.primary`,
//! `div[data-x="1"]`).

use super::document::{NodeData, NodeType};

#[derive(Debug, Default, PartialEq)]
pub(crate) struct Selector {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
    attributes: Vec<(String, Option<String>)>,
}

impl Selector {
    /// `None` for selectors outside the supported subset.
    pub fn parse(input: &str) -> Option<Self> {
        let input = input.trim();
        if input.is_empty() {
            return None;
        }

        let mut selector = Selector::default();
        let mut rest = input;

        let tag_end = rest.find(['#', '.', '[']).unwrap_or(rest.len());
        if tag_end > 0 {
            if !rest[..tag_end].chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
                return None;
            }
            selector.tag = Some(rest[..tag_end].to_ascii_lowercase());
        }
        rest = &rest[tag_end..];

        while !rest.is_empty() {
            if let Some(after) = rest.strip_prefix('#') {
                let end = after.find(['.', '[']).unwrap_or(after.len());
                if end == 0 {
                    return None;
                }
                selector.id = Some(after[..end].to_string());
                rest = &after[end..];
            } else if let Some(after) = rest.strip_prefix('.') {
                let end = after.find(['#', '.', '[']).unwrap_or(after.len());
                if end == 0 {
                    return None;
                }
                selector.classes.push(after[..end].to_string());
                rest = &after[end..];
            } else if let Some(after) = rest.strip_prefix('[') {
                let end = after.find(']')?;
                selector.attributes.push(parse_attribute(&after[..end])?);
                rest = &after[end + 1..];
            } else {
                return None;
            }
        }

        Some(selector)
    }

    pub fn matches(&self, node: &NodeData) -> bool {
        let NodeType::Element(tag) = &node.node_type else {
            return false;
        };

        if self.tag.as_deref().is_some_and(|wanted| wanted != &**tag) {
            return false;
        }
        if let Some(id) = &self.id
            && node.attributes.get("id") != Some(id)
        {
            return false;
        }

        if !self.classes.is_empty() {
            let classes = node.attributes.get("class").map(String::as_str).unwrap_or("");
            if !self.classes.iter().all(|wanted| classes.split_whitespace().any(|c| c == wanted)) {
                return false;
            }
        }

        self.attributes.iter().all(|(name, value)| match (node.attributes.get(name), value) {
            (None, _) => false,
            (Some(_), None) => true,
            (Some(actual), Some(wanted)) => actual == wanted,
        })
    }
}

fn parse_attribute(body: &str) -> Option<(String, Option<String>)> {
    match body.split_once('=') {
        None => {
            let name = body.trim();
            (!name.is_empty()).then(|| (name.to_string(), None))
        }
        Some((name, value)) => {
            let name = name.trim();
            if name.is_empty() {
                return None;
            }
            let value = value.trim();
            let unquoted = value
                .strip_prefix('"')
                .and_then(|v| v.strip_suffix('"'))
                .or_else(|| value.strip_prefix('\'').and_then(|v| v.strip_suffix('\'')))
                .unwrap_or(value);
            Some((name.to_string(), Some(unquoted.to_string())))
        }
    }
}
