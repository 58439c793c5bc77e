//! HTML text helpers shared by the string backend and the DOM serializer.

use crate::types::{css_property_name, PropValue, Props, Style};

/// Elements that never have children or a closing tag.
pub const VOID_TAGS: [&str; 14] = [
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source", "track", "wbr",
];

pub fn is_void_tag(tag: &str) -> bool {
    VOID_TAGS.contains(&tag)
}

/// Entity-escape `& < > " '`.
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

/// `backgroundColor: red, fontSize: 12px` -> `background-color:red;font-size:12px`
pub fn style_string(style: &Style) -> String {
    style
        .iter()
        .map(|(property, value)| format!("{}:{}", css_property_name(property), value))
        .collect::<Vec<_>>()
        .join(";")
}

/// Attribute name for a prop (`className` -> `class`).
pub fn attribute_name(prop: &str) -> &str {
    if prop == "className" { "class" } else { prop }
}

/// Props that are never attributes.
pub(crate) fn is_reserved_prop(name: &str) -> bool {
    matches!(name, "children" | "key" | "ref")
}

/// Serialize props as ` a="1" b` (leading space, empty when nothing renders).
pub fn render_attributes(props: &Props) -> String {
    let mut out = String::new();

    for (name, value) in props.iter() {
        if is_reserved_prop(name) || name.starts_with("on") {
            continue;
        }

        let text = match value {
            PropValue::Null
            | PropValue::Bool(false)
            | PropValue::Handler(_)
            | PropValue::Children(_)
            | PropValue::Data(_) => continue,
            PropValue::Bool(true) => {
                out.push(' ');
                out.push_str(attribute_name(name));
                continue;
            }
            PropValue::Style(style) => style_string(style),
            other => match other.as_str() {
                Some(text) => text.to_string(),
                None => other.as_f64().map(crate::types::format_number).unwrap_or_default(),
            },
        };

        out.push(' ');
        out.push_str(attribute_name(name));
        out.push_str("=\"");
        out.push_str(&escape_html(&text));
        out.push('"');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::EventHandler;
    use proptest::prelude::*;
    use test_case::test_case;

    #[test_case("plain", "plain" ; "untouched")]
    #[test_case("<unsafe>", "&lt;unsafe&gt;" ; "angle brackets")]
    #[test_case("a & b", "a &amp; b" ; "ampersand")]
    #[test_case("\"q\" 'q'", "&quot;q&quot; &#39;q&#39;" ; "quotes")]
    fn test_escape_html(input: &str, expected: &str) {
        assert_eq!(escape_html(input), expected);
    }

    #[test]
    fn test_render_attributes_rules() {
        let props = Props::new()
            .with("className", "box")
            .with("style", Style::new().with("backgroundColor", "red").with("marginTop", "4px"))
            .with("hidden", true)
            .with("draggable", false)
            .with("title", PropValue::Null)
            .with("tabIndex", 2)
            .with("onClick", EventHandler::new(|_| Ok(())))
            .with("onlabel", "skipped")
            .with("key", "k")
            .with("data-note", "a\"b");

        assert_eq!(
            render_attributes(&props),
            " class=\"box\" style=\"background-color:red;margin-top:4px\" hidden tabIndex=\"2\" data-note=\"a&quot;b\""
        );
    }

    #[test]
    fn test_void_tags() {
        assert!(is_void_tag("br"));
        assert!(is_void_tag("input"));
        assert!(!is_void_tag("div"));
    }

    proptest! {
        #[test]
        fn test_escaped_text_has_no_raw_markup(input in ".*") {
            let escaped = escape_html(&input);
            prop_assert!(!escaped.contains('<'));
            prop_assert!(!escaped.contains('>'));
            prop_assert!(!escaped.contains('"'));
            prop_assert!(!escaped.contains('\''));
        }
    }
}
