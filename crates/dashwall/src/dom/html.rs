use super::{Element, VNode};

/// Serialises a tree to an HTML fragment. Event bindings become
/// `data-dw-on-{event}="{handler}"` attributes.
pub fn render(node: &VNode) -> String {
    let mut out = String::new();
    render_into(node, &mut out);
    out
}

fn render_into(node: &VNode, out: &mut String) {
    match node {
        VNode::Text(value) => out.push_str(&escape_text(value)),
        VNode::Raw(markup) => out.push_str(markup),
        VNode::Element(element) => render_element(element, out),
    }
}

fn render_element(element: &Element, out: &mut String) {
    let tag = sanitize_tag(&element.tag);
    out.push('<');
    out.push_str(&tag);
    for (name, value) in &element.attrs {
        if !is_safe_attr_name(name) || is_inline_handler(name) {
            continue;
        }
        out.push_str(&format!(" {name}=\"{}\"", escape_text(value)));
    }
    for binding in &element.events {
        if !is_safe_attr_name(&binding.event) {
            continue;
        }
        out.push_str(&format!(
            " data-dw-on-{}=\"{}\"",
            binding.event,
            escape_text(&binding.handler)
        ));
    }
    out.push('>');
    if is_void(&tag) {
        return;
    }
    for child in &element.children {
        render_into(child, out);
    }
    out.push_str(&format!("</{tag}>"));
}

fn sanitize_tag(tag: &str) -> String {
    if !tag.is_empty()
        && tag
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | ':'))
    {
        return tag.to_string();
    }
    "div".to_string()
}

fn is_safe_attr_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | ':'))
}

fn is_inline_handler(name: &str) -> bool {
    name.len() > 2 && name[..2].eq_ignore_ascii_case("on")
}

fn is_void(tag: &str) -> bool {
    matches!(
        tag,
        "area" | "br" | "col" | "embed" | "hr" | "img" | "input" | "link" | "meta" | "source" | "wbr"
    )
}

pub fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
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
