//! Environment-agnostic markup model.
//!
//! Widgets describe their output as a [`VNode`] tree. The same tree is
//! serialised to an HTML string for server rendering ([`html::render`]),
//! mounted into a [`Document`] mirror for live views, and diffed into
//! [`PatchOp`]s that a device applies to its real DOM. Event handlers are
//! never inlined as code: an element carries `(event, handler key)` bindings
//! and the host resolves keys against the widget's handler table.

mod diff;
mod document;
mod html;

pub use diff::diff;
pub use document::{Document, PatchOp, Scope};
pub use html::{escape_text, render};

#[derive(Debug, Clone, PartialEq)]
pub enum VNode {
    Element(Element),
    Text(String),
    /// Markup produced by this crate itself (inline SVG). Never built from
    /// user input.
    Raw(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub tag: String,
    pub attrs: Vec<(String, String)>,
    pub events: Vec<EventBinding>,
    pub children: Vec<VNode>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventBinding {
    pub event: String,
    pub handler: String,
}

pub fn el(tag: &str) -> Element {
    Element {
        tag: tag.to_string(),
        attrs: Vec::new(),
        events: Vec::new(),
        children: Vec::new(),
    }
}

pub fn text(value: impl Into<String>) -> VNode {
    VNode::Text(value.into())
}

/// Icon placeholder picked up by the client-side icon pass.
pub fn icon(name: &str) -> VNode {
    el("i").attr("data-lucide", name).class("dw-icon").into()
}

impl Element {
    pub fn id(self, id: impl Into<String>) -> Self {
        self.attr("id", id)
    }

    pub fn class(self, class: impl Into<String>) -> Self {
        let class = class.into();
        if class.is_empty() {
            return self;
        }
        let merged = match self.get_attr("class") {
            Some(existing) => format!("{existing} {class}"),
            None => class,
        };
        self.attr("class", merged)
    }

    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attr(name.into(), value.into());
        self
    }

    pub fn set_attr(&mut self, name: String, value: String) {
        match self.attrs.iter_mut().find(|(existing, _)| *existing == name) {
            Some(slot) => slot.1 = value,
            None => self.attrs.push((name, value)),
        }
    }

    pub fn style(self, style: impl Into<String>) -> Self {
        self.attr("style", style)
    }

    pub fn on(mut self, event: &str, handler: impl Into<String>) -> Self {
        self.events.push(EventBinding {
            event: event.to_string(),
            handler: handler.into(),
        });
        self
    }

    pub fn child(mut self, child: impl Into<VNode>) -> Self {
        self.children.push(child.into());
        self
    }

    pub fn children(mut self, children: impl IntoIterator<Item = VNode>) -> Self {
        self.children.extend(children);
        self
    }

    pub fn text(self, value: impl Into<String>) -> Self {
        self.child(VNode::Text(value.into()))
    }

    pub fn get_attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn element_id(&self) -> Option<&str> {
        self.get_attr("id")
    }
}

impl From<Element> for VNode {
    fn from(element: Element) -> Self {
        VNode::Element(element)
    }
}

impl VNode {
    pub fn as_element(&self) -> Option<&Element> {
        match self {
            VNode::Element(element) => Some(element),
            _ => None,
        }
    }

    /// Finds the element carrying `id` in this subtree.
    pub fn find(&self, id: &str) -> Option<&Element> {
        let VNode::Element(element) = self else {
            return None;
        };
        if element.element_id() == Some(id) {
            return Some(element);
        }
        element.children.iter().find_map(|child| child.find(id))
    }

    pub fn find_mut(&mut self, id: &str) -> Option<&mut Element> {
        let VNode::Element(element) = self else {
            return None;
        };
        if element.element_id() == Some(id) {
            return Some(element);
        }
        element.children.iter_mut().find_map(|child| child.find_mut(id))
    }

    /// Concatenated text content, like `Node.textContent`.
    pub fn text_content(&self) -> String {
        match self {
            VNode::Text(value) => value.clone(),
            VNode::Raw(_) => String::new(),
            VNode::Element(element) => element.children.iter().map(VNode::text_content).collect(),
        }
    }

    /// Every handler key bound anywhere in the subtree.
    pub fn handler_keys(&self) -> Vec<&str> {
        let mut out = Vec::new();
        collect_handler_keys(self, &mut out);
        out
    }
}

fn collect_handler_keys<'a>(node: &'a VNode, out: &mut Vec<&'a str>) {
    if let VNode::Element(element) = node {
        out.extend(element.events.iter().map(|binding| binding.handler.as_str()));
        for child in &element.children {
            collect_handler_keys(child, out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn class_merges_and_attr_overwrites() {
        let node = el("div").class("a").class("b").attr("title", "x").attr("title", "y");
        assert_eq!(node.get_attr("class"), Some("a b"));
        assert_eq!(node.get_attr("title"), Some("y"));
        assert_eq!(node.attrs.len(), 2);
    }

    #[test]
    fn find_locates_nested_ids() {
        let tree: VNode = el("div")
            .id("root")
            .child(el("span").id("inner").text("hello"))
            .into();
        assert_eq!(tree.find("inner").map(|e| e.tag.as_str()), Some("span"));
        assert!(tree.find("missing").is_none());
        assert_eq!(tree.text_content(), "hello");
    }

    #[test]
    fn handler_keys_collects_all_bindings() {
        let tree: VNode = el("div")
            .on("click", "open")
            .child(el("button").on("click", "increment:water"))
            .into();
        assert_eq!(tree.handler_keys(), vec!["open", "increment:water"]);
    }
}
