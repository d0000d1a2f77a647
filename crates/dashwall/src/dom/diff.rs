use super::{html, Element, PatchOp, VNode};

/// Computes the operations turning the mounted `old` tree into `new`.
///
/// Operations are addressed by element id. Attribute and single-text changes
/// on elements that carry an id are patched in place; any other change
/// replaces the nearest ancestor with an id (ultimately `root_id`).
pub fn diff(old: &VNode, new: &VNode, root_id: &str) -> Vec<PatchOp> {
    let mut ops = Vec::new();
    if diff_node(old, new, &mut ops) {
        ops
    } else {
        vec![PatchOp::Replace {
            id: root_id.to_string(),
            html: html::render(new),
        }]
    }
}

/// Returns `false` when the change cannot be expressed below the caller's
/// anchor.
fn diff_node(old: &VNode, new: &VNode, out: &mut Vec<PatchOp>) -> bool {
    match (old, new) {
        (VNode::Text(a), VNode::Text(b)) => a == b,
        (VNode::Raw(a), VNode::Raw(b)) => a == b,
        (VNode::Element(a), VNode::Element(b)) => diff_element(a, b, out),
        _ => false,
    }
}

fn diff_element(old: &Element, new: &Element, out: &mut Vec<PatchOp>) -> bool {
    if old.tag != new.tag || old.element_id() != new.element_id() {
        return false;
    }
    let Some(id) = new.element_id() else {
        if old.attrs != new.attrs || old.events != new.events {
            return false;
        }
        return diff_children(old, new, None, out);
    };

    let mut local = Vec::new();
    let patched = old.events == new.events && {
        diff_attrs(old, new, id, &mut local);
        diff_children(old, new, Some(id), &mut local)
    };
    if patched {
        out.extend(local);
    } else {
        out.push(PatchOp::Replace {
            id: id.to_string(),
            html: html::render(&VNode::Element(new.clone())),
        });
    }
    true
}

fn diff_children(old: &Element, new: &Element, id: Option<&str>, out: &mut Vec<PatchOp>) -> bool {
    if let ([VNode::Text(a)], [VNode::Text(b)]) = (old.children.as_slice(), new.children.as_slice()) {
        if a == b {
            return true;
        }
        let Some(id) = id else {
            return false;
        };
        out.push(PatchOp::SetText {
            id: id.to_string(),
            text: b.clone(),
        });
        return true;
    }
    if old.children.len() != new.children.len() {
        return false;
    }
    old.children
        .iter()
        .zip(new.children.iter())
        .all(|(a, b)| diff_node(a, b, out))
}

fn diff_attrs(old: &Element, new: &Element, id: &str, out: &mut Vec<PatchOp>) {
    for (name, value) in &new.attrs {
        if old.get_attr(name) != Some(value.as_str()) {
            out.push(PatchOp::SetAttr {
                id: id.to_string(),
                name: name.clone(),
                value: value.clone(),
            });
        }
    }
    for (name, _) in &old.attrs {
        if new.get_attr(name).is_none() {
            out.push(PatchOp::RemoveAttr {
                id: id.to_string(),
                name: name.clone(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::el;
    use pretty_assertions::assert_eq;

    fn habit_row(value: &str, width: &str) -> VNode {
        el("div")
            .id("widget-w1")
            .child(
                el("div")
                    .class("row")
                    .child(el("span").id("habit-value-water-w1").text(value))
                    .child(el("div").id("habit-bar-water-w1").style(width)),
            )
            .into()
    }

    #[test]
    fn identical_trees_produce_no_ops() {
        assert!(diff(&habit_row("2", "width: 25%"), &habit_row("2", "width: 25%"), "widget-w1").is_empty());
    }

    #[test]
    fn text_and_attribute_changes_patch_in_place() {
        let ops = diff(
            &habit_row("2", "width: 25%"),
            &habit_row("3", "width: 37.5%"),
            "widget-w1",
        );
        assert_eq!(
            ops,
            vec![
                PatchOp::SetText {
                    id: "habit-value-water-w1".to_string(),
                    text: "3".to_string()
                },
                PatchOp::SetAttr {
                    id: "habit-bar-water-w1".to_string(),
                    name: "style".to_string(),
                    value: "width: 37.5%".to_string()
                },
            ]
        );
    }

    #[test]
    fn structural_change_replaces_nearest_identified_ancestor() {
        let old: VNode = el("div")
            .id("widget-w1")
            .child(el("ul").id("history-w1").child(el("li").text("10:00")))
            .into();
        let new: VNode = el("div")
            .id("widget-w1")
            .child(
                el("ul")
                    .id("history-w1")
                    .child(el("li").text("10:00"))
                    .child(el("li").text("10:05")),
            )
            .into();
        let ops = diff(&old, &new, "widget-w1");
        assert_eq!(ops.len(), 1);
        assert!(matches!(&ops[0], PatchOp::Replace { id, html } if id == "history-w1" && html.contains("10:05")));
    }

    #[test]
    fn changed_root_tag_replaces_root() {
        let old: VNode = el("div").id("widget-w1").into();
        let new: VNode = el("section").id("widget-w1").into();
        let ops = diff(&old, &new, "widget-w1");
        assert!(matches!(&ops[..], [PatchOp::Replace { id, .. }] if id == "widget-w1"));
    }

    #[test]
    fn unidentified_text_change_bubbles_to_anchor() {
        let old: VNode = el("div").id("a").child(el("p").text("x")).into();
        let new: VNode = el("div").id("a").child(el("p").text("y")).into();
        let ops = diff(&old, &new, "a");
        assert!(matches!(&ops[..], [PatchOp::Replace { id, html }] if id == "a" && html == "<div id=\"a\"><p>y</p></div>"));
    }
}
