use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;

use super::{diff, html, Element, VNode};

/// A mutation the device applies to its real DOM, addressed by element id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum PatchOp {
    Replace { id: String, html: String },
    SetText { id: String, text: String },
    SetAttr { id: String, name: String, value: String },
    RemoveAttr { id: String, name: String },
    RefreshIcons,
}

/// Server-side mirror of the fragments mounted on a device.
///
/// Every write is addressed by element id and reports whether the target
/// still exists, which is how late timer ticks and slow fetches detect that
/// their widget has been torn down.
#[derive(Debug, Default)]
pub struct Document {
    roots: Vec<(String, VNode)>,
    pending: Vec<PatchOp>,
    writes: u64,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mounts `view` under `root_id`. Re-mounting an existing root ships
    /// the new markup to the device; a first mount assumes the markup was
    /// delivered with the page.
    pub fn mount(&mut self, root_id: &str, view: VNode) {
        match self.roots.iter_mut().find(|(id, _)| id == root_id) {
            Some(slot) => {
                self.pending.push(PatchOp::Replace {
                    id: root_id.to_string(),
                    html: html::render(&view),
                });
                self.writes += 1;
                slot.1 = view;
            }
            None => self.roots.push((root_id.to_string(), view)),
        }
    }

    pub fn unmount(&mut self, root_id: &str) -> bool {
        let before = self.roots.len();
        self.roots.retain(|(id, _)| id != root_id);
        before != self.roots.len()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.find(id).is_some()
    }

    pub fn find(&self, id: &str) -> Option<&Element> {
        self.roots.iter().find_map(|(_, view)| view.find(id))
    }

    pub fn root(&self, root_id: &str) -> Option<&VNode> {
        self.roots
            .iter()
            .find(|(id, _)| id == root_id)
            .map(|(_, view)| view)
    }

    fn find_mut(&mut self, id: &str) -> Option<&mut Element> {
        self.roots.iter_mut().find_map(|(_, view)| view.find_mut(id))
    }

    /// Replaces the children of `id` with a single text node.
    pub fn set_text(&mut self, id: &str, value: &str) -> bool {
        let Some(element) = self.find_mut(id) else {
            return false;
        };
        if matches!(element.children.as_slice(), [VNode::Text(current)] if current == value) {
            return true;
        }
        element.children = vec![VNode::Text(value.to_string())];
        self.pending.push(PatchOp::SetText {
            id: id.to_string(),
            text: value.to_string(),
        });
        self.writes += 1;
        true
    }

    pub fn set_attr(&mut self, id: &str, name: &str, value: &str) -> bool {
        let Some(element) = self.find_mut(id) else {
            return false;
        };
        if element.get_attr(name) == Some(value) {
            return true;
        }
        element.set_attr(name.to_string(), value.to_string());
        self.pending.push(PatchOp::SetAttr {
            id: id.to_string(),
            name: name.to_string(),
            value: value.to_string(),
        });
        self.writes += 1;
        true
    }

    /// Diffs a freshly rendered view against the mounted one and queues the
    /// resulting operations. Returns `false` when the root is gone.
    pub fn patch(&mut self, root_id: &str, view: VNode) -> bool {
        let Some(slot) = self.roots.iter_mut().find(|(id, _)| id == root_id) else {
            return false;
        };
        let ops = diff(&slot.1, &view, root_id);
        slot.1 = view;
        self.writes += ops.len() as u64;
        self.pending.extend(ops);
        true
    }

    pub fn push(&mut self, op: PatchOp) {
        self.pending.push(op);
    }

    pub fn take_pending(&mut self) -> Vec<PatchOp> {
        std::mem::take(&mut self.pending)
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Number of DOM mutations applied so far.
    pub fn writes(&self) -> u64 {
        self.writes
    }
}

/// Shared handle to a [`Document`], handed to renderers and timer callbacks.
#[derive(Debug, Clone, Default)]
pub struct Scope {
    document: Arc<Mutex<Document>>,
}

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lock(&self) -> MutexGuard<'_, Document> {
        self.document.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.lock().contains(id)
    }

    pub fn set_text(&self, id: &str, value: &str) -> bool {
        self.lock().set_text(id, value)
    }

    pub fn set_attr(&self, id: &str, name: &str, value: &str) -> bool {
        self.lock().set_attr(id, name, value)
    }

    pub fn patch(&self, root_id: &str, view: VNode) -> bool {
        self.lock().patch(root_id, view)
    }

    pub fn mount(&self, root_id: &str, view: VNode) {
        self.lock().mount(root_id, view);
    }

    pub fn unmount(&self, root_id: &str) -> bool {
        self.lock().unmount(root_id)
    }

    pub fn push(&self, op: PatchOp) {
        self.lock().push(op);
    }

    pub fn take_pending(&self) -> Vec<PatchOp> {
        self.lock().take_pending()
    }

    pub fn writes(&self) -> u64 {
        self.lock().writes()
    }
}
