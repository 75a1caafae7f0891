//! Arena-backed document tree.

use std::collections::HashSet;

use crate::node::{NodeData, NodeId};
use crate::selector::{Selector, SelectorList};

struct Entry {
    data: NodeData,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

struct Slot {
    generation: u32,
    entry: Option<Entry>,
}

/// The host page's element tree.
///
/// All reads are synchronous and side-effect free. Mutation methods return
/// `false`/`None` when the target handle no longer resolves; callers of a
/// continuously-mutated tree must treat every handle as possibly stale.
pub struct DocumentTree {
    slots: Vec<Slot>,
    free: Vec<u32>,
    root: NodeId,
}

impl DocumentTree {
    /// Create a tree consisting of a single root node.
    pub fn new(root: NodeData) -> Self {
        let mut tree = Self {
            slots: Vec::new(),
            free: Vec::new(),
            root: NodeId {
                index: 0,
                generation: 0,
            },
        };
        tree.root = tree.alloc(root, None);
        tree
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    fn alloc(&mut self, data: NodeData, parent: Option<NodeId>) -> NodeId {
        let entry = Entry {
            data,
            parent,
            children: Vec::new(),
        };
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.generation += 1;
            slot.entry = Some(entry);
            NodeId {
                index,
                generation: slot.generation,
            }
        } else {
            self.slots.push(Slot {
                generation: 0,
                entry: Some(entry),
            });
            NodeId {
                index: (self.slots.len() - 1) as u32,
                generation: 0,
            }
        }
    }

    fn entry(&self, id: NodeId) -> Option<&Entry> {
        let slot = self.slots.get(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.entry.as_ref()
    }

    fn entry_mut(&mut self, id: NodeId) -> Option<&mut Entry> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.entry.as_mut()
    }

    /// Whether the handle still resolves to an attached node.
    pub fn contains(&self, id: NodeId) -> bool {
        self.entry(id).is_some()
    }

    pub fn get(&self, id: NodeId) -> Option<&NodeData> {
        self.entry(id).map(|e| &e.data)
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.entry(id).and_then(|e| e.parent)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.entry(id).map(|e| e.children.as_slice()).unwrap_or(&[])
    }

    /// Insert a child at `index` (clamped to the child count).
    ///
    /// Returns `None` when the parent handle is stale.
    pub fn insert_child(&mut self, parent: NodeId, index: usize, data: NodeData) -> Option<NodeId> {
        self.entry(parent)?;
        let id = self.alloc(data, Some(parent));
        // alloc never invalidates existing slots
        let children = &mut self.entry_mut(parent)?.children;
        let index = index.min(children.len());
        children.insert(index, id);
        Some(id)
    }

    pub fn append_child(&mut self, parent: NodeId, data: NodeData) -> Option<NodeId> {
        let index = self.children(parent).len();
        self.insert_child(parent, index, data)
    }

    /// Prepend a child (hosts load older history at the top).
    pub fn prepend_child(&mut self, parent: NodeId, data: NodeData) -> Option<NodeId> {
        self.insert_child(parent, 0, data)
    }

    /// Detach a subtree. The root node cannot be removed.
    pub fn remove(&mut self, id: NodeId) -> bool {
        if id == self.root || !self.contains(id) {
            return false;
        }
        if let Some(parent) = self.parent(id) {
            if let Some(entry) = self.entry_mut(parent) {
                entry.children.retain(|c| *c != id);
            }
        }
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let children = self.children(current).to_vec();
            stack.extend(children);
            let slot = &mut self.slots[current.index as usize];
            slot.entry = None;
            self.free.push(current.index);
        }
        true
    }

    pub fn set_text(&mut self, id: NodeId, text: impl Into<String>) -> bool {
        match self.entry_mut(id) {
            Some(entry) => {
                entry.data.text = text.into();
                true
            }
            None => false,
        }
    }

    pub fn set_attribute(
        &mut self,
        id: NodeId,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> bool {
        match self.entry_mut(id) {
            Some(entry) => {
                entry.data.attributes.insert(name.into(), value.into());
                true
            }
            None => false,
        }
    }

    /// Preorder walk of the subtree rooted at `scope`, `scope` included.
    pub fn descendants(&self, scope: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        if !self.contains(scope) {
            return out;
        }
        let mut stack = vec![scope];
        while let Some(id) = stack.pop() {
            out.push(id);
            for child in self.children(id).iter().rev() {
                stack.push(*child);
            }
        }
        out
    }

    /// All nodes in document (reading) order.
    pub fn document_order(&self) -> Vec<NodeId> {
        self.descendants(self.root)
    }

    /// Position of the node in document order, if attached.
    pub fn rank(&self, id: NodeId) -> Option<usize> {
        self.document_order().iter().position(|n| *n == id)
    }

    /// Vertical offset: the host's explicit layout offset when set, otherwise
    /// document-order rank (a reading-order proxy good enough for pairing).
    pub fn offset_of(&self, id: NodeId) -> Option<f64> {
        let data = self.get(id)?;
        match data.offset_y {
            Some(offset) => Some(offset),
            None => self.rank(id).map(|r| r as f64),
        }
    }

    /// Concatenated text of the subtree, in document order.
    pub fn text_content(&self, id: NodeId) -> String {
        let mut parts = Vec::new();
        for node in self.descendants(id) {
            if let Some(data) = self.get(node) {
                if !data.text.is_empty() {
                    parts.push(data.text.clone());
                }
            }
        }
        parts.join(" ")
    }

    pub fn matches(&self, id: NodeId, selector: &Selector) -> bool {
        self.get(id).is_some_and(|data| selector.matches(data))
    }

    pub fn matches_any(&self, id: NodeId, selectors: &SelectorList) -> bool {
        self.get(id).is_some_and(|data| selectors.matches(data))
    }

    /// All descendants of `scope` (excluding `scope` itself) matching any
    /// selector in the list, in document order.
    pub fn query_all(&self, scope: NodeId, selectors: &SelectorList) -> Vec<NodeId> {
        self.descendants(scope)
            .into_iter()
            .skip(1)
            .filter(|id| self.matches_any(*id, selectors))
            .collect()
    }

    /// Nearest ancestor-or-self matching any selector in the list.
    pub fn closest(&self, id: NodeId, selectors: &SelectorList) -> Option<NodeId> {
        let mut current = Some(id);
        while let Some(node) = current {
            if self.matches_any(node, selectors) {
                return Some(node);
            }
            current = self.parent(node);
        }
        None
    }

    pub fn is_ancestor(&self, ancestor: NodeId, of: NodeId) -> bool {
        let mut current = self.parent(of);
        while let Some(node) = current {
            if node == ancestor {
                return true;
            }
            current = self.parent(node);
        }
        false
    }

    /// Reduce a match set to top-level matches only: any match nested inside
    /// another match is discarded. Input order is preserved.
    pub fn top_level(&self, matches: &[NodeId]) -> Vec<NodeId> {
        let set: HashSet<NodeId> = matches.iter().copied().collect();
        matches
            .iter()
            .copied()
            .filter(|id| {
                let mut current = self.parent(*id);
                while let Some(node) = current {
                    if set.contains(&node) {
                        return false;
                    }
                    current = self.parent(node);
                }
                true
            })
            .collect()
    }
}
