//! Serializable page snapshots.
//!
//! A snapshot is a plain nested-node rendition of a page, the format the CLI
//! loads fixtures from and the format tests use to describe host layouts.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::node::{NodeData, NodeId};
use crate::page::PageHandle;
use crate::tree::DocumentTree;

/// One node in a snapshot, children nested inline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotNode {
    pub tag: String,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub attributes: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset_y: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<SnapshotNode>,
}

impl SnapshotNode {
    fn into_data(self) -> (NodeData, Vec<SnapshotNode>) {
        (
            NodeData {
                tag: self.tag,
                attributes: self.attributes,
                text: self.text,
                offset_y: self.offset_y,
            },
            self.children,
        )
    }

    fn of_subtree(tree: &DocumentTree, id: NodeId) -> Option<SnapshotNode> {
        let data = tree.get(id)?.clone();
        let children = tree
            .children(id)
            .iter()
            .filter_map(|child| Self::of_subtree(tree, *child))
            .collect();
        Some(SnapshotNode {
            tag: data.tag,
            attributes: data.attributes,
            text: data.text,
            offset_y: data.offset_y,
            children,
        })
    }
}

/// A whole page: location, title and the root subtree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageSnapshot {
    pub url: String,
    #[serde(default)]
    pub title: String,
    pub root: SnapshotNode,
}

impl PageSnapshot {
    /// Materialize the snapshot into a live page handle.
    pub fn into_page(self) -> PageHandle {
        let (root_data, children) = self.root.into_data();
        let mut tree = DocumentTree::new(root_data);
        let root = tree.root();
        for child in children {
            attach(&mut tree, root, child);
        }
        PageHandle::new(self.url, self.title, tree)
    }

    /// Capture the current state of a live page.
    pub fn of_page(page: &PageHandle) -> PageSnapshot {
        let root = page.read(|tree| {
            SnapshotNode::of_subtree(tree, tree.root()).unwrap_or(SnapshotNode {
                tag: "body".to_string(),
                attributes: HashMap::new(),
                text: String::new(),
                offset_y: None,
                children: Vec::new(),
            })
        });
        PageSnapshot {
            url: page.url(),
            title: page.title(),
            root,
        }
    }
}

fn attach(tree: &mut DocumentTree, parent: NodeId, node: SnapshotNode) {
    let (data, children) = node.into_data();
    if let Some(id) = tree.append_child(parent, data) {
        for child in children {
            attach(tree, id, child);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_round_trips_structure() {
        let json = serde_json::json!({
            "url": "https://chat.example/app/abc",
            "title": "Trip planning",
            "root": {
                "tag": "body",
                "children": [
                    {
                        "tag": "main",
                        "attributes": {"class": "conversation"},
                        "children": [
                            {"tag": "article", "attributes": {"data-role": "user"}, "text": "hi"},
                            {"tag": "article", "attributes": {"data-role": "assistant"}, "text": "hello"}
                        ]
                    }
                ]
            }
        });
        let snapshot: PageSnapshot = serde_json::from_value(json).unwrap();
        let page = snapshot.into_page();

        assert_eq!(page.title(), "Trip planning");
        let texts: Vec<String> = page.read(|tree| {
            tree.document_order()
                .into_iter()
                .filter_map(|id| tree.get(id))
                .filter(|d| !d.text.is_empty())
                .map(|d| d.text.clone())
                .collect()
        });
        assert_eq!(texts, vec!["hi", "hello"]);

        let back = PageSnapshot::of_page(&page);
        assert_eq!(back.url, "https://chat.example/app/abc");
        assert_eq!(back.root.children[0].children.len(), 2);
    }
}
