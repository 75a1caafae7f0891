//! Node handles and node payloads.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque handle to a node in a [`crate::DocumentTree`].
///
/// Generational: once a node is detached its slot may be reused, and the old
/// handle stops resolving rather than aliasing the new occupant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId {
    pub(crate) index: u32,
    pub(crate) generation: u32,
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}g{}", self.index, self.generation)
    }
}

/// Payload of a single node: tag, attributes, own text and an optional
/// explicit vertical offset.
///
/// `offset_y` mirrors the host's layout position. When the host (or a test
/// fixture) does not supply one, document-order rank stands in for it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeData {
    pub tag: String,
    #[serde(default)]
    pub attributes: HashMap<String, String>,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub offset_y: Option<f64>,
}

impl NodeData {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Default::default()
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// Append a class token to the `class` attribute.
    pub fn with_class(mut self, class: &str) -> Self {
        let entry = self.attributes.entry("class".to_string()).or_default();
        if entry.is_empty() {
            entry.push_str(class);
        } else {
            entry.push(' ');
            entry.push_str(class);
        }
        self
    }

    pub fn with_offset(mut self, offset_y: f64) -> Self {
        self.offset_y = Some(offset_y);
        self
    }

    /// Attribute value, if present.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// Class tokens from the `class` attribute.
    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.attr("class").unwrap_or("").split_whitespace()
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes().any(|c| c == class)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_class_appends() {
        let node = NodeData::new("div").with_class("a").with_class("b");
        assert_eq!(node.attr("class"), Some("a b"));
        assert!(node.has_class("a"));
        assert!(node.has_class("b"));
        assert!(!node.has_class("ab"));
    }

    #[test]
    fn test_attr_lookup() {
        let node = NodeData::new("span").with_attr("data-role", "user");
        assert_eq!(node.attr("data-role"), Some("user"));
        assert_eq!(node.attr("missing"), None);
    }
}
