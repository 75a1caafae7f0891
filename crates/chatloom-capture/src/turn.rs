//! Turn values and their flattened export projection.

use serde::{Deserialize, Serialize};

use chatloom_dom::NodeId;

/// One user message paired with its assistant response.
///
/// Turns are values recomputed on every capture. Node handles are borrowed
/// from the host tree and may go stale at any time; only `turn_id` — a
/// content hash with a positional tie-breaker — is meaningful across
/// captures.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub turn_id: String,
    pub user: String,
    pub assistant: String,
    pub starred: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_node: Option<NodeId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assistant_node: Option<NodeId>,
}

impl Turn {
    /// A turn is worth emitting only if it carries some text or a live node.
    pub fn is_substantial(&self) -> bool {
        !self.user.is_empty()
            || !self.assistant.is_empty()
            || self.user_node.is_some()
            || self.assistant_node.is_some()
    }
}

/// Message role within a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// Flattened, totally-ordered projection of a [`Turn`].
///
/// User and assistant nodes are not interleaved in one host list, so each
/// entry carries its own vertical position and the projection sorts on it to
/// recover reading order across the whole conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportMessage {
    /// `"<turn_id>:u"` or `"<turn_id>:a"`.
    pub id: String,
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node: Option<NodeId>,
    pub text: String,
    pub starred: bool,
    /// Vertical document position used for the total order.
    pub position: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_substantial_requires_content_or_node() {
        let empty = Turn {
            turn_id: "u-0-deadbeef".to_string(),
            user: String::new(),
            assistant: String::new(),
            starred: false,
            user_node: None,
            assistant_node: None,
        };
        assert!(!empty.is_substantial());

        let text_only = Turn {
            assistant: "hi".to_string(),
            ..empty.clone()
        };
        assert!(text_only.is_substantial());
    }

    #[test]
    fn test_role_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Role::User).unwrap(), "\"user\"");
        assert_eq!(
            serde_json::to_string(&Role::Assistant).unwrap(),
            "\"assistant\""
        );
    }
}
