//! Capture configuration: the structural matchers for one host layout.

use serde::{Deserialize, Serialize};

use chatloom_dom::{Selector, SelectorList};

/// Selector lists and heuristics the turn builder runs with.
///
/// Defaults target the chat host this pipeline was written against; a config
/// file can swap in another host's structure without code changes. All lists
/// are ordered by priority.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// Conversation-root candidates, most specific first. The first candidate
    /// that exists and contains at least one user match wins; the document
    /// root is the fallback.
    #[serde(default = "default_root_candidates")]
    pub root_candidates: SelectorList,

    /// User message matchers.
    #[serde(default = "default_user_selectors")]
    pub user_selectors: SelectorList,

    /// Assistant message matchers.
    #[serde(default = "default_assistant_selectors")]
    pub assistant_selectors: SelectorList,

    /// The immersive-report reading pane; nothing inside it is a turn.
    #[serde(default = "default_immersive_exclusions")]
    pub immersive_exclusions: SelectorList,

    /// Collapsible reasoning/thinking panels, skipped during assistant text
    /// extraction so hidden chain-of-thought never reaches an export.
    #[serde(default = "default_reasoning_panels")]
    pub reasoning_panels: SelectorList,

    /// Regex denylist (source form) for reasoning toggle-control captions.
    #[serde(default = "default_toggle_patterns")]
    pub toggle_patterns: Vec<String>,

    /// `role` attribute values that mark a node as a control rather than
    /// content, checked together with `toggle_patterns`.
    #[serde(default = "default_toggle_roles")]
    pub toggle_roles: Vec<String>,

    /// Matcher for starred turns (self or descendant of the user node).
    #[serde(default = "default_starred_selectors")]
    pub starred_selectors: SelectorList,

    /// Forward-scan window for the fallback pairing heuristic. Best effort:
    /// assistant turns split across non-adjacent nodes can still be missed.
    #[serde(default = "default_sibling_scan_window")]
    pub sibling_scan_window: usize,

    /// Vertical-offset tolerance when suppressing transient duplicate user
    /// nodes the host renders during animation.
    #[serde(default = "default_duplicate_offset_epsilon")]
    pub duplicate_offset_epsilon: f64,
}

fn default_root_candidates() -> SelectorList {
    SelectorList::new(vec![
        Selector::tag("main").class("chat-scroll-region"),
        Selector::any().attr("data-conversation-root"),
        Selector::tag("section").class("conversation"),
    ])
}

fn default_user_selectors() -> SelectorList {
    SelectorList::new(vec![
        Selector::any().attr_eq("data-role", "user"),
        Selector::any().class("user-query"),
        Selector::tag("article").class("user-turn"),
    ])
}

fn default_assistant_selectors() -> SelectorList {
    SelectorList::new(vec![
        Selector::any().attr_eq("data-role", "assistant"),
        Selector::any().class("model-response"),
        Selector::tag("article").class("assistant-turn"),
    ])
}

fn default_immersive_exclusions() -> SelectorList {
    SelectorList::new(vec![
        Selector::any().attr("data-immersive-panel"),
        Selector::any().class("immersive-report"),
    ])
}

fn default_reasoning_panels() -> SelectorList {
    SelectorList::new(vec![
        Selector::any().attr("data-thought-panel"),
        Selector::any().class("thinking-panel"),
        Selector::any().attr_eq("data-role", "reasoning"),
    ])
}

fn default_toggle_patterns() -> Vec<String> {
    vec![
        r"(?i)\b(show|hide)\s+(thinking|reasoning)\b".to_string(),
        r"(?i)^thought\s+for\b".to_string(),
    ]
}

fn default_toggle_roles() -> Vec<String> {
    vec!["button".to_string(), "tab".to_string()]
}

fn default_starred_selectors() -> SelectorList {
    SelectorList::new(vec![
        Selector::any().attr_eq("data-starred", "true"),
        Selector::any().class("starred"),
    ])
}

fn default_sibling_scan_window() -> usize {
    8
}

fn default_duplicate_offset_epsilon() -> f64 {
    4.0
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            root_candidates: default_root_candidates(),
            user_selectors: default_user_selectors(),
            assistant_selectors: default_assistant_selectors(),
            immersive_exclusions: default_immersive_exclusions(),
            reasoning_panels: default_reasoning_panels(),
            toggle_patterns: default_toggle_patterns(),
            toggle_roles: default_toggle_roles(),
            starred_selectors: default_starred_selectors(),
            sibling_scan_window: default_sibling_scan_window(),
            duplicate_offset_epsilon: default_duplicate_offset_epsilon(),
        }
    }
}

impl CaptureConfig {
    /// Union of user and assistant matchers, user priority first. This is the
    /// selector set fingerprints and earliest-message lookups run over, so
    /// their counts stay consistent with the turn builder's.
    pub fn message_union(&self) -> SelectorList {
        self.user_selectors.union(&self.assistant_selectors)
    }
}
