//! The turn builder itself.

use std::collections::{HashMap, HashSet};

use parking_lot::Mutex;
use regex::Regex;
use tracing::debug;

use chatloom_dom::{DocumentTree, NodeId, PageHandle, SelectorList, normalize_text};

use crate::config::CaptureConfig;
use crate::error::CaptureError;
use crate::turn::{ExportMessage, Role, Turn};

/// Hex digits of the content hash kept in a turn id.
const TURN_ID_HASH_LEN: usize = 8;

struct CachedTurnId {
    index: usize,
    content_hash: blake3::Hash,
    id: String,
}

/// Reconstructs conversation turns from a live page.
///
/// Stateless with respect to the conversation: every call to
/// [`capture_turns`](TurnCapture::capture_turns) rebuilds the turn list from
/// the current tree. The only retained state is the node→id memo table, which
/// makes repeated captures of an unchanged tree hand back identical ids
/// without rehashing, and which is pruned to live nodes on every capture.
pub struct TurnCapture {
    page: PageHandle,
    config: CaptureConfig,
    toggle_patterns: Vec<Regex>,
    id_cache: Mutex<HashMap<NodeId, CachedTurnId>>,
}

impl TurnCapture {
    pub fn new(page: PageHandle, config: CaptureConfig) -> Result<Self, CaptureError> {
        let toggle_patterns = config
            .toggle_patterns
            .iter()
            .map(|p| Regex::new(p))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            page,
            config,
            toggle_patterns,
            id_cache: Mutex::new(HashMap::new()),
        })
    }

    pub fn page(&self) -> &PageHandle {
        &self.page
    }

    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    /// Capture the conversation as ordered turns. Never fails; a tree with no
    /// matched messages yields an empty list.
    pub fn capture_turns(&self) -> Vec<Turn> {
        self.page.read(|tree| self.capture_in(tree))
    }

    /// The node fingerprints and load-more clicks should be scoped to.
    pub fn conversation_scope(&self) -> NodeId {
        self.page.read(|tree| self.resolve_root(tree))
    }

    /// Earliest-loaded message node (user or assistant) in document order.
    pub fn earliest_message(&self) -> Option<NodeId> {
        self.page.read(|tree| {
            let root = self.resolve_root(tree);
            let union = self.config.message_union();
            self.collect(tree, root, &union).into_iter().next()
        })
    }

    /// Flatten turns into per-role entries with a total document order.
    pub fn export_messages(&self, turns: &[Turn]) -> Vec<ExportMessage> {
        self.page.read(|tree| {
            let mut out = Vec::new();
            for (index, turn) in turns.iter().enumerate() {
                // Positions for detached nodes fall back to turn order,
                // interleaving user before assistant.
                let fallback = (index * 2) as f64;
                if !turn.user.is_empty() || turn.user_node.is_some() {
                    let position = turn
                        .user_node
                        .and_then(|n| tree.offset_of(n))
                        .unwrap_or(fallback);
                    out.push(ExportMessage {
                        id: format!("{}:u", turn.turn_id),
                        role: Role::User,
                        node: turn.user_node,
                        text: turn.user.clone(),
                        starred: turn.starred,
                        position,
                    });
                }
                if !turn.assistant.is_empty() || turn.assistant_node.is_some() {
                    let position = turn
                        .assistant_node
                        .and_then(|n| tree.offset_of(n))
                        .unwrap_or(fallback + 1.0);
                    out.push(ExportMessage {
                        id: format!("{}:a", turn.turn_id),
                        role: Role::Assistant,
                        node: turn.assistant_node,
                        text: turn.assistant.clone(),
                        starred: turn.starred,
                        position,
                    });
                }
            }
            out.sort_by(|a, b| a.position.total_cmp(&b.position).then_with(|| a.id.cmp(&b.id)));
            out
        })
    }

    fn capture_in(&self, tree: &DocumentTree) -> Vec<Turn> {
        let root = self.resolve_root(tree);
        let users_raw = self.collect(tree, root, &self.config.user_selectors);
        let users = self.dedup_users(tree, &users_raw);
        let assistants = self.collect(tree, root, &self.config.assistant_selectors);

        debug!(
            users = users.len(),
            assistants = assistants.len(),
            duplicates = users_raw.len() - users.len(),
            "capturing turns"
        );

        let mut available = assistants;
        let mut turns = Vec::with_capacity(users.len());
        for (index, &user) in users.iter().enumerate() {
            let user_offset = tree.offset_of(user).unwrap_or(index as f64);
            let next_user = users.get(index + 1).copied();
            let next_offset = next_user
                .and_then(|u| tree.offset_of(u))
                .unwrap_or(f64::INFINITY);

            let assistant = self
                .pick_by_offset(tree, &mut available, user_offset, next_offset)
                .or_else(|| self.sibling_fallback(tree, user, next_user, &mut available));

            let user_text = normalize_text(&tree.text_content(user));
            let assistant_text = assistant
                .map(|a| self.assistant_text(tree, a))
                .unwrap_or_default();

            let turn = Turn {
                turn_id: self.turn_id(index, user, &user_text),
                user: user_text,
                assistant: assistant_text,
                starred: self.is_starred(tree, user),
                user_node: Some(user),
                assistant_node: assistant,
            };
            if turn.is_substantial() {
                turns.push(turn);
            }
        }

        let seen: HashSet<NodeId> = users.iter().copied().collect();
        self.id_cache.lock().retain(|node, _| seen.contains(node));

        turns
    }

    /// First root candidate that exists and holds at least one user match;
    /// the document root otherwise.
    fn resolve_root(&self, tree: &DocumentTree) -> NodeId {
        for candidate in self.config.root_candidates.iter() {
            for id in tree.document_order() {
                if tree.matches(id, candidate)
                    && !tree.query_all(id, &self.config.user_selectors).is_empty()
                {
                    return id;
                }
            }
        }
        tree.root()
    }

    /// Top-level matches under `root`, with the immersive pane carved out.
    fn collect(&self, tree: &DocumentTree, root: NodeId, selectors: &SelectorList) -> Vec<NodeId> {
        let matches = tree.query_all(root, selectors);
        tree.top_level(&matches)
            .into_iter()
            .filter(|id| {
                tree.closest(*id, &self.config.immersive_exclusions)
                    .is_none()
            })
            .collect()
    }

    /// Drop user matches that repeat an earlier match's normalized text at a
    /// near-identical vertical offset. The host renders transient duplicates
    /// during animation; genuinely repeated questions sit at distinct offsets
    /// and survive.
    fn dedup_users(&self, tree: &DocumentTree, users: &[NodeId]) -> Vec<NodeId> {
        let mut kept: Vec<(NodeId, String, f64)> = Vec::with_capacity(users.len());
        for &user in users {
            let text = normalize_text(&tree.text_content(user));
            let offset = tree.offset_of(user).unwrap_or(0.0);
            let duplicate = kept.iter().any(|(_, seen_text, seen_offset)| {
                *seen_text == text
                    && (offset - seen_offset).abs() <= self.config.duplicate_offset_epsilon
            });
            if duplicate {
                debug!(node = %user, "dropping transient duplicate user node");
            } else {
                kept.push((user, text, offset));
            }
        }
        kept.into_iter().map(|(id, _, _)| id).collect()
    }

    /// Nearest assistant whose offset falls in `[user_offset, next_offset)`,
    /// removed from the pool so it cannot pair twice.
    fn pick_by_offset(
        &self,
        tree: &DocumentTree,
        available: &mut Vec<NodeId>,
        user_offset: f64,
        next_offset: f64,
    ) -> Option<NodeId> {
        let mut best: Option<(usize, f64)> = None;
        for (i, &candidate) in available.iter().enumerate() {
            let Some(offset) = tree.offset_of(candidate) else {
                continue;
            };
            if offset < user_offset || offset >= next_offset {
                continue;
            }
            if best.is_none_or(|(_, best_offset)| offset < best_offset) {
                best = Some((i, offset));
            }
        }
        best.map(|(i, _)| available.remove(i))
    }

    /// Bounded forward scan through following siblings for the next assistant
    /// match before the next user match. Best-effort fallback for hosts that
    /// interleave turns non-linearly; multi-node assistant turns may still
    /// lose trailing fragments.
    fn sibling_fallback(
        &self,
        tree: &DocumentTree,
        user: NodeId,
        next_user: Option<NodeId>,
        available: &mut Vec<NodeId>,
    ) -> Option<NodeId> {
        let parent = tree.parent(user)?;
        let siblings = tree.children(parent);
        let start = siblings.iter().position(|&s| s == user)? + 1;

        for &sibling in siblings
            .iter()
            .skip(start)
            .take(self.config.sibling_scan_window)
        {
            if let Some(next) = next_user {
                if sibling == next || tree.is_ancestor(sibling, next) {
                    return None;
                }
            }
            let found = if tree.matches_any(sibling, &self.config.assistant_selectors) {
                Some(sibling)
            } else {
                tree.query_all(sibling, &self.config.assistant_selectors)
                    .into_iter()
                    .next()
            };
            if let Some(candidate) = found {
                if tree
                    .closest(candidate, &self.config.immersive_exclusions)
                    .is_some()
                {
                    continue;
                }
                available.retain(|&a| a != candidate);
                return Some(candidate);
            }
        }
        None
    }

    /// Visible assistant text: walks the subtree, skipping collapsed
    /// reasoning panels and their toggle controls so hidden chain-of-thought
    /// never leaks into an export.
    fn assistant_text(&self, tree: &DocumentTree, node: NodeId) -> String {
        let mut parts = Vec::new();
        let mut stack = vec![node];
        while let Some(id) = stack.pop() {
            if id != node {
                if tree.matches_any(id, &self.config.reasoning_panels) {
                    continue;
                }
                if self.is_toggle_control(tree, id) {
                    continue;
                }
            }
            if let Some(data) = tree.get(id) {
                if !data.text.is_empty() {
                    parts.push(data.text.clone());
                }
            }
            for child in tree.children(id).iter().rev() {
                stack.push(*child);
            }
        }
        normalize_text(&parts.join(" "))
    }

    fn is_toggle_control(&self, tree: &DocumentTree, id: NodeId) -> bool {
        let Some(data) = tree.get(id) else {
            return false;
        };
        let control = data.tag.eq_ignore_ascii_case("button")
            || data
                .attr("role")
                .is_some_and(|role| self.config.toggle_roles.iter().any(|t| t == role));
        if !control {
            return false;
        }
        let caption = normalize_text(&tree.text_content(id));
        self.toggle_patterns.iter().any(|p| p.is_match(&caption))
    }

    fn is_starred(&self, tree: &DocumentTree, user: NodeId) -> bool {
        tree.matches_any(user, &self.config.starred_selectors)
            || !tree
                .query_all(user, &self.config.starred_selectors)
                .is_empty()
    }

    /// Content-addressed turn id: position index plus a hash of the
    /// normalized user text (or a positional stand-in when the text is
    /// empty). Memoized per node so unchanged nodes keep their id across
    /// captures without rehashing.
    fn turn_id(&self, index: usize, node: NodeId, normalized_text: &str) -> String {
        let basis = if normalized_text.is_empty() {
            format!("user-{index}")
        } else {
            normalized_text.to_string()
        };
        let content_hash = blake3::hash(basis.as_bytes());

        let mut cache = self.id_cache.lock();
        if let Some(cached) = cache.get(&node) {
            if cached.index == index && cached.content_hash == content_hash {
                return cached.id.clone();
            }
        }
        let hex = content_hash.to_hex();
        let id = format!("u-{}-{}", index, &hex.as_str()[..TURN_ID_HASH_LEN]);
        cache.insert(
            node,
            CachedTurnId {
                index,
                content_hash,
                id: id.clone(),
            },
        );
        id
    }
}
