//! Subtree fingerprints.

use serde::{Deserialize, Serialize};

use chatloom_dom::{DocumentTree, NodeId, SelectorList, normalize_text};

/// Compact summary of a subtree's matched message set.
///
/// `signature` hashes the first N normalized text samples of the top-level
/// matches in document order; `count` is the total number of top-level
/// matches. Both fields participate in equality: appending an empty-text node
/// leaves the sampled signature alone but still changes `count`, and must
/// read as a change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fingerprint {
    pub signature: String,
    pub count: usize,
}

impl Fingerprint {
    /// Fingerprint of a subtree with no matches at all (detached roots
    /// included).
    pub fn empty() -> Self {
        Self {
            signature: String::new(),
            count: 0,
        }
    }
}

/// Compute the fingerprint of `scope`'s matched message set.
///
/// Pure function of the current tree state and the selector list: no
/// mutation, no side effects, O(matched nodes). Nested matches are reduced to
/// top-level ones with the same rule the turn builder uses, so counts stay
/// consistent between the two.
pub fn fingerprint(
    tree: &DocumentTree,
    scope: NodeId,
    selectors: &SelectorList,
    max_samples: usize,
) -> Fingerprint {
    if !tree.contains(scope) {
        return Fingerprint::empty();
    }
    let matches = tree.top_level(&tree.query_all(scope, selectors));
    if matches.is_empty() {
        return Fingerprint::empty();
    }

    let mut hasher = blake3::Hasher::new();
    for node in matches.iter().take(max_samples) {
        hasher.update(normalize_text(&tree.text_content(*node)).as_bytes());
        hasher.update(&[0x1f]); // sample separator
    }
    Fingerprint {
        signature: hasher.finalize().to_hex().to_string(),
        count: matches.len(),
    }
}
