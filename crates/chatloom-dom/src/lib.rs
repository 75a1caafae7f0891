//! # Chatloom DOM
//!
//! Model of the host page's document tree as seen by the capture pipeline.
//!
//! The host tree is external, continuously mutated state. This crate gives the
//! rest of the workspace a narrow, testable view of it:
//!
//! - [`DocumentTree`]: arena-backed node storage with opaque [`NodeId`]
//!   handles. Handles are stable only while the node stays attached; lookups
//!   on detached nodes return `None` instead of panicking.
//! - [`Selector`] / [`SelectorList`]: compound structural matchers
//!   (`tag.class[attr="v"]`) with per-node matching, ancestor walks and
//!   top-level match reduction.
//! - [`PageHandle`]: shared read/mutate access to a tree plus the two external
//!   channels the pipeline cares about — batched mutation notifications out,
//!   a single constrained simulated click in.

pub mod node;
pub mod page;
pub mod selector;
pub mod snapshot;
pub mod text;
pub mod tree;

pub use node::{NodeData, NodeId};
pub use page::{HostEvent, MutationStream, PageHandle};
pub use selector::{Selector, SelectorError, SelectorList};
pub use snapshot::{PageSnapshot, SnapshotNode};
pub use text::normalize_text;
pub use tree::DocumentTree;
