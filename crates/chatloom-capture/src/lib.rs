//! # Chatloom Capture
//!
//! Rebuilds a structured conversation — ordered user/assistant turn pairs —
//! from an arbitrary, continuously-mutating host document tree.
//!
//! The host gives no stable message identifiers and no single interleaved
//! message list, so the builder works structurally: prioritized selector
//! lists find candidate message nodes, matches are reduced to top-level ones,
//! users pair with assistants by vertical offset (with a bounded sibling scan
//! as fallback), and turn identity is a content hash of normalized user text
//! plus a positional tie-breaker.
//!
//! Every capture recomputes from scratch; [`Turn`]s are values, and only the
//! derived `turn_id` carries across captures of an unchanged tree.

pub mod builder;
pub mod config;
pub mod error;
pub mod turn;

pub use builder::TurnCapture;
pub use config::CaptureConfig;
pub use error::CaptureError;
pub use turn::{ExportMessage, Role, Turn};
