//! # Chatloom Watch
//!
//! Decides when a mutating document subtree has stopped changing.
//!
//! Two pieces:
//!
//! - [`fingerprint`]: a cheap, deterministic summary of a subtree's matched
//!   message set (sampled-text signature + top-level count). Comparing two
//!   fingerprints detects change without deep tree comparison.
//! - [`wait_for_change_or_timeout`]: observes a subtree through both batched
//!   mutation notifications and polling, and reports — within a bounded wait
//!   — whether content changed relative to a baseline and has since gone
//!   idle. Convergence is a single pure decision function over a
//!   [`ChangeEvidence`] accumulator, so either signal source can be exercised
//!   independently in tests.

pub mod detector;
pub mod evidence;
pub mod fingerprint;

pub use detector::{StabilityOptions, StabilityVerdict, wait_for_change_or_timeout};
pub use evidence::ChangeEvidence;
pub use fingerprint::{Fingerprint, fingerprint};
