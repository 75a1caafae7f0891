//! Capture errors.

use thiserror::Error;

/// Errors raised while building a capturer.
///
/// Capture itself never fails: zero matches is a degenerate (empty) result,
/// not an error.
#[derive(Debug, Error)]
pub enum CaptureError {
    /// A toggle-control denylist pattern did not compile.
    #[error("invalid toggle pattern: {0}")]
    InvalidTogglePattern(#[from] regex::Error),
}
