//! Export errors.

use thiserror::Error;

use crate::renderer::RenderError;
use crate::store::StoreError;

/// Errors surfaced by the export orchestrator.
///
/// Most failure modes in this pipeline are absorbed locally (empty captures,
/// stale resumed state, convergence timeouts); exhausting the load-more
/// attempt ceiling is the one hard failure.
#[derive(Debug, Error)]
pub enum ExportError {
    /// The host's load-more affordance never converged within the attempt
    /// ceiling — infinite history or a broken matcher.
    #[error("export aborted after {attempts} load-more attempts without convergence")]
    AttemptsExhausted { attempts: u32 },

    /// Session store failure.
    #[error("session store error: {0}")]
    Store(#[from] StoreError),

    /// The external renderer rejected the finished turn list.
    #[error("export renderer failed: {0}")]
    Render(#[from] RenderError),
}
