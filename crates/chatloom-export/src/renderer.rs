//! The external renderer seam.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use chatloom_capture::Turn;

use crate::state::ExportFormat;

/// Renderer failures, opaque to this crate.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("{0}")]
    Failed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Metadata accompanying every renderer hand-off.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportMetadata {
    pub url: String,
    pub exported_at: DateTime<Utc>,
    /// Number of turns in the finished list.
    pub count: usize,
    pub title: String,
}

/// Options forwarded to the renderer untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportOptions {
    pub format: ExportFormat,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_size: Option<u32>,
    #[serde(default)]
    pub include_image_source: bool,
}

/// Consumes a finished conversation. File formats, layout and delivery are
/// entirely the renderer's concern; the orchestrator's sole obligation is a
/// correctly ordered, deduplicated turn list with accurate metadata.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ExportRenderer: Send + Sync {
    async fn render(
        &self,
        turns: &[Turn],
        metadata: &ExportMetadata,
        options: &ExportOptions,
    ) -> Result<(), RenderError>;
}
