//! The persisted pending-export record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Target export formats. Rendering is external; the orchestrator only
/// carries the choice through to the renderer and the persisted state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Json,
    Markdown,
    Pdf,
    Image,
}

impl std::fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ExportFormat::Json => "json",
            ExportFormat::Markdown => "markdown",
            ExportFormat::Pdf => "pdf",
            ExportFormat::Image => "image",
        };
        f.write_str(name)
    }
}

/// Phase of a persisted operation. The in-flight phase is always `Clicking`:
/// the record exists exactly between "about to click" and "stability verdict
/// in", the only window where a reload can kill the instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PendingStatus {
    Clicking,
}

/// State persisted before any action that might reload the host page.
///
/// Written to the session store immediately before each simulated click and
/// removed on terminal success or abort. A record is honored on resume only
/// if `url` matches the current location exactly; anything else means the
/// user navigated away and the record is stale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingExportState {
    pub format: ExportFormat,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_size: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_selected_message_id: Option<String>,
    /// Load-more attempts performed so far, including the one this record
    /// was written for.
    pub attempt: u32,
    pub url: String,
    pub status: PendingStatus,
    pub timestamp: DateTime<Utc>,
}

impl PendingExportState {
    pub fn matches_location(&self, url: &str) -> bool {
        self.url == url
    }
}
