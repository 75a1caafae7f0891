//! File-writing renderers for the CLI.

use std::path::PathBuf;

use async_trait::async_trait;
use chatloom_capture::Turn;
use chatloom_export::{ExportFormat, ExportMetadata, ExportOptions, ExportRenderer, RenderError};
use serde::Serialize;
use tracing::info;

/// Renders the captured conversation to a local file.
///
/// JSON and Markdown are supported; the richer formats (PDF, image) need a
/// layout engine the CLI does not carry.
pub struct FileRenderer {
    output: PathBuf,
}

#[derive(Serialize)]
struct JsonDocument<'a> {
    metadata: &'a ExportMetadata,
    turns: &'a [Turn],
}

impl FileRenderer {
    pub fn new(output: PathBuf) -> Self {
        Self { output }
    }

    fn to_markdown(turns: &[Turn], metadata: &ExportMetadata) -> String {
        let mut out = String::new();
        out.push_str(&format!("# {}\n\n", metadata.title));
        out.push_str(&format!(
            "> {} turns, exported {} from {}\n\n",
            metadata.count, metadata.exported_at, metadata.url
        ));
        for turn in turns {
            let star = if turn.starred { " ⭐" } else { "" };
            out.push_str(&format!("## User{star}\n\n{}\n\n", turn.user));
            if !turn.assistant.is_empty() {
                out.push_str(&format!("## Assistant\n\n{}\n\n", turn.assistant));
            }
        }
        out
    }
}

#[async_trait]
impl ExportRenderer for FileRenderer {
    async fn render(
        &self,
        turns: &[Turn],
        metadata: &ExportMetadata,
        options: &ExportOptions,
    ) -> Result<(), RenderError> {
        let body = match options.format {
            ExportFormat::Json => {
                let doc = JsonDocument { metadata, turns };
                serde_json::to_string_pretty(&doc)
                    .map_err(|e| RenderError::Failed(e.to_string()))?
            }
            ExportFormat::Markdown => Self::to_markdown(turns, metadata),
            other => {
                return Err(RenderError::Failed(format!(
                    "format {other} is not supported by the file renderer"
                )));
            }
        };
        tokio::fs::write(&self.output, body).await?;
        info!(path = %self.output.display(), turns = turns.len(), "export written");
        Ok(())
    }
}
