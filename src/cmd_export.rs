//! `chatloom export` - full export pipeline over a page snapshot.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use chatloom_capture::TurnCapture;
use chatloom_dom::PageSnapshot;
use chatloom_export::{
    ExportFormat, ExportOrchestrator, ExportRequest, FileSessionStore, SessionStore,
};
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::renderers::FileRenderer;

pub struct ExportArgs {
    pub snapshot: PathBuf,
    pub output: PathBuf,
    pub format: ExportFormat,
    pub font_size: Option<u32>,
    pub session: Option<String>,
}

pub async fn run(config: &AppConfig, args: ExportArgs) -> anyhow::Result<()> {
    let raw = std::fs::read_to_string(&args.snapshot)
        .with_context(|| format!("reading snapshot {}", args.snapshot.display()))?;
    let snapshot: PageSnapshot =
        serde_json::from_str(&raw).context("parsing page snapshot")?;
    let page = snapshot.into_page();

    // A snapshot is inert: clicks on the earliest message load nothing, so
    // the orchestrator converges after its first stability wait. Drain the
    // click events so the channel never backs up.
    if let Some(mut events) = page.take_host_events() {
        tokio::spawn(async move { while events.recv().await.is_some() {} });
    }

    let session_id = args.session.clone().unwrap_or_else(|| page.url());
    let store_path = store_path(config, &session_id);
    let store: Arc<dyn SessionStore> = Arc::new(FileSessionStore::new(store_path).await?);
    let renderer = Arc::new(FileRenderer::new(args.output.clone()));
    let capture = Arc::new(TurnCapture::new(page, config.capture.clone())?);
    let orchestrator =
        ExportOrchestrator::new(capture, store, renderer, config.export.clone());

    let resumed = orchestrator.take_pending().await?;
    let mut request = ExportRequest::new(args.format);
    request.font_size = args.font_size;
    if let Some(state) = &resumed {
        // A prior run was interrupted mid-click; carry its request forward.
        request.format = state.format;
        request.font_size = state.font_size;
        request.initial_selected_message_id = state.initial_selected_message_id.clone();
    }

    let report = orchestrator.run(request, resumed).await?;
    if report.degenerate {
        warn!("no conversation content was found; the export file is empty");
    }
    info!(
        turns = report.turns_exported,
        attempts = report.attempts,
        output = %args.output.display(),
        "export complete"
    );
    Ok(())
}

fn store_path(config: &AppConfig, session_id: &str) -> PathBuf {
    match &config.session_dir {
        Some(dir) => {
            let default = FileSessionStore::default_path(session_id);
            // default_path sanitizes the id into a file name; keep that,
            // swap the directory.
            dir.join(default.file_name().unwrap_or_default())
        }
        None => FileSessionStore::default_path(session_id),
    }
}

pub fn parse_format(raw: &str) -> anyhow::Result<ExportFormat> {
    match raw {
        "json" => Ok(ExportFormat::Json),
        "markdown" | "md" => Ok(ExportFormat::Markdown),
        "pdf" => Ok(ExportFormat::Pdf),
        "image" => Ok(ExportFormat::Image),
        other => anyhow::bail!("unknown export format '{other}' (expected json, markdown, pdf, image)"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_format_accepts_aliases() {
        assert_eq!(parse_format("md").unwrap(), ExportFormat::Markdown);
        assert_eq!(parse_format("json").unwrap(), ExportFormat::Json);
        assert!(parse_format("docx").is_err());
    }

    #[test]
    fn test_store_path_honors_session_dir() {
        let config = AppConfig {
            session_dir: Some(PathBuf::from("/tmp/sessions")),
            ..Default::default()
        };
        let path = store_path(&config, "https://chat.example/app/abc");
        assert!(path.starts_with("/tmp/sessions"));
        assert!(path.extension().is_some_and(|e| e == "json"));
    }
}
