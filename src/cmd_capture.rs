//! `chatloom capture` - one-shot turn reconstruction from a page snapshot.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use chatloom_capture::TurnCapture;
use chatloom_dom::PageSnapshot;
use tracing::info;

use crate::config::AppConfig;

pub async fn run(config: &AppConfig, snapshot_path: &Path, messages: bool) -> anyhow::Result<()> {
    let raw = std::fs::read_to_string(snapshot_path)
        .with_context(|| format!("reading snapshot {}", snapshot_path.display()))?;
    let snapshot: PageSnapshot =
        serde_json::from_str(&raw).context("parsing page snapshot")?;
    let page = snapshot.into_page();

    let capture = Arc::new(TurnCapture::new(page, config.capture.clone())?);
    let turns = capture.capture_turns();
    info!(turns = turns.len(), "conversation reconstructed");

    let stdout = std::io::stdout().lock();
    if messages {
        serde_json::to_writer_pretty(stdout, &capture.export_messages(&turns))?;
    } else {
        serde_json::to_writer_pretty(stdout, &turns)?;
    }
    println!();
    Ok(())
}
