//! CLI configuration file loading.

use std::path::{Path, PathBuf};

use anyhow::Context;
use chatloom_capture::CaptureConfig;
use chatloom_export::OrchestratorConfig;
use serde::{Deserialize, Serialize};

/// Top-level configuration, read from a JSON file. Every field falls back to
/// its built-in default, so a partial (or absent) file is fine.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub capture: CaptureConfig,

    #[serde(default)]
    pub export: OrchestratorConfig,

    /// Where pending-export records are persisted. Defaults to
    /// `~/.chatloom/pending/`.
    #[serde(default)]
    pub session_dir: Option<PathBuf>,
}

impl AppConfig {
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("parsing config file {}", path.display()))
    }
}
