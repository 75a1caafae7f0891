//! Orchestrator configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use chatloom_watch::StabilityOptions;

/// Knobs for the load-more/export loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Ceiling on load-more attempts before the operation aborts. Bounds the
    /// loop against hosts whose affordance never terminates.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Stability wait applied after every click.
    #[serde(default)]
    pub stability: StabilityOptions,

    /// How long a resumed operation waits for message nodes to reappear
    /// while the host finishes re-rendering after a reload.
    #[serde(default = "default_reappear_timeout_ms")]
    pub reappear_timeout_ms: u64,

    /// Poll cadence for the reappearance wait.
    #[serde(default = "default_reappear_poll_ms")]
    pub reappear_poll_ms: u64,
}

fn default_max_attempts() -> u32 {
    25
}

fn default_reappear_timeout_ms() -> u64 {
    10_000
}

fn default_reappear_poll_ms() -> u64 {
    200
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            stability: StabilityOptions::default(),
            reappear_timeout_ms: default_reappear_timeout_ms(),
            reappear_poll_ms: default_reappear_poll_ms(),
        }
    }
}

impl OrchestratorConfig {
    pub fn reappear_timeout(&self) -> Duration {
        Duration::from_millis(self.reappear_timeout_ms)
    }

    pub fn reappear_poll(&self) -> Duration {
        Duration::from_millis(self.reappear_poll_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = OrchestratorConfig::default();
        assert_eq!(config.max_attempts, 25);
        assert_eq!(config.reappear_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_partial_deserialization_fills_defaults() {
        let config: OrchestratorConfig = serde_json::from_str(r#"{"max_attempts": 3}"#).unwrap();
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.reappear_poll(), Duration::from_millis(200));
    }
}
