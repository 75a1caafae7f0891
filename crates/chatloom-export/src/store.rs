//! Session-scoped storage for the pending-export record.

use std::path::PathBuf;

use async_trait::async_trait;
use tokio::fs;
use tracing::{debug, warn};

use thiserror::Error;

use crate::state::PendingExportState;

/// Store failures. Malformed content is not among them: a record that does
/// not parse is treated as "nothing pending", never as an error.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Session-scoped key/value binding holding at most one pending-export
/// record. Survives a full page reload, cleared when the session ends.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Read the pending record, if any. Malformed records are discarded and
    /// reported as `None`.
    async fn load(&self) -> Result<Option<PendingExportState>, StoreError>;

    /// Persist the record, replacing any previous one.
    async fn save(&self, state: &PendingExportState) -> Result<(), StoreError>;

    /// Remove the record.
    async fn clear(&self) -> Result<(), StoreError>;
}

/// In-memory store for tests and single-process embedding.
pub struct MemorySessionStore {
    state: tokio::sync::RwLock<Option<PendingExportState>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self {
            state: tokio::sync::RwLock::new(None),
        }
    }
}

impl Default for MemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn load(&self) -> Result<Option<PendingExportState>, StoreError> {
        Ok(self.state.read().await.clone())
    }

    async fn save(&self, state: &PendingExportState) -> Result<(), StoreError> {
        *self.state.write().await = Some(state.clone());
        Ok(())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        *self.state.write().await = None;
        Ok(())
    }
}

/// File-backed store: one JSON file per session, the durable stand-in for a
/// browser's session storage when the pipeline runs out of process.
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    /// Open (creating parent directories) a store at `path`.
    pub async fn new(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        debug!(path = %path.display(), "FileSessionStore initialized");
        Ok(Self { path })
    }

    /// Conventional default location under the user's home directory.
    pub fn default_path(session_id: &str) -> PathBuf {
        let sanitized: String = session_id
            .chars()
            .map(|c| {
                if c.is_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        dirs::home_dir()
            .map(|h| h.join(".chatloom").join("pending"))
            .unwrap_or_else(|| PathBuf::from("/tmp/chatloom/pending"))
            .join(format!("{sanitized}.json"))
    }
}

#[async_trait]
impl SessionStore for FileSessionStore {
    async fn load(&self) -> Result<Option<PendingExportState>, StoreError> {
        let content = match fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        match serde_json::from_str(&content) {
            Ok(state) => Ok(Some(state)),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "discarding malformed pending record");
                Ok(None)
            }
        }
    }

    async fn save(&self, state: &PendingExportState) -> Result<(), StoreError> {
        let content = serde_json::to_string_pretty(state)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        fs::write(&self.path, content).await?;
        debug!(attempt = state.attempt, "pending export state saved");
        Ok(())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        match fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{ExportFormat, PendingStatus};
    use chrono::Utc;
    use tempfile::TempDir;

    fn sample_state(attempt: u32) -> PendingExportState {
        PendingExportState {
            format: ExportFormat::Json,
            font_size: None,
            initial_selected_message_id: None,
            attempt,
            url: "https://chat.example/app/abc".to_string(),
            status: PendingStatus::Clicking,
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_memory_store_save_load_clear() {
        let store = MemorySessionStore::new();
        assert!(store.load().await.unwrap().is_none());

        store.save(&sample_state(2)).await.unwrap();
        assert_eq!(store.load().await.unwrap().unwrap().attempt, 2);

        store.save(&sample_state(3)).await.unwrap();
        assert_eq!(store.load().await.unwrap().unwrap().attempt, 3);

        store.clear().await.unwrap();
        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_file_store_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("pending.json");

        let store = FileSessionStore::new(&path).await.unwrap();
        store.save(&sample_state(5)).await.unwrap();
        drop(store);

        // A fresh instance (fresh "script" after reload) sees the record.
        let reopened = FileSessionStore::new(&path).await.unwrap();
        let state = reopened.load().await.unwrap().unwrap();
        assert_eq!(state.attempt, 5);

        reopened.clear().await.unwrap();
        assert!(reopened.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_file_store_discards_malformed_record() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("pending.json");
        tokio::fs::write(&path, "{not json").await.unwrap();

        let store = FileSessionStore::new(&path).await.unwrap();
        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_file_store_clear_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let store = FileSessionStore::new(dir.path().join("pending.json"))
            .await
            .unwrap();
        store.clear().await.unwrap();
        store.clear().await.unwrap();
    }
}
