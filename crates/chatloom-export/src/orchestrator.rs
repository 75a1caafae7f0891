//! The resumable export state machine.

use std::sync::Arc;

use chrono::Utc;
use tokio::time::{Instant, sleep};
use tracing::{debug, info, warn};
use uuid::Uuid;

use chatloom_capture::TurnCapture;
use chatloom_watch::{fingerprint, wait_for_change_or_timeout};

use crate::config::OrchestratorConfig;
use crate::error::ExportError;
use crate::renderer::{ExportMetadata, ExportOptions, ExportRenderer};
use crate::state::{PendingExportState, PendingStatus};
use crate::store::{SessionStore, StoreError};

/// What the caller wants exported.
#[derive(Debug, Clone)]
pub struct ExportRequest {
    pub format: crate::state::ExportFormat,
    pub font_size: Option<u32>,
    pub initial_selected_message_id: Option<String>,
    pub include_image_source: bool,
}

impl ExportRequest {
    pub fn new(format: crate::state::ExportFormat) -> Self {
        Self {
            format,
            font_size: None,
            initial_selected_message_id: None,
            include_image_source: false,
        }
    }
}

/// Summary of a finished export.
#[derive(Debug, Clone)]
pub struct ExportReport {
    pub turns_exported: usize,
    /// Load-more attempts performed across the whole operation, reloads
    /// included.
    pub attempts: u32,
    /// True when no conversation content matched at all. The export still
    /// ran; callers should warn the user instead of failing silently.
    pub degenerate: bool,
}

/// Drives one export operation: load all history, then hand off.
///
/// The state machine has a single in-flight state (clicking, with a bounded
/// attempt counter) and two terminal outcomes (exported, aborted). All of its
/// cross-reload state lives in the injected [`SessionStore`]; a fresh
/// instance picks up an interrupted operation via
/// [`take_pending`](ExportOrchestrator::take_pending) and passes the record
/// into [`run`](ExportOrchestrator::run) explicitly.
pub struct ExportOrchestrator {
    capture: Arc<TurnCapture>,
    store: Arc<dyn SessionStore>,
    renderer: Arc<dyn ExportRenderer>,
    config: OrchestratorConfig,
}

impl ExportOrchestrator {
    pub fn new(
        capture: Arc<TurnCapture>,
        store: Arc<dyn SessionStore>,
        renderer: Arc<dyn ExportRenderer>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            capture,
            store,
            renderer,
            config,
        }
    }

    /// Read the persisted pending record, exactly once per startup.
    ///
    /// The record is consumed from the store regardless of validity; a record
    /// pointing at a different location means the user navigated away and it
    /// is silently dropped.
    pub async fn take_pending(&self) -> Result<Option<PendingExportState>, StoreError> {
        let Some(state) = self.store.load().await? else {
            return Ok(None);
        };
        self.store.clear().await?;

        let current_url = self.capture.page().url();
        if !state.matches_location(&current_url) {
            debug!(
                pending_url = %state.url,
                %current_url,
                "discarding stale pending export state"
            );
            return Ok(None);
        }
        info!(attempt = state.attempt, "pending export state found; will resume");
        Ok(Some(state))
    }

    /// Run the export to completion, resuming from `resumed` when the caller
    /// recovered a pending record at startup.
    pub async fn run(
        &self,
        request: ExportRequest,
        resumed: Option<PendingExportState>,
    ) -> Result<ExportReport, ExportError> {
        let op = Uuid::new_v4();
        let page = self.capture.page();
        let mut attempt = resumed.as_ref().map(|s| s.attempt).unwrap_or(0);

        if resumed.is_some() {
            info!(%op, attempt, "resuming export after host reload");
            self.wait_for_reappearance().await;
        } else {
            info!(%op, format = %request.format, "starting export");
        }

        loop {
            let Some(earliest) = self.capture.earliest_message() else {
                // Conversation fits entirely in the initial render.
                debug!(%op, "no message nodes to expand; exporting directly");
                break;
            };

            if attempt >= self.config.max_attempts {
                warn!(%op, attempts = attempt, "load-more never converged; aborting export");
                // The abort must surface as such even when the cleanup
                // fails; a store error here is logged, not returned.
                if let Err(error) = self.store.clear().await {
                    warn!(%op, %error, "failed to clear pending state during abort");
                }
                return Err(ExportError::AttemptsExhausted { attempts: attempt });
            }
            attempt += 1;

            let scope = self.capture.conversation_scope();
            let union = self.capture.config().message_union();
            let baseline = page.read(|tree| {
                fingerprint(tree, scope, &union, self.config.stability.max_samples)
            });

            // Persist before the click: if the click reloads the page, this
            // record is all the next instance has.
            let state = PendingExportState {
                format: request.format,
                font_size: request.font_size,
                initial_selected_message_id: request.initial_selected_message_id.clone(),
                attempt,
                url: page.url(),
                status: PendingStatus::Clicking,
                timestamp: Utc::now(),
            };
            self.store.save(&state).await?;

            debug!(%op, attempt, earliest = %earliest, "clicking earliest message to load history");
            page.click(earliest);

            let verdict =
                wait_for_change_or_timeout(page, scope, &union, baseline, &self.config.stability)
                    .await;
            if verdict.changed {
                debug!(
                    %op,
                    attempt,
                    count = verdict.fingerprint.count,
                    "older history expanded in place; repeating"
                );
                continue;
            }
            break;
        }

        self.store.clear().await?;

        let turns = self.capture.capture_turns();
        let degenerate = turns.is_empty();
        if degenerate {
            warn!(%op, "no conversation content matched; export will be empty");
        }

        let metadata = ExportMetadata {
            url: page.url(),
            exported_at: Utc::now(),
            count: turns.len(),
            title: page.title(),
        };
        let options = ExportOptions {
            format: request.format,
            font_size: request.font_size,
            include_image_source: request.include_image_source,
        };
        self.renderer.render(&turns, &metadata, &options).await?;

        info!(%op, turns = turns.len(), attempts = attempt, "export handed off to renderer");
        Ok(ExportReport {
            turns_exported: turns.len(),
            attempts: attempt,
            degenerate,
        })
    }

    /// After a reload the host needs time to re-render; wait (bounded) until
    /// at least one message node matches again.
    async fn wait_for_reappearance(&self) {
        let deadline = Instant::now() + self.config.reappear_timeout();
        loop {
            if self.capture.earliest_message().is_some() {
                return;
            }
            if Instant::now() >= deadline {
                warn!("host did not re-render message nodes in time; proceeding anyway");
                return;
            }
            sleep(self.config.reappear_poll()).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::{MockExportRenderer, RenderError};
    use crate::state::ExportFormat;
    use crate::store::MemorySessionStore;
    use async_trait::async_trait;
    use chatloom_capture::{CaptureConfig, Turn};
    use chatloom_dom::{DocumentTree, HostEvent, NodeData, PageHandle};
    use chatloom_watch::StabilityOptions;
    use std::sync::Mutex;

    const URL: &str = "https://chat.example/app/abc";

    fn conversation_page(pairs: &[(&str, &str)]) -> PageHandle {
        let mut tree = DocumentTree::new(NodeData::new("body"));
        let root = tree.root();
        let main = tree
            .append_child(root, NodeData::new("main").with_class("chat-scroll-region"))
            .unwrap();
        for (user, assistant) in pairs {
            tree.append_child(
                main,
                NodeData::new("article")
                    .with_attr("data-role", "user")
                    .with_text(*user),
            )
            .unwrap();
            tree.append_child(
                main,
                NodeData::new("article")
                    .with_attr("data-role", "assistant")
                    .with_text(*assistant),
            )
            .unwrap();
        }
        PageHandle::new(URL, "Test conversation", tree)
    }

    fn quick_config(max_attempts: u32) -> OrchestratorConfig {
        OrchestratorConfig {
            max_attempts,
            stability: StabilityOptions {
                timeout_ms: 600,
                idle_ms: 100,
                min_wait_ms: 100,
                poll_interval_ms: 50,
                max_samples: 10,
            },
            reappear_timeout_ms: 500,
            reappear_poll_ms: 50,
        }
    }

    struct RecordingRenderer {
        calls: Mutex<Vec<(Vec<Turn>, ExportMetadata)>>,
    }

    impl RecordingRenderer {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                calls: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> Vec<(Vec<Turn>, ExportMetadata)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ExportRenderer for RecordingRenderer {
        async fn render(
            &self,
            turns: &[Turn],
            metadata: &ExportMetadata,
            _options: &ExportOptions,
        ) -> Result<(), RenderError> {
            self.calls
                .lock()
                .unwrap()
                .push((turns.to_vec(), metadata.clone()));
            Ok(())
        }
    }

    /// Consume host clicks, expanding history `expansions` times by
    /// prepending one older turn pair per click.
    fn spawn_host(page: &PageHandle, expansions: u32) {
        let mut events = page.take_host_events().expect("host events already taken");
        let mutator = page.clone();
        tokio::spawn(async move {
            let mut done = 0u32;
            while let Some(HostEvent::Click { .. }) = events.recv().await {
                if done >= expansions {
                    continue;
                }
                done += 1;
                let n = done;
                mutator.mutate(|tree| {
                    let root = tree.root();
                    let main = tree.children(root)[0];
                    tree.prepend_child(
                        main,
                        NodeData::new("article")
                            .with_attr("data-role", "assistant")
                            .with_text(format!("older answer {n}")),
                    )
                    .unwrap();
                    tree.prepend_child(
                        main,
                        NodeData::new("article")
                            .with_attr("data-role", "user")
                            .with_text(format!("older question {n}")),
                    )
                    .unwrap();
                });
            }
        });
    }

    fn orchestrator(
        page: &PageHandle,
        store: Arc<dyn SessionStore>,
        renderer: Arc<dyn ExportRenderer>,
        config: OrchestratorConfig,
    ) -> ExportOrchestrator {
        let capture =
            Arc::new(TurnCapture::new(page.clone(), CaptureConfig::default()).unwrap());
        ExportOrchestrator::new(capture, store, renderer, config)
    }

    fn pending(attempt: u32, url: &str) -> PendingExportState {
        PendingExportState {
            format: ExportFormat::Json,
            font_size: None,
            initial_selected_message_id: None,
            attempt,
            url: url.to_string(),
            status: PendingStatus::Clicking,
            timestamp: Utc::now(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_static_conversation_exports_after_one_attempt() {
        let page = conversation_page(&[("q1", "a1"), ("q2", "a2")]);
        spawn_host(&page, 0);
        let store = Arc::new(MemorySessionStore::new());
        let renderer = RecordingRenderer::new();
        let orch = orchestrator(&page, store.clone(), renderer.clone(), quick_config(25));

        let report = orch
            .run(ExportRequest::new(ExportFormat::Json), None)
            .await
            .unwrap();

        assert_eq!(report.turns_exported, 2);
        assert_eq!(report.attempts, 1);
        assert!(!report.degenerate);
        assert!(store.load().await.unwrap().is_none());

        let calls = renderer.calls();
        assert_eq!(calls.len(), 1);
        let (turns, metadata) = &calls[0];
        assert_eq!(turns[0].user, "q1");
        assert_eq!(metadata.count, 2);
        assert_eq!(metadata.url, URL);
        assert_eq!(metadata.title, "Test conversation");
    }

    #[tokio::test(start_paused = true)]
    async fn test_soft_expansion_loops_until_stable() {
        let page = conversation_page(&[("q1", "a1")]);
        spawn_host(&page, 2);
        let store = Arc::new(MemorySessionStore::new());
        let renderer = RecordingRenderer::new();
        let orch = orchestrator(&page, store.clone(), renderer.clone(), quick_config(25));

        let report = orch
            .run(ExportRequest::new(ExportFormat::Markdown), None)
            .await
            .unwrap();

        // Two in-place expansions plus the final stable attempt.
        assert_eq!(report.attempts, 3);
        assert_eq!(report.turns_exported, 3);

        let calls = renderer.calls();
        let (turns, _) = &calls[0];
        // Oldest history first after expansion.
        assert_eq!(turns[0].user, "older question 2");
        assert_eq!(turns[1].user, "older question 1");
        assert_eq!(turns[2].user, "q1");
        assert_eq!(turns[2].assistant, "a1");
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_messages_skips_load_more() {
        let page = conversation_page(&[]);
        spawn_host(&page, 0);
        let store = Arc::new(MemorySessionStore::new());
        let renderer = RecordingRenderer::new();
        let orch = orchestrator(&page, store.clone(), renderer.clone(), quick_config(25));

        let report = orch
            .run(ExportRequest::new(ExportFormat::Json), None)
            .await
            .unwrap();

        assert_eq!(report.attempts, 0);
        assert_eq!(report.turns_exported, 0);
        assert!(report.degenerate);
        // Renderer still gets the (empty) hand-off.
        assert_eq!(renderer.calls().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_attempt_ceiling_aborts_without_rendering() {
        let page = conversation_page(&[("q1", "a1")]);
        // Expands on every click, far past the ceiling.
        spawn_host(&page, u32::MAX);
        let store = Arc::new(MemorySessionStore::new());
        let mut mock = MockExportRenderer::new();
        mock.expect_render().times(0);
        let orch = orchestrator(&page, store.clone(), Arc::new(mock), quick_config(25));

        let err = orch
            .run(ExportRequest::new(ExportFormat::Pdf), None)
            .await
            .unwrap_err();

        match err {
            ExportError::AttemptsExhausted { attempts } => assert_eq!(attempts, 25),
            other => panic!("unexpected error: {other}"),
        }
        // State cleared so future page loads cannot resume a doomed run.
        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_take_pending_resumes_matching_url() {
        let page = conversation_page(&[("q1", "a1")]);
        spawn_host(&page, 0);
        let store = Arc::new(MemorySessionStore::new());
        store.save(&pending(3, URL)).await.unwrap();
        let renderer = RecordingRenderer::new();
        let orch = orchestrator(&page, store.clone(), renderer.clone(), quick_config(25));

        let resumed = orch.take_pending().await.unwrap();
        assert_eq!(resumed.as_ref().map(|s| s.attempt), Some(3));
        // Consumed on read.
        assert!(store.load().await.unwrap().is_none());

        let report = orch
            .run(ExportRequest::new(ExportFormat::Json), resumed)
            .await
            .unwrap();
        // Continues from attempt 4, not from scratch.
        assert_eq!(report.attempts, 4);
        assert_eq!(report.turns_exported, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_take_pending_discards_foreign_url() {
        let page = conversation_page(&[("q1", "a1")]);
        let store = Arc::new(MemorySessionStore::new());
        store
            .save(&pending(3, "https://chat.example/app/other"))
            .await
            .unwrap();
        let renderer = RecordingRenderer::new();
        let orch = orchestrator(&page, store.clone(), renderer, quick_config(25));

        assert!(orch.take_pending().await.unwrap().is_none());
        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_resume_waits_for_host_to_rerender() {
        // After a reload the host re-renders asynchronously; the resumed run
        // must hold off until message nodes match again, then continue.
        let page = conversation_page(&[]);
        spawn_host(&page, 0);
        let mutator = page.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(300)).await;
            mutator.mutate(|tree| {
                let root = tree.root();
                let main = tree.children(root)[0];
                tree.append_child(
                    main,
                    NodeData::new("article")
                        .with_attr("data-role", "user")
                        .with_text("q1"),
                )
                .unwrap();
                tree.append_child(
                    main,
                    NodeData::new("article")
                        .with_attr("data-role", "assistant")
                        .with_text("a1"),
                )
                .unwrap();
            });
        });
        let store = Arc::new(MemorySessionStore::new());
        let renderer = RecordingRenderer::new();
        let orch = orchestrator(&page, store.clone(), renderer.clone(), quick_config(25));

        let started = tokio::time::Instant::now();
        let report = orch
            .run(ExportRequest::new(ExportFormat::Json), Some(pending(1, URL)))
            .await
            .unwrap();

        // Waited out the re-render before the next click.
        assert!(started.elapsed() >= std::time::Duration::from_millis(300));
        assert_eq!(report.attempts, 2);
        assert_eq!(report.turns_exported, 1);
        assert!(!report.degenerate);
    }

    #[tokio::test(start_paused = true)]
    async fn test_resume_times_out_when_nodes_never_reappear() {
        // Host never re-renders matching nodes; the resumed run proceeds
        // after the reappearance timeout and exports what it finds (nothing).
        let page = conversation_page(&[]);
        spawn_host(&page, 0);
        let store = Arc::new(MemorySessionStore::new());
        let renderer = RecordingRenderer::new();
        let config = quick_config(25);
        let reappear_timeout = config.reappear_timeout();
        let orch = orchestrator(&page, store.clone(), renderer.clone(), config);

        let started = tokio::time::Instant::now();
        let report = orch
            .run(ExportRequest::new(ExportFormat::Json), Some(pending(2, URL)))
            .await
            .unwrap();

        assert!(started.elapsed() >= reappear_timeout);
        assert_eq!(report.attempts, 2);
        assert_eq!(report.turns_exported, 0);
        assert!(report.degenerate);
        assert_eq!(renderer.calls().len(), 1);
        assert!(store.load().await.unwrap().is_none());
    }

    struct ClearFailsStore {
        inner: MemorySessionStore,
    }

    #[async_trait]
    impl SessionStore for ClearFailsStore {
        async fn load(&self) -> Result<Option<PendingExportState>, StoreError> {
            self.inner.load().await
        }

        async fn save(&self, state: &PendingExportState) -> Result<(), StoreError> {
            self.inner.save(state).await
        }

        async fn clear(&self) -> Result<(), StoreError> {
            Err(std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only").into())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_ceiling_abort_survives_failing_clear() {
        let page = conversation_page(&[("q1", "a1")]);
        spawn_host(&page, u32::MAX);
        let store = Arc::new(ClearFailsStore {
            inner: MemorySessionStore::new(),
        });
        let mut mock = MockExportRenderer::new();
        mock.expect_render().times(0);
        let orch = orchestrator(&page, store, Arc::new(mock), quick_config(3));

        let err = orch
            .run(ExportRequest::new(ExportFormat::Json), None)
            .await
            .unwrap_err();

        // The abort is the error; the failed cleanup must not mask it.
        match err {
            ExportError::AttemptsExhausted { attempts } => assert_eq!(attempts, 3),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_hard_reload_mid_operation_resumes() {
        // First instance: the click tears the page down before any verdict.
        let page = conversation_page(&[("q1", "a1")]);
        let mut events = page.take_host_events().unwrap();
        let store: Arc<MemorySessionStore> = Arc::new(MemorySessionStore::new());
        let renderer = RecordingRenderer::new();
        let orch = orchestrator(&page, store.clone(), renderer.clone(), quick_config(25));

        let run = tokio::spawn(async move {
            orch.run(ExportRequest::new(ExportFormat::Json), None).await
        });
        // The reload kills the script instance mid-wait.
        assert!(matches!(events.recv().await, Some(HostEvent::Click { .. })));
        run.abort();
        assert!(run.await.unwrap_err().is_cancelled());

        // The record written before the click survived the teardown.
        let persisted = store.load().await.unwrap().unwrap();
        assert_eq!(persisted.attempt, 1);
        assert_eq!(persisted.status, PendingStatus::Clicking);

        // Fresh instance on the re-rendered page, now with full history.
        let reloaded = conversation_page(&[("q0", "a0"), ("q1", "a1")]);
        spawn_host(&reloaded, 0);
        let orch2 = orchestrator(&reloaded, store.clone(), renderer.clone(), quick_config(25));

        let resumed = orch2.take_pending().await.unwrap();
        assert!(resumed.is_some());
        let report = orch2
            .run(ExportRequest::new(ExportFormat::Json), resumed)
            .await
            .unwrap();

        assert_eq!(report.attempts, 2);
        assert_eq!(report.turns_exported, 2);
        assert!(store.load().await.unwrap().is_none());
    }
}
