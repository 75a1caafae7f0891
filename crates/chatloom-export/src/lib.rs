//! # Chatloom Export
//!
//! Drives a multi-step export that must survive the host page being torn down
//! and rebuilt mid-operation.
//!
//! The orchestrator repeatedly clicks the host's own "load older history"
//! affordance (the earliest-loaded message), waits for the tree to stabilize,
//! and hands the fully-materialized turn set to an external renderer. Before
//! every click it persists a [`PendingExportState`] to a session-scoped
//! store; if the click reloads the page and kills the running script, the
//! next instance reads the record back, validates it against the current
//! location, and resumes with the attempt counter intact.
//!
//! ## Recovery flow
//!
//! ```text
//! run(request, None) ──► persist state ──► click ──► wait for stability
//!        ▲                                   │
//!        │                       page reload kills the instance
//!        │                                   ▼
//! run(request, Some(state)) ◄── take_pending() at next startup
//! ```

pub mod config;
pub mod error;
pub mod orchestrator;
pub mod renderer;
pub mod state;
pub mod store;

pub use config::OrchestratorConfig;
pub use error::ExportError;
pub use orchestrator::{ExportOrchestrator, ExportReport, ExportRequest};
pub use renderer::{ExportMetadata, ExportOptions, ExportRenderer, RenderError};
pub use state::{ExportFormat, PendingExportState, PendingStatus};
pub use store::{FileSessionStore, MemorySessionStore, SessionStore, StoreError};
