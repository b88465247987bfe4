//! Client for the streaming research agent service.
//!
//! A research question is posted once; the service answers with a
//! server-sent event stream of progress snapshots, a plan, and a terminal
//! `complete` or `error` event. This crate decodes that stream, derives a
//! phase/step progress view from it, and renders mermaid diagrams found in
//! the final report one at a time.
//!
//! # Streaming a session
//!
//! ```no_run
//! use research_client::prelude::*;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), ClientError> {
//! let client = ResearchClient::from_env()?;
//! let mut board = SessionBoard::new();
//! let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
//!
//! let session_id = board.begin();
//! client.start_session(ResearchRequest::new("What is RAG?"), session_id, tx)?;
//!
//! while let Some(message) = rx.recv().await {
//!     board.apply(message);
//!     if let Some(view) = board.progress() {
//!         println!("{}", view.current);
//!     }
//!     if !board.is_running() {
//!         break;
//!     }
//! }
//! println!("{}", board.report_text().unwrap_or_default());
//! # Ok(())
//! # }
//! ```

/// HTTP client, request types, and session handles.
pub mod client;
/// Service and diagram tool configuration.
pub mod config;
/// Chart sanitizing and the serialized render queue.
pub mod diagram;
/// Public error types.
pub mod errors;
/// Past run listing and lookup types.
pub mod history;
/// Run metrics attached to completed sessions.
pub mod metrics;
/// Tracing subscriber setup.
pub mod observability;
/// Common imports for typical usage.
pub mod prelude;
/// Phase pipeline and plan-step view.
pub mod progress;
/// Report text helpers.
pub mod report;
/// Session-tagged messages and the active-session board.
pub mod session;
/// Typed stream events and payloads.
pub mod stream;
/// Event stream framing and decoding.
pub mod transport;

pub use client::{AbortHandle, Audience, Document, ResearchClient, ResearchRequest, ResearchRun};
pub use config::{ClientConfig, MmdcConfig};
pub use diagram::{DiagramEngine, DiagramOutcome, MmdcEngine, RenderOutput, RenderQueue, render_diagram};
pub use errors::{ClientError, RenderError, StreamError};
pub use history::{RunRecord, RunSummary};
pub use metrics::MetricsSnapshot;
pub use observability::{LogSettings, LogSink, init_observability};
pub use progress::{Phase, ProgressView, Status, derive_progress};
pub use session::{
    ApplyResult, SessionBoard, SessionId, SessionMessage, SessionOutcome, SessionUpdate,
};
pub use stream::{CompletePayload, PlanSteps, ProgressSnapshot, StreamEvent};
pub use transport::read_event_stream;
