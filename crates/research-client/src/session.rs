//! Session-tagged progress updates and the state they drive.
//!
//! Every read loop stamps its messages with the [`SessionId`] it was started
//! for. [`SessionBoard`] only accepts messages from the session it currently
//! considers active, so an abandoned read loop can keep running without
//! touching the state of the session that replaced it.

use std::fmt;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::errors::StreamError;
use crate::metrics::MetricsSnapshot;
use crate::progress::{Phase, ProgressView, derive_progress};
use crate::stream::{CompletePayload, ProgressSnapshot, StreamEvent};
use crate::transport::read_event_stream;

/// Shown when a session completes without report text.
pub const EMPTY_REPORT_FALLBACK: &str = "Research completed but no report was generated.";

/// Identity of one submission-to-result interaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SessionId(uuid::Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// How a session's stream ended.
#[derive(Clone, Debug, PartialEq)]
pub enum SessionOutcome {
    /// A `complete` event arrived.
    Completed(CompletePayload),
    /// The stream ended without a terminal event.
    NoResult,
    /// Transport, protocol, or explicit `error` event.
    Failed(StreamError),
}

#[derive(Clone, Debug, PartialEq)]
pub enum SessionUpdate {
    /// An event delivered by the decoder, in arrival order.
    Event(StreamEvent),
    /// Always the last message of a session.
    Finished(SessionOutcome),
}

#[derive(Clone, Debug, PartialEq)]
pub struct SessionMessage {
    pub session_id: SessionId,
    pub update: SessionUpdate,
}

impl SessionMessage {
    pub fn event(session_id: SessionId, event: StreamEvent) -> Self {
        Self {
            session_id,
            update: SessionUpdate::Event(event),
        }
    }

    pub fn finished(session_id: SessionId, outcome: SessionOutcome) -> Self {
        Self {
            session_id,
            update: SessionUpdate::Finished(outcome),
        }
    }
}

/// Decodes `bytes` and forwards every event, then the outcome, tagged with `session_id`.
///
/// Send failures are ignored: a dropped receiver means nobody is listening
/// to this session anymore.
pub async fn forward_session<S, B, E>(
    session_id: SessionId,
    bytes: S,
    tx: &mpsc::UnboundedSender<SessionMessage>,
) -> SessionOutcome
where
    S: futures::Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: fmt::Display,
{
    let result = read_event_stream(bytes, |event| {
        let _ = tx.send(SessionMessage::event(session_id, event));
    })
    .await;
    let outcome = match result {
        Ok(Some(payload)) => SessionOutcome::Completed(payload),
        Ok(None) => SessionOutcome::NoResult,
        Err(err) => SessionOutcome::Failed(err),
    };
    debug!(session_id = %session_id, ?outcome, "session stream finished");
    let _ = tx.send(SessionMessage::finished(session_id, outcome.clone()));
    outcome
}

/// What [`SessionBoard::apply`] did with a message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ApplyResult {
    /// State changed.
    Applied,
    /// The message belongs to a session that is no longer active.
    Stale,
    /// The active session already has its terminal outcome.
    AfterTerminal,
    /// Valid message with no effect on state (repeated plan, unknown event type).
    Ignored,
}

/// State for the active session: latest snapshot, plan steps, and outcome.
#[derive(Debug, Default)]
pub struct SessionBoard {
    active: Option<SessionId>,
    snapshot: Option<ProgressSnapshot>,
    plan_steps: Option<Vec<String>>,
    furthest_phase: Option<Phase>,
    metrics: Option<MetricsSnapshot>,
    outcome: Option<SessionOutcome>,
}

impl SessionBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Discards everything from the previous session and activates a new one.
    pub fn begin(&mut self) -> SessionId {
        self.reset();
        let id = SessionId::new();
        self.active = Some(id);
        info!(session_id = %id, "session started");
        id
    }

    /// Returns to idle; messages from any earlier session become stale.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn apply(&mut self, message: SessionMessage) -> ApplyResult {
        if self.active != Some(message.session_id) {
            debug!(session_id = %message.session_id, "dropping message from inactive session");
            return ApplyResult::Stale;
        }
        if self.outcome.is_some() {
            debug!(session_id = %message.session_id, "dropping message after terminal outcome");
            return ApplyResult::AfterTerminal;
        }

        match message.update {
            SessionUpdate::Event(StreamEvent::Status(snapshot)) => {
                self.note_phase(&snapshot);
                self.snapshot = Some(snapshot);
                ApplyResult::Applied
            }
            SessionUpdate::Event(StreamEvent::Plan(plan)) => {
                if self.plan_steps.is_some() {
                    debug!(session_id = %message.session_id, "ignoring repeated plan event");
                    return ApplyResult::Ignored;
                }
                self.plan_steps = Some(plan.steps);
                ApplyResult::Applied
            }
            SessionUpdate::Event(StreamEvent::Complete(payload)) => {
                self.metrics = payload.metrics_snapshot();
                ApplyResult::Applied
            }
            SessionUpdate::Event(StreamEvent::Error(_) | StreamEvent::Other { .. }) => {
                ApplyResult::Ignored
            }
            SessionUpdate::Finished(outcome) => {
                match &outcome {
                    SessionOutcome::Completed(payload) => {
                        self.metrics = payload.metrics_snapshot();
                        info!(session_id = %message.session_id, "session completed");
                    }
                    SessionOutcome::NoResult => {
                        warn!(session_id = %message.session_id, "stream ended without a result");
                    }
                    SessionOutcome::Failed(err) => {
                        warn!(session_id = %message.session_id, error = %err, "session failed");
                    }
                }
                self.snapshot = None;
                self.outcome = Some(outcome);
                ApplyResult::Applied
            }
        }
    }

    fn note_phase(&mut self, snapshot: &ProgressSnapshot) {
        let Some(phase) = Phase::from_node(&snapshot.node) else {
            return;
        };
        match self.furthest_phase {
            Some(furthest) if phase < furthest => {
                warn!(
                    node = %snapshot.node,
                    furthest = %furthest,
                    "progress moved back to an earlier phase"
                );
            }
            _ => self.furthest_phase = Some(phase),
        }
    }

    pub fn active(&self) -> Option<SessionId> {
        self.active
    }

    /// Active and not yet finished.
    pub fn is_running(&self) -> bool {
        self.active.is_some() && self.outcome.is_none()
    }

    pub fn snapshot(&self) -> Option<&ProgressSnapshot> {
        self.snapshot.as_ref()
    }

    pub fn plan_steps(&self) -> &[String] {
        self.plan_steps.as_deref().unwrap_or_default()
    }

    /// Progress view while the session runs and has reported at least once.
    pub fn progress(&self) -> Option<ProgressView> {
        if !self.is_running() {
            return None;
        }
        self.snapshot
            .as_ref()
            .map(|snapshot| derive_progress(Some(snapshot), self.plan_steps()))
    }

    pub fn outcome(&self) -> Option<&SessionOutcome> {
        self.outcome.as_ref()
    }

    pub fn metrics(&self) -> Option<&MetricsSnapshot> {
        self.metrics.as_ref()
    }

    /// Report to display once the session ended without failing.
    pub fn report_text(&self) -> Option<&str> {
        match self.outcome.as_ref()? {
            SessionOutcome::Completed(payload) if !payload.report.trim().is_empty() => {
                Some(&payload.report)
            }
            SessionOutcome::Completed(_) | SessionOutcome::NoResult => Some(EMPTY_REPORT_FALLBACK),
            SessionOutcome::Failed(_) => None,
        }
    }

    /// Message to show in place of the progress/report view.
    pub fn error_message(&self) -> Option<&str> {
        match self.outcome.as_ref()? {
            SessionOutcome::Failed(err) => Some(err.message()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::Status;
    use crate::stream::PlanSteps;
    use futures::stream;

    fn status(node: &str, step_index: usize) -> StreamEvent {
        StreamEvent::Status(ProgressSnapshot {
            node: node.to_string(),
            step_index: Some(step_index),
            total_steps: Some(3),
            ..ProgressSnapshot::default()
        })
    }

    fn plan(steps: &[&str]) -> StreamEvent {
        StreamEvent::Plan(PlanSteps {
            steps: steps.iter().map(|s| s.to_string()).collect(),
        })
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<SessionMessage>) -> Vec<SessionMessage> {
        let mut out = Vec::new();
        while let Ok(message) = rx.try_recv() {
            out.push(message);
        }
        out
    }

    #[tokio::test]
    async fn forwards_events_then_outcome_with_session_tag() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let id = SessionId::new();
        let body = "event: status\ndata: {\"node\":\"plan\"}\n\nevent: complete\ndata: {\"report\":\"# R\"}\n\n";
        let outcome = forward_session(
            id,
            stream::iter(vec![Ok::<_, std::io::Error>(body.as_bytes().to_vec())]),
            &tx,
        )
        .await;

        let messages = drain(&mut rx);
        assert_eq!(messages.len(), 3);
        assert!(messages.iter().all(|m| m.session_id == id));
        assert!(matches!(messages[0].update, SessionUpdate::Event(StreamEvent::Status(_))));
        assert!(matches!(messages[1].update, SessionUpdate::Event(StreamEvent::Complete(_))));
        assert_eq!(messages[2].update, SessionUpdate::Finished(outcome.clone()));
        assert!(matches!(outcome, SessionOutcome::Completed(p) if p.report == "# R"));
    }

    #[tokio::test]
    async fn error_event_finishes_as_failed() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let id = SessionId::new();
        let body = "event: error\ndata: {\"message\":\"tool crashed\"}\n\n";
        let outcome = forward_session(
            id,
            stream::iter(vec![Ok::<_, std::io::Error>(body.as_bytes().to_vec())]),
            &tx,
        )
        .await;
        assert_eq!(outcome, SessionOutcome::Failed(StreamError::remote("tool crashed")));

        let mut board = SessionBoard::new();
        board.active = Some(id);
        for message in drain(&mut rx) {
            board.apply(message);
        }
        assert_eq!(board.error_message(), Some("tool crashed"));
        assert_eq!(board.report_text(), None);
    }

    #[test]
    fn snapshot_is_replaced_not_merged() {
        let mut board = SessionBoard::new();
        let id = board.begin();
        board.apply(SessionMessage::event(
            id,
            StreamEvent::Status(ProgressSnapshot {
                node: "act".into(),
                tool: Some("web_search".into()),
                ..ProgressSnapshot::default()
            }),
        ));
        board.apply(SessionMessage::event(
            id,
            StreamEvent::Status(ProgressSnapshot {
                node: "observe".into(),
                ..ProgressSnapshot::default()
            }),
        ));
        let snapshot = board.snapshot().expect("snapshot");
        assert_eq!(snapshot.node, "observe");
        assert_eq!(snapshot.tool, None);
    }

    #[test]
    fn stale_session_cannot_touch_new_session() {
        let mut board = SessionBoard::new();
        let old = board.begin();
        board.apply(SessionMessage::event(old, plan(&["a", "b"])));
        board.apply(SessionMessage::event(old, status("act", 1)));

        let new = board.begin();
        assert!(board.snapshot().is_none());
        assert!(board.plan_steps().is_empty());

        assert_eq!(
            board.apply(SessionMessage::event(old, status("reflect", 2))),
            ApplyResult::Stale
        );
        assert_eq!(
            board.apply(SessionMessage::finished(old, SessionOutcome::NoResult)),
            ApplyResult::Stale
        );
        assert!(board.is_running());

        assert_eq!(
            board.apply(SessionMessage::event(new, plan(&["x", "y", "z"]))),
            ApplyResult::Applied
        );
        assert_eq!(board.plan_steps(), ["x", "y", "z"]);
    }

    #[test]
    fn plan_is_set_once() {
        let mut board = SessionBoard::new();
        let id = board.begin();
        board.apply(SessionMessage::event(id, plan(&["search", "read", "summarize"])));
        assert_eq!(
            board.apply(SessionMessage::event(id, plan(&["other"]))),
            ApplyResult::Ignored
        );
        assert_eq!(board.plan_steps().len(), 3);
    }

    #[test]
    fn progress_tracks_latest_snapshot() {
        let mut board = SessionBoard::new();
        let id = board.begin();
        assert!(board.progress().is_none());
        board.apply(SessionMessage::event(id, plan(&["search", "read", "summarize"])));
        board.apply(SessionMessage::event(id, status("act", 1)));

        let view = board.progress().expect("progress");
        assert_eq!(view.step_statuses(), vec![Status::Done, Status::Active, Status::Pending]);

        board.apply(SessionMessage::event(id, status("write_report", 0)));
        let view = board.progress().expect("progress");
        assert!(view.steps.iter().all(|s| s.status == Status::Done));
    }

    #[test]
    fn regression_still_renders_latest() {
        let mut board = SessionBoard::new();
        let id = board.begin();
        board.apply(SessionMessage::event(id, status("reflect", 1)));
        assert_eq!(
            board.apply(SessionMessage::event(id, status("act", 1))),
            ApplyResult::Applied
        );
        assert_eq!(board.progress().expect("progress").current, Phase::Act);
        assert_eq!(board.furthest_phase, Some(Phase::Reflect));
    }

    #[test]
    fn only_first_terminal_outcome_counts() {
        let mut board = SessionBoard::new();
        let id = board.begin();
        board.apply(SessionMessage::event(id, status("write_report", 0)));
        board.apply(SessionMessage::finished(
            id,
            SessionOutcome::Completed(CompletePayload {
                report: String::new(),
                ..CompletePayload::default()
            }),
        ));
        assert!(!board.is_running());
        assert!(board.snapshot().is_none());
        assert!(board.progress().is_none());
        assert_eq!(board.report_text(), Some(EMPTY_REPORT_FALLBACK));

        assert_eq!(
            board.apply(SessionMessage::finished(
                id,
                SessionOutcome::Failed(StreamError::protocol("late"))
            )),
            ApplyResult::AfterTerminal
        );
        assert_eq!(board.error_message(), None);
    }
}
