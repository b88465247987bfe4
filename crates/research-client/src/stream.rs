use serde::{Deserialize, Deserializer, Serialize};

use crate::metrics::MetricsSnapshot;

/// Reads `null` as the type's default instead of failing.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Latest `status` payload. Each new one replaces the previous wholesale.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressSnapshot {
    /// Graph node the service just finished (`plan`, `act`, ..., `write_report`).
    /// Empty when absent or `null`, which reads as the plan phase.
    #[serde(deserialize_with = "null_as_default")]
    pub node: String,
    pub iteration: Option<u32>,
    pub step_index: Option<usize>,
    pub total_steps: Option<usize>,
    pub tool: Option<String>,
    pub evidence_count: Option<u32>,
    /// Confidence in `[0, 1]`.
    pub confidence: Option<f64>,
}

/// Payload of the `plan` event.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanSteps {
    #[serde(default, deserialize_with = "null_as_default")]
    pub steps: Vec<String>,
}

/// Payload of the terminal `complete` event.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CompletePayload {
    #[serde(default, deserialize_with = "null_as_default")]
    pub report: String,
    /// Passed through as sent; see [`CompletePayload::metrics_snapshot`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evidence_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iterations: Option<u32>,
}

impl CompletePayload {
    /// Metrics in display form, or `None` when absent or not in a usable shape.
    pub fn metrics_snapshot(&self) -> Option<MetricsSnapshot> {
        self.metrics.as_ref().and_then(MetricsSnapshot::from_value)
    }
}

/// Payload of the terminal `error` event.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    #[serde(default)]
    pub message: Option<String>,
}

/// One decoded application event, in stream arrival order.
#[derive(Clone, Debug, PartialEq)]
pub enum StreamEvent {
    /// Progress update.
    Status(ProgressSnapshot),
    /// Research plan, sent once after planning.
    Plan(PlanSteps),
    /// Terminal success.
    Complete(CompletePayload),
    /// Terminal failure reported by the service.
    Error(ErrorPayload),
    /// Any other event type, passed through untouched.
    Other {
        event: String,
        data: serde_json::Value,
    },
}

impl StreamEvent {
    /// Wire name of the event type.
    pub fn kind(&self) -> &str {
        match self {
            Self::Status(_) => "status",
            Self::Plan(_) => "plan",
            Self::Complete(_) => "complete",
            Self::Error(_) => "error",
            Self::Other { event, .. } => event,
        }
    }

    /// Builds a typed event from a wire type and its JSON payload.
    pub fn from_parts(event: &str, data: serde_json::Value) -> Result<Self, serde_json::Error> {
        Ok(match event {
            "status" => Self::Status(serde_json::from_value(data)?),
            "plan" => Self::Plan(serde_json::from_value(data)?),
            "complete" => Self::Complete(serde_json::from_value(data)?),
            // A malformed error payload still terminates the stream with the default message.
            "error" => Self::Error(serde_json::from_value(data).unwrap_or_default()),
            other => Self::Other {
                event: other.to_string(),
                data,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_payload_tolerates_missing_and_extra_fields() {
        let event = StreamEvent::from_parts(
            "status",
            serde_json::json!({"node": "act", "step_index": 1, "status": "running"}),
        )
        .expect("status");
        let StreamEvent::Status(snapshot) = event else {
            panic!("expected status");
        };
        assert_eq!(snapshot.node, "act");
        assert_eq!(snapshot.step_index, Some(1));
        assert_eq!(snapshot.total_steps, None);
    }

    #[test]
    fn unknown_event_keeps_its_name() {
        let event = StreamEvent::from_parts("heartbeat", serde_json::json!({"n": 1})).expect("other");
        assert_eq!(event.kind(), "heartbeat");
    }

    #[test]
    fn null_node_reads_as_empty() {
        let event = StreamEvent::from_parts("status", serde_json::json!({"node": null, "iteration": null}))
            .expect("status");
        assert_eq!(event, StreamEvent::Status(ProgressSnapshot::default()));
    }

    #[test]
    fn complete_keeps_report_when_metrics_do_not_fit() {
        let event = StreamEvent::from_parts(
            "complete",
            serde_json::json!({"report": "# R", "metrics": {"total_llm_calls": "many"}}),
        )
        .expect("complete");
        let StreamEvent::Complete(payload) = event else {
            panic!("expected complete");
        };
        assert_eq!(payload.report, "# R");
        assert!(payload.metrics.is_some());
        assert_eq!(payload.metrics_snapshot(), None);
    }

    #[test]
    fn mistyped_status_field_is_rejected() {
        let result = StreamEvent::from_parts("status", serde_json::json!({"node": 7}));
        assert!(result.is_err());
    }
}
