use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::stream::null_as_default;

/// One LLM invocation recorded by the service.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmCallMetric {
    #[serde(deserialize_with = "null_as_default")]
    pub node: String,
    pub prompt_tokens: Option<u64>,
    pub completion_tokens: Option<u64>,
    pub duration_ms: Option<f64>,
}

/// One tool invocation recorded by the service.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolCallMetric {
    #[serde(deserialize_with = "null_as_default")]
    pub tool_name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub query: String,
    pub duration_ms: Option<f64>,
    #[serde(deserialize_with = "null_as_default")]
    pub success: bool,
}

/// Wall-clock time spent in one graph node.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeTiming {
    #[serde(deserialize_with = "null_as_default")]
    pub node: String,
    pub duration_ms: Option<f64>,
}

/// Run metrics attached to a completed session.
///
/// Opaque to the client beyond display; unknown fields are ignored and
/// `null` reads as empty.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsSnapshot {
    #[serde(deserialize_with = "null_as_default")]
    pub total_llm_calls: u64,
    pub total_prompt_tokens: Option<u64>,
    pub total_completion_tokens: Option<u64>,
    pub total_llm_time_ms: Option<f64>,
    pub total_tool_time_ms: Option<f64>,
    pub total_research_time_ms: Option<f64>,
    #[serde(deserialize_with = "null_as_default")]
    pub llm_calls: Vec<LlmCallMetric>,
    #[serde(deserialize_with = "null_as_default")]
    pub tool_calls: Vec<ToolCallMetric>,
    #[serde(deserialize_with = "null_as_default")]
    pub node_timings: Vec<NodeTiming>,
}

impl MetricsSnapshot {
    /// Converts the pass-through JSON; `None` when it does not fit this shape.
    pub fn from_value(value: &serde_json::Value) -> Option<Self> {
        match serde_json::from_value(value.clone()) {
            Ok(metrics) => Some(metrics),
            Err(e) => {
                debug!(error = %e, "metrics payload not displayable");
                None
            }
        }
    }

    /// Whether there is anything worth showing.
    pub fn has_data(&self) -> bool {
        self.total_llm_calls > 0 || !self.llm_calls.is_empty()
    }

    /// One-line summary: calls, tokens in/out, LLM time, tool time, total time.
    pub fn summary(&self) -> String {
        format!(
            "LLM Calls: {}  Tokens: {} in / {} out  LLM Time: {}  Tool Time: {}  Total: {}",
            self.total_llm_calls,
            format_tokens(self.total_prompt_tokens),
            format_tokens(self.total_completion_tokens),
            format_duration_ms(self.total_llm_time_ms),
            format_duration_ms(self.total_tool_time_ms),
            format_duration_ms(self.total_research_time_ms),
        )
    }
}

/// `-` when unknown, whole milliseconds below one second, tenths of seconds above.
pub fn format_duration_ms(ms: Option<f64>) -> String {
    match ms {
        None => "-".to_string(),
        Some(ms) if ms < 1000.0 => format!("{}ms", ms.round() as i64),
        Some(ms) => format!("{:.1}s", ms / 1000.0),
    }
}

/// `-` when unknown, `1.2k` style from a thousand upwards.
pub fn format_tokens(tokens: Option<u64>) -> String {
    match tokens {
        None => "-".to_string(),
        Some(n) if n >= 1000 => format!("{:.1}k", n as f64 / 1000.0),
        Some(n) => n.to_string(),
    }
}
