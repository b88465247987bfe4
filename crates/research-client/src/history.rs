use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::metrics::MetricsSnapshot;
use crate::stream::null_as_default;

const QUESTION_PREVIEW_CHARS: usize = 80;

/// Entry in the run history listing, newest first.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub question: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub created_at: String,
}

impl RunSummary {
    /// Question truncated to 80 characters with a trailing `...`.
    pub fn short_question(&self) -> String {
        if self.question.chars().count() > QUESTION_PREVIEW_CHARS {
            let head: String = self.question.chars().take(QUESTION_PREVIEW_CHARS).collect();
            format!("{head}...")
        } else {
            self.question.clone()
        }
    }
}

/// A stored run fetched by id.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunRecord {
    pub run_id: String,
    #[serde(deserialize_with = "null_as_default")]
    pub question: String,
    #[serde(deserialize_with = "null_as_default")]
    pub report: String,
    pub audience: Option<String>,
    pub created_at: Option<String>,
    pub evidence_count: Option<u32>,
    pub iterations: Option<u32>,
    /// Passed through as stored; see [`RunRecord::metrics_snapshot`].
    pub metrics: Option<serde_json::Value>,
}

impl RunRecord {
    pub fn metrics_snapshot(&self) -> Option<MetricsSnapshot> {
        self.metrics.as_ref().and_then(MetricsSnapshot::from_value)
    }
}

const UNITS: [(&str, i64); 6] = [
    ("second", 60),
    ("minute", 3_600),
    ("hour", 86_400),
    ("day", 2_592_000),
    ("month", 31_536_000),
    ("year", i64::MAX),
];

/// Relative age of an RFC 3339 timestamp (`just now`, `5 minutes ago`, ...).
///
/// Returns an empty string for missing or unparsable timestamps.
pub fn format_relative_time(created_at: &str, now: DateTime<Utc>) -> String {
    let Ok(created) = DateTime::parse_from_rfc3339(created_at.trim()) else {
        return String::new();
    };
    let diff = (now - created.with_timezone(&Utc)).num_seconds();
    if diff < 10 {
        return "just now".to_string();
    }
    let mut divisor = 1;
    for (label, limit) in UNITS {
        if diff < limit {
            let n = (diff as f64 / divisor as f64).round() as i64;
            let plural = if n == 1 { "" } else { "s" };
            return format!("{n} {label}{plural} ago");
        }
        divisor = limit;
    }
    String::new()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone as _;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).single().expect("valid date")
    }

    #[test]
    fn relative_times() {
        assert_eq!(format_relative_time("2026-03-01T11:59:55+00:00", now()), "just now");
        assert_eq!(format_relative_time("2026-03-01T11:59:30+00:00", now()), "30 seconds ago");
        assert_eq!(format_relative_time("2026-03-01T11:55:00.123456+00:00", now()), "5 minutes ago");
        assert_eq!(format_relative_time("2026-03-01T11:00:00Z", now()), "1 hour ago");
        assert_eq!(format_relative_time("2026-02-27T12:00:00+00:00", now()), "2 days ago");
        assert_eq!(format_relative_time("", now()), "");
    }

    #[test]
    fn long_questions_are_truncated() {
        let summary = RunSummary {
            run_id: "a1".into(),
            question: "é".repeat(81),
            created_at: String::new(),
        };
        assert_eq!(summary.short_question().chars().count(), 83);
    }

    #[test]
    fn record_tolerates_missing_fields() {
        let record: RunRecord =
            serde_json::from_value(serde_json::json!({"run_id": "a1", "report": "# R"}))
                .expect("record");
        assert_eq!(record.report, "# R");
        assert!(record.metrics_snapshot().is_none());

        let record: RunRecord = serde_json::from_value(serde_json::json!({
            "run_id": "a2",
            "question": null,
            "report": "# R",
            "metrics": {"total_llm_calls": 2, "llm_calls": [{"node": null}]}
        }))
        .expect("record with nulls");
        assert_eq!(record.question, "");
        assert_eq!(record.metrics_snapshot().map(|m| m.total_llm_calls), Some(2));
    }
}
