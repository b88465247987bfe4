//! Plain-text rendering of progress views, history rows, and diagram fallbacks.

use chrono::{DateTime, Utc};
use research_client::history::{RunSummary, format_relative_time};
use research_client::{ProgressView, Status};

fn marker(status: Status) -> &'static str {
    match status {
        Status::Done => "[x]",
        Status::Active => "[>]",
        Status::Pending => "[ ]",
    }
}

/// Phase pipeline, detail row, and plan checklist for one snapshot.
pub fn progress(view: &ProgressView) -> String {
    let mut out = view
        .phases
        .iter()
        .map(|p| format!("{} {}", marker(p.status), p.phase.label()))
        .collect::<Vec<_>>()
        .join("  ");

    if !view.details.is_empty() {
        let details = view
            .details
            .iter()
            .map(|d| format!("{}: {}", d.label, d.value))
            .collect::<Vec<_>>()
            .join(" | ");
        out.push_str("\n    ");
        out.push_str(&details);
    }

    for (i, step) in view.steps.iter().enumerate() {
        out.push_str(&format!("\n    {}. {} {}", i + 1, marker(step.status), step.text));
    }
    out
}

/// One line per past run: id, age, and truncated question.
pub fn history_row(run: &RunSummary, now: DateTime<Utc>) -> String {
    let age = format_relative_time(&run.created_at, now);
    if age.is_empty() {
        format!("{}  {}", run.run_id, run.short_question())
    } else {
        format!("{}  {:>16}  {}", run.run_id, age, run.short_question())
    }
}

/// Raw mermaid source shown when a diagram could not be rendered.
pub fn diagram_fallback(index: usize, source: &str, reason: &str) -> String {
    format!("diagram {index} could not be rendered ({reason}):\n```mermaid\n{source}\n```")
}
