//! Phase pipeline and plan-step view derived from the latest snapshot.
//!
//! Everything here is a pure function of its inputs; nothing is remembered
//! between snapshots.

use std::fmt;

use crate::stream::ProgressSnapshot;

/// One stage of the fixed five-phase pipeline, in pipeline order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Phase {
    Plan,
    Act,
    Observe,
    Reflect,
    Write,
}

impl Phase {
    /// All phases in pipeline order.
    pub const ALL: [Phase; 5] = [
        Phase::Plan,
        Phase::Act,
        Phase::Observe,
        Phase::Reflect,
        Phase::Write,
    ];

    /// Maps a service node name to its phase. The write phase reports as `write_report`.
    pub fn from_node(node: &str) -> Option<Self> {
        match node.trim() {
            "plan" => Some(Self::Plan),
            "act" => Some(Self::Act),
            "observe" => Some(Self::Observe),
            "reflect" => Some(Self::Reflect),
            "write_report" | "write" => Some(Self::Write),
            _ => None,
        }
    }

    /// Position in the pipeline.
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Plan => "Plan",
            Self::Act => "Act",
            Self::Observe => "Observe",
            Self::Reflect => "Reflect",
            Self::Write => "Write",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Display status shared by phases and plan steps.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Status {
    Done,
    Active,
    Pending,
}

impl Status {
    fn relative(index: usize, current: usize) -> Self {
        match index.cmp(&current) {
            std::cmp::Ordering::Less => Self::Done,
            std::cmp::Ordering::Equal => Self::Active,
            std::cmp::Ordering::Greater => Self::Pending,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PhaseView {
    pub phase: Phase,
    pub status: Status,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StepView {
    pub text: String,
    pub status: Status,
}

/// Secondary label/value pair shown under the pipeline.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProgressDetail {
    pub label: &'static str,
    pub value: String,
}

/// Full UI progress state for one snapshot.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProgressView {
    pub current: Phase,
    pub phases: Vec<PhaseView>,
    pub steps: Vec<StepView>,
    pub details: Vec<ProgressDetail>,
}

impl ProgressView {
    pub fn phase_statuses(&self) -> Vec<Status> {
        self.phases.iter().map(|p| p.status).collect()
    }

    pub fn step_statuses(&self) -> Vec<Status> {
        self.steps.iter().map(|s| s.status).collect()
    }
}

/// Phase the snapshot points at; unknown or missing nodes count as `Plan`.
pub fn current_phase(snapshot: Option<&ProgressSnapshot>) -> Phase {
    snapshot
        .and_then(|s| Phase::from_node(&s.node))
        .unwrap_or(Phase::Plan)
}

/// Derives the phase pipeline, step list, and detail row.
pub fn derive_progress(snapshot: Option<&ProgressSnapshot>, plan_steps: &[String]) -> ProgressView {
    let current = current_phase(snapshot);
    let phases = Phase::ALL
        .iter()
        .map(|&phase| PhaseView {
            phase,
            status: Status::relative(phase.index(), current.index()),
        })
        .collect();

    let step_index = snapshot.and_then(|s| s.step_index).unwrap_or(0);
    let steps = plan_steps
        .iter()
        .enumerate()
        .map(|(i, text)| StepView {
            text: text.clone(),
            status: if current == Phase::Write {
                Status::Done
            } else {
                Status::relative(i, step_index)
            },
        })
        .collect();

    ProgressView {
        current,
        phases,
        steps,
        details: snapshot.map(progress_details).unwrap_or_default(),
    }
}

fn progress_details(snapshot: &ProgressSnapshot) -> Vec<ProgressDetail> {
    let mut details = Vec::new();
    if let Some(iteration) = snapshot.iteration.filter(|i| *i > 0) {
        details.push(ProgressDetail {
            label: "Iteration",
            value: iteration.to_string(),
        });
    }
    if let Some(total) = snapshot.total_steps.filter(|t| *t > 0) {
        details.push(ProgressDetail {
            label: "Step",
            value: format!("{} / {}", snapshot.step_index.unwrap_or(0).saturating_add(1), total),
        });
    }
    if let Some(tool) = snapshot.tool.as_deref().filter(|t| !t.is_empty()) {
        details.push(ProgressDetail {
            label: "Tool",
            value: tool.to_string(),
        });
    }
    if let Some(evidence) = snapshot.evidence_count.filter(|e| *e > 0) {
        details.push(ProgressDetail {
            label: "Evidence",
            value: evidence.to_string(),
        });
    }
    if let Some(confidence) = snapshot.confidence.filter(|c| *c > 0.0) {
        details.push(ProgressDetail {
            label: "Confidence",
            value: format!("{}%", (confidence * 100.0).round() as i64),
        });
    }
    details
}

#[cfg(test)]
mod tests {
    use super::*;
    use Status::{Active, Done, Pending};

    fn snapshot(node: &str) -> ProgressSnapshot {
        ProgressSnapshot {
            node: node.to_string(),
            ..ProgressSnapshot::default()
        }
    }

    fn steps() -> Vec<String> {
        vec!["search".into(), "read".into(), "summarize".into()]
    }

    #[test]
    fn act_snapshot_marks_plan_done_and_second_step_active() {
        let snap = ProgressSnapshot {
            step_index: Some(1),
            total_steps: Some(3),
            ..snapshot("act")
        };
        let view = derive_progress(Some(&snap), &steps());
        assert_eq!(view.phase_statuses(), vec![Done, Active, Pending, Pending, Pending]);
        assert_eq!(view.step_statuses(), vec![Done, Active, Pending]);
    }

    #[test]
    fn write_report_marks_every_step_done() {
        let snap = ProgressSnapshot {
            step_index: Some(0),
            ..snapshot("write_report")
        };
        let view = derive_progress(Some(&snap), &steps());
        assert_eq!(view.current, Phase::Write);
        assert_eq!(view.phase_statuses(), vec![Done, Done, Done, Done, Active]);
        assert_eq!(view.step_statuses(), vec![Done, Done, Done]);
    }

    #[test]
    fn unknown_or_missing_node_defaults_to_plan() {
        let view = derive_progress(Some(&snapshot("__start__")), &[]);
        assert_eq!(view.current, Phase::Plan);
        assert_eq!(view.phase_statuses()[0], Active);

        let view = derive_progress(None, &steps());
        assert_eq!(view.current, Phase::Plan);
        assert_eq!(view.step_statuses(), vec![Active, Pending, Pending]);
        assert!(view.details.is_empty());
    }

    #[test]
    fn regressed_snapshot_renders_from_latest_only() {
        let later = derive_progress(Some(&snapshot("reflect")), &steps());
        let earlier = derive_progress(Some(&snapshot("act")), &steps());
        assert_eq!(later.current, Phase::Reflect);
        assert_eq!(earlier.phase_statuses(), vec![Done, Active, Pending, Pending, Pending]);
    }

    #[test]
    fn details_skip_zero_values() {
        let snap = ProgressSnapshot {
            iteration: Some(2),
            step_index: Some(1),
            total_steps: Some(4),
            tool: Some(String::new()),
            evidence_count: Some(0),
            confidence: Some(0.734),
            ..snapshot("observe")
        };
        let view = derive_progress(Some(&snap), &[]);
        let rendered: Vec<(&str, &str)> = view
            .details
            .iter()
            .map(|d| (d.label, d.value.as_str()))
            .collect();
        assert_eq!(
            rendered,
            vec![("Iteration", "2"), ("Step", "2 / 4"), ("Confidence", "73%")]
        );
    }

    #[test]
    fn huge_step_index_does_not_overflow() {
        let snap = ProgressSnapshot {
            node: "act".into(),
            step_index: Some(usize::MAX),
            total_steps: Some(3),
            ..ProgressSnapshot::default()
        };
        let view = derive_progress(Some(&snap), &steps());
        assert_eq!(view.step_statuses(), vec![Done, Done, Done]);
        let step = view.details.iter().find(|d| d.label == "Step").expect("step detail");
        assert_eq!(step.value, format!("{} / 3", usize::MAX));
    }
}
