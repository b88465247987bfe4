//! Diagram rendering: label sanitizing, the engine seam, and the job queue
//! that keeps engine calls from overlapping.

mod engine;
mod queue;
mod sanitize;

use std::future::Future;

use tracing::warn;

pub use engine::{BindFn, DiagramEngine, MmdcEngine, RenderOutput};
pub use queue::{RenderJob, RenderQueue, next_job_id};
pub use sanitize::sanitize;

use crate::errors::RenderError;

/// What a diagram displays once its render job settles.
#[derive(Debug, Clone)]
pub enum DiagramOutcome {
    /// The engine produced markup.
    Rendered(RenderOutput),
    /// The engine failed; show the raw source instead.
    Fallback { source: String, error: RenderError },
}

impl DiagramOutcome {
    pub fn is_rendered(&self) -> bool {
        matches!(self, Self::Rendered(_))
    }
}

/// Sanitizes `chart`, queues it, and maps engine failure to a plain-text fallback.
///
/// Like [`RenderQueue::submit`], the job is chained at call time.
pub fn render_diagram(
    queue: &RenderQueue,
    chart: &str,
) -> impl Future<Output = DiagramOutcome> + Send + 'static {
    let source = chart.to_string();
    let pending = queue.submit(sanitize(chart));
    async move {
        match pending.await {
            Ok(output) => DiagramOutcome::Rendered(output),
            Err(error) => {
                warn!(job_id = error.job_id(), error = %error, "diagram falls back to source text");
                DiagramOutcome::Fallback { source, error }
            }
        }
    }
}
