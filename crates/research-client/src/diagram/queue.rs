use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use once_cell::sync::OnceCell;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use super::engine::{DiagramEngine, RenderOutput};
use crate::errors::RenderError;

static JOB_COUNTER: AtomicU64 = AtomicU64::new(0);
static GLOBAL: OnceCell<RenderQueue> = OnceCell::new();

/// Allocates a job id unique for the lifetime of the process.
pub fn next_job_id() -> String {
    let seq = JOB_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("mermaid-{}-{seq}", chrono::Utc::now().timestamp_millis())
}

/// One request to the rendering engine.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenderJob {
    pub id: String,
    pub source: String,
}

impl RenderJob {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            id: next_job_id(),
            source: source.into(),
        }
    }
}

struct QueueInner {
    engine: Arc<dyn DiagramEngine>,
    /// Settles when the most recently chained job has finished, whatever its outcome.
    tail: Mutex<Option<oneshot::Receiver<()>>>,
}

/// Serializes every invocation of a non-reentrant [`DiagramEngine`].
///
/// Jobs form a chain: each one starts only after its predecessor has settled,
/// so engine calls never overlap and run in submission order. A failed or
/// panicked job still releases its successor. Clones share the same chain.
#[derive(Clone)]
pub struct RenderQueue {
    inner: Arc<QueueInner>,
}

impl RenderQueue {
    pub fn new(engine: Arc<dyn DiagramEngine>) -> Self {
        Self {
            inner: Arc::new(QueueInner {
                engine,
                tail: Mutex::new(None),
            }),
        }
    }

    /// Installs the process-wide queue on first call and returns it.
    ///
    /// Later calls return the installed queue and ignore `engine`.
    pub fn install_global(engine: Arc<dyn DiagramEngine>) -> RenderQueue {
        GLOBAL.get_or_init(|| RenderQueue::new(engine)).clone()
    }

    /// The process-wide queue, if one was installed.
    pub fn global() -> Option<RenderQueue> {
        GLOBAL.get().cloned()
    }

    /// Chains a render of `source` behind every job submitted before it.
    ///
    /// The job is placed in the chain when this is called, not when the
    /// returned future is first polled. Must be called within a tokio runtime.
    pub fn submit(
        &self,
        source: impl Into<String>,
    ) -> impl Future<Output = Result<RenderOutput, RenderError>> + Send + 'static {
        let job = RenderJob::new(source);
        let job_id = job.id.clone();
        let result_rx = self.enqueue(job);
        async move {
            result_rx
                .await
                .unwrap_or_else(|_| Err(RenderError::QueueClosed { job_id }))
        }
    }

    fn enqueue(&self, job: RenderJob) -> oneshot::Receiver<Result<RenderOutput, RenderError>> {
        let (settled_tx, settled_rx) = oneshot::channel::<()>();
        let (result_tx, result_rx) = oneshot::channel();
        let previous = self
            .inner
            .tail
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(settled_rx);
        let engine = self.inner.engine.clone();
        debug!(job_id = %job.id, "render job queued");

        tokio::spawn(async move {
            if let Some(previous) = previous {
                // An Err here means the predecessor panicked; it has settled all the same.
                let _ = previous.await;
            }
            if result_tx.is_closed() {
                debug!(job_id = %job.id, "render job abandoned by submitter; skipping");
            } else {
                let result = run_job(engine.as_ref(), &job).await;
                let _ = result_tx.send(result);
            }
            let _ = settled_tx.send(());
        });
        result_rx
    }
}

async fn run_job(engine: &dyn DiagramEngine, job: &RenderJob) -> Result<RenderOutput, RenderError> {
    engine.remove_artifact(&job.id).await;
    debug!(job_id = %job.id, "render job started");
    let result = engine.render(&job.id, &job.source).await;
    if let Err(err) = &result {
        warn!(job_id = %job.id, error = %err, "render job failed");
    }
    result
}
