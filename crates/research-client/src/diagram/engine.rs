use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use crate::config::MmdcConfig;
use crate::errors::RenderError;

/// Callback attached to rendered markup, invoked with the container id after mounting.
pub type BindFn = Arc<dyn Fn(&str) + Send + Sync>;

/// Markup produced by one render job.
#[derive(Clone)]
pub struct RenderOutput {
    pub svg: String,
    pub bind: Option<BindFn>,
}

impl RenderOutput {
    /// Output without interactive bindings.
    pub fn svg(svg: impl Into<String>) -> Self {
        Self {
            svg: svg.into(),
            bind: None,
        }
    }
}

impl fmt::Debug for RenderOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderOutput")
            .field("svg_len", &self.svg.len())
            .field("bind", &self.bind.is_some())
            .finish()
    }
}

/// A diagram rendering engine.
///
/// Engines may keep process-wide state across a call and are only ever
/// invoked through [`RenderQueue`](super::RenderQueue), one job at a time.
#[async_trait::async_trait]
pub trait DiagramEngine: Send + Sync {
    /// Removes anything a previous attempt left behind under `id`.
    async fn remove_artifact(&self, id: &str);

    /// Renders `source` to markup.
    async fn render(&self, id: &str, source: &str) -> Result<RenderOutput, RenderError>;
}

/// Engine backed by the mermaid CLI (`mmdc`).
pub struct MmdcEngine {
    config: MmdcConfig,
}

impl MmdcEngine {
    pub fn new(config: MmdcConfig) -> Self {
        Self { config }
    }

    pub fn from_env() -> Self {
        Self::new(MmdcConfig::from_env())
    }

    fn input_path(&self, id: &str) -> PathBuf {
        self.config.work_dir.join(format!("{id}.mmd"))
    }

    /// Where the SVG for job `id` is written.
    pub fn output_path(&self, id: &str) -> PathBuf {
        self.config.work_dir.join(format!("{id}.svg"))
    }
}

async fn remove_if_present(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!(path = %path.display(), "removed stale diagram artifact"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => debug!(path = %path.display(), error = %e, "failed to remove diagram artifact"),
    }
}

#[async_trait::async_trait]
impl DiagramEngine for MmdcEngine {
    async fn remove_artifact(&self, id: &str) {
        remove_if_present(&self.output_path(id)).await;
        remove_if_present(&self.input_path(id)).await;
    }

    async fn render(&self, id: &str, source: &str) -> Result<RenderOutput, RenderError> {
        let io_err = |message: String| RenderError::Io {
            job_id: id.to_string(),
            message,
        };
        tokio::fs::create_dir_all(&self.config.work_dir)
            .await
            .map_err(|e| io_err(format!("create {}: {e}", self.config.work_dir.display())))?;

        let input = self.input_path(id);
        let output = self.output_path(id);
        tokio::fs::write(&input, source)
            .await
            .map_err(|e| io_err(format!("write {}: {e}", input.display())))?;

        let result = tokio::process::Command::new(&self.config.program)
            .arg("--quiet")
            .arg("--input")
            .arg(&input)
            .arg("--output")
            .arg(&output)
            .args(&self.config.extra_args)
            .output()
            .await;
        remove_if_present(&input).await;

        let out = result.map_err(|e| io_err(format!("spawn {}: {e}", self.config.program)))?;
        if !out.status.success() {
            return Err(RenderError::Engine {
                job_id: id.to_string(),
                message: format!(
                    "{} exited with {}: {}",
                    self.config.program,
                    out.status,
                    String::from_utf8_lossy(&out.stderr).trim()
                ),
            });
        }

        let svg = tokio::fs::read_to_string(&output)
            .await
            .map_err(|e| io_err(format!("read {}: {e}", output.display())))?;
        Ok(RenderOutput::svg(svg))
    }
}
