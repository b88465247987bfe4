use std::path::PathBuf;
use std::time::Duration;

use crate::errors::ClientError;

const DEFAULT_BASE_URL: &str = "http://localhost:8000/api";
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Configuration for the research service HTTP client.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// Base URL of the service API, including any path prefix (for example `/api`).
    pub base_url: String,
    /// Timeout for establishing the connection.
    ///
    /// No overall request timeout is applied; research streams run for minutes.
    pub connect_timeout: Duration,
    /// User agent sent with every request.
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            user_agent: concat!("research-client/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl ClientConfig {
    /// Creates a config pointing at the given base URL.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::default().base_url(base_url)
    }

    /// Builds a config from `RESEARCH_API_BASE_URL` and `RESEARCH_CONNECT_TIMEOUT_SECS`.
    pub fn from_env() -> Result<Self, ClientError> {
        let mut config = Self::default();
        if let Ok(base_url) = std::env::var("RESEARCH_API_BASE_URL")
            && !base_url.trim().is_empty()
        {
            config.base_url = base_url.trim().to_string();
        }
        if let Ok(raw) = std::env::var("RESEARCH_CONNECT_TIMEOUT_SECS") {
            let secs = raw.trim().parse::<u64>().map_err(|e| {
                ClientError::Config(format!("invalid RESEARCH_CONNECT_TIMEOUT_SECS {raw:?}: {e}"))
            })?;
            config.connect_timeout = Duration::from_secs(secs);
        }
        Ok(config)
    }

    /// Overrides the API base URL.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Overrides the connect timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    fn base(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    pub(crate) fn research_url(&self) -> String {
        format!("{}/research", self.base())
    }

    pub(crate) fn runs_url(&self) -> String {
        format!("{}/runs", self.base())
    }

    pub(crate) fn run_url(&self, run_id: &str) -> String {
        format!("{}/runs/{}", self.base(), run_id)
    }
}

/// Configuration for the mermaid CLI rendering engine.
#[derive(Clone, Debug)]
pub struct MmdcConfig {
    /// Executable to invoke.
    pub program: String,
    /// Directory holding per-job source and SVG artifacts.
    pub work_dir: PathBuf,
    /// Extra arguments appended to every invocation (theme, config file, ...).
    pub extra_args: Vec<String>,
}

impl Default for MmdcConfig {
    fn default() -> Self {
        Self {
            program: "mmdc".to_string(),
            work_dir: std::env::temp_dir().join("research-diagrams"),
            extra_args: Vec::new(),
        }
    }
}

impl MmdcConfig {
    /// Builds a config from `RESEARCH_MMDC_BIN` and `RESEARCH_DIAGRAM_DIR`.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(program) = std::env::var("RESEARCH_MMDC_BIN")
            && !program.trim().is_empty()
        {
            config.program = program.trim().to_string();
        }
        if let Ok(dir) = std::env::var("RESEARCH_DIAGRAM_DIR")
            && !dir.trim().is_empty()
        {
            config.work_dir = PathBuf::from(dir.trim());
        }
        config
    }

    /// Overrides the artifact directory.
    pub fn work_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.work_dir = dir.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urls_ignore_trailing_slash() {
        let config = ClientConfig::new("http://host:9000/api/");
        assert_eq!(config.research_url(), "http://host:9000/api/research");
        assert_eq!(config.runs_url(), "http://host:9000/api/runs");
        assert_eq!(config.run_url("abc123"), "http://host:9000/api/runs/abc123");
    }

    #[test]
    fn default_has_connect_timeout_only() {
        let config = ClientConfig::default();
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert_eq!(config.base_url, "http://localhost:8000/api");
    }
}
