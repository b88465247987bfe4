use std::path::{Path, PathBuf};

use once_cell::sync::OnceCell;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;

static INIT: OnceCell<()> = OnceCell::new();

const DEFAULT_FILTER: &str = "info";
const DEFAULT_LOG_FILE: &str = "research.logs.jsonl";

/// Where log lines go.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LogSink {
    /// Compact human-readable lines on stderr; stdout stays free for reports.
    Stderr,
    /// JSON lines appended to a file.
    JsonFile(PathBuf),
}

/// Logging settings resolved from the environment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogSettings {
    pub enabled: bool,
    /// `EnvFilter` directive, if one was given explicitly.
    pub filter: Option<String>,
    pub sink: LogSink,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            filter: None,
            sink: LogSink::Stderr,
        }
    }
}

impl LogSettings {
    /// Reads settings through `lookup`, which maps a variable name to its value.
    ///
    /// - `RESEARCH_OBSERVABILITY_ENABLED` / `RESEARCH_OBSERVABILITY`: enable flag (default on).
    /// - `RESEARCH_LOG_LEVEL`: filter directive (`debug`, `research_client=trace`, ...).
    /// - `RESEARCH_JSON_LOG_PATH`: switches output to a JSONL file.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let enabled = ["RESEARCH_OBSERVABILITY_ENABLED", "RESEARCH_OBSERVABILITY"]
            .iter()
            .find_map(|key| lookup(*key))
            .map(|value| parse_bool_env(&value).unwrap_or(true))
            .unwrap_or(true);
        let filter = lookup("RESEARCH_LOG_LEVEL").filter(|v| !v.trim().is_empty());
        let sink = match lookup("RESEARCH_JSON_LOG_PATH").filter(|v| !v.trim().is_empty()) {
            Some(path) => LogSink::JsonFile(PathBuf::from(path.trim())),
            None => LogSink::Stderr,
        };
        Self {
            enabled,
            filter,
            sink,
        }
    }

    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Explicit filter, then `RUST_LOG`, then `info`.
    fn env_filter(&self) -> EnvFilter {
        if let Some(directive) = &self.filter
            && let Ok(filter) = EnvFilter::try_new(directive)
        {
            return filter;
        }
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
    }
}

fn parse_bool_env(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" | "enabled" => Some(true),
        "0" | "false" | "no" | "off" | "disabled" => Some(false),
        _ => None,
    }
}

/// Splits a log path into the directory and file name the appender expects.
fn split_log_path(path: &Path) -> (PathBuf, String) {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(DEFAULT_LOG_FILE)
        .to_string();
    (dir, file_name)
}

/// Initialize logging once per process from [`LogSettings::from_env`].
pub fn init_observability() {
    init_with(LogSettings::from_env());
}

/// Initialize logging once per process; later calls are no-ops.
pub fn init_with(settings: LogSettings) {
    INIT.get_or_init(|| {
        if !settings.enabled {
            return;
        }
        let env_filter = settings.env_filter();
        match &settings.sink {
            LogSink::JsonFile(path) => {
                let (dir, file_name) = split_log_path(path);
                let _ = std::fs::create_dir_all(&dir);
                let json_layer = tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(true)
                    .with_target(false)
                    .with_writer(tracing_appender::rolling::never(dir, file_name));
                let _ = tracing_subscriber::registry()
                    .with(env_filter)
                    .with(json_layer)
                    .try_init();
            }
            LogSink::Stderr => {
                let console_layer = tracing_subscriber::fmt::layer()
                    .compact()
                    .with_target(false)
                    .with_writer(std::io::stderr);
                let _ = tracing_subscriber::registry()
                    .with(env_filter)
                    .with(console_layer)
                    .try_init();
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings(vars: &[(&str, &str)]) -> LogSettings {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        LogSettings::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_to_stderr_enabled() {
        assert_eq!(settings(&[]), LogSettings::default());
    }

    #[test]
    fn enable_flag_accepts_common_spellings() {
        assert!(!settings(&[("RESEARCH_OBSERVABILITY", " Off ")]).enabled);
        assert!(settings(&[("RESEARCH_OBSERVABILITY_ENABLED", "maybe")]).enabled);
        assert!(
            !settings(&[
                ("RESEARCH_OBSERVABILITY_ENABLED", "no"),
                ("RESEARCH_OBSERVABILITY", "yes"),
            ])
            .enabled
        );
    }

    #[test]
    fn json_path_selects_file_sink() {
        let s = settings(&[
            ("RESEARCH_JSON_LOG_PATH", "logs/run.jsonl"),
            ("RESEARCH_LOG_LEVEL", "research_client=debug"),
        ]);
        assert_eq!(s.sink, LogSink::JsonFile(PathBuf::from("logs/run.jsonl")));
        assert_eq!(s.filter.as_deref(), Some("research_client=debug"));
    }

    #[test]
    fn bare_file_name_logs_to_current_dir() {
        assert_eq!(
            split_log_path(Path::new("run.jsonl")),
            (PathBuf::from("."), "run.jsonl".to_string())
        );
        assert_eq!(
            split_log_path(Path::new("/var/log/research/out.jsonl")),
            (PathBuf::from("/var/log/research"), "out.jsonl".to_string())
        );
    }

    #[test]
    fn init_is_idempotent() {
        init_with(LogSettings {
            enabled: false,
            ..LogSettings::default()
        });
        init_observability();
    }
}
