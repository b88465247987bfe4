/// Failures that end a single stream read.
///
/// Every variant is fatal to the session it belongs to; nothing here is
/// retried by the client.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StreamError {
    /// Non-success HTTP status or network failure before/during the stream.
    #[error("transport error: {message}")]
    Transport {
        message: String,
        status_code: Option<u16>,
    },
    /// A frame could not be decoded (invalid UTF-8 or malformed JSON).
    #[error("protocol error: {message}")]
    Protocol { message: String },
    /// The service sent an explicit `error` event.
    #[error("{message}")]
    Remote { message: String },
}

impl StreamError {
    /// Creates a transport-level error.
    pub fn transport(message: impl Into<String>, status_code: Option<u16>) -> Self {
        Self::Transport {
            message: message.into(),
            status_code,
        }
    }

    /// Creates a protocol-level error.
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Creates an error carrying the service-supplied message.
    pub fn remote(message: impl Into<String>) -> Self {
        Self::Remote {
            message: message.into(),
        }
    }

    /// Returns the human-readable message for this error.
    pub fn message(&self) -> &str {
        match self {
            Self::Transport { message, .. }
            | Self::Protocol { message }
            | Self::Remote { message } => message,
        }
    }
}

/// Diagram rendering failure, scoped to one render job.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RenderError {
    /// The rendering engine rejected the source.
    #[error("render failed ({job_id}): {message}")]
    Engine { job_id: String, message: String },
    /// Reading or writing render artifacts failed.
    #[error("render io failed ({job_id}): {message}")]
    Io { job_id: String, message: String },
    /// The job was dropped before it produced a result.
    #[error("render job {job_id} was dropped before completion")]
    QueueClosed { job_id: String },
}

impl RenderError {
    /// Returns the job identifier the failure belongs to.
    pub fn job_id(&self) -> &str {
        match self {
            Self::Engine { job_id, .. } | Self::Io { job_id, .. } | Self::QueueClosed { job_id } => {
                job_id
            }
        }
    }
}

/// Top-level error type for the public client API.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClientError {
    /// Invalid client configuration.
    #[error("config error: {0}")]
    Config(String),
    /// Invalid request input.
    #[error("validation error: {0}")]
    Validation(String),
    /// A past run was requested that the service does not know.
    #[error("run not found: {run_id}")]
    NotFound { run_id: String },
    /// Non-streaming request failed (history listing, run lookup).
    #[error("transport error: {message}")]
    Transport {
        message: String,
        status_code: Option<u16>,
    },
    /// Session-level failure (transport, protocol, or explicit error event).
    #[error(transparent)]
    Stream(StreamError),
    /// The session was abandoned before it produced a terminal result.
    #[error("cancelled")]
    Cancelled,
    /// Internal invariant violation.
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl ClientError {
    pub(crate) fn protocol_msg(message: impl Into<String>) -> Self {
        Self::Protocol(message.into())
    }
}

impl From<StreamError> for ClientError {
    fn from(value: StreamError) -> Self {
        ClientError::Stream(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_error_displays_bare_message() {
        let err = StreamError::remote("LLM quota exceeded");
        assert_eq!(err.to_string(), "LLM quota exceeded");
        assert_eq!(err.message(), "LLM quota exceeded");
    }

    #[test]
    fn stream_error_converts_transparently() {
        let err: ClientError = StreamError::transport("API error 502", Some(502)).into();
        assert_eq!(err.to_string(), "transport error: API error 502");
    }
}
