use std::fmt;
use std::path::Path;
use std::pin::Pin;

use reqwest::StatusCode;
use reqwest::header::ACCEPT;
use reqwest::multipart::{Form, Part};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::errors::{ClientError, StreamError};
use crate::history::{RunRecord, RunSummary};
use crate::session::{SessionId, SessionMessage, SessionOutcome, SessionUpdate, forward_session};
use crate::stream::CompletePayload;

type ByteStream =
    Pin<Box<dyn futures::Stream<Item = Result<bytes::Bytes, reqwest::Error>> + Send + 'static>>;

/// Target reader of the report.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Audience {
    #[default]
    Engineer,
    Executive,
}

impl Audience {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Engineer => "engineer",
            Self::Executive => "executive",
        }
    }
}

impl fmt::Display for Audience {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Audience {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "engineer" => Ok(Self::Engineer),
            "executive" => Ok(Self::Executive),
            other => Err(ClientError::Validation(format!(
                "unknown audience {other:?} (expected engineer or executive)"
            ))),
        }
    }
}

/// A PDF attached to a research question.
#[derive(Clone, PartialEq, Eq)]
pub struct Document {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("file_name", &self.file_name)
            .field("len", &self.bytes.len())
            .finish()
    }
}

impl Document {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes,
        }
    }

    /// Reads a document from disk, keeping only the file name.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, ClientError> {
        let path = path.as_ref();
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| ClientError::Validation(format!("invalid document path {}", path.display())))?
            .to_string();
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| ClientError::Validation(format!("failed to read {}: {e}", path.display())))?;
        Ok(Self { file_name, bytes })
    }

    fn is_pdf(&self) -> bool {
        Path::new(&self.file_name)
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
    }
}

/// One research submission.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResearchRequest {
    pub question: String,
    pub audience: Audience,
    pub document: Option<Document>,
}

impl ResearchRequest {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            audience: Audience::default(),
            document: None,
        }
    }

    pub fn audience(mut self, audience: Audience) -> Self {
        self.audience = audience;
        self
    }

    pub fn document(mut self, document: Document) -> Self {
        self.document = Some(document);
        self
    }

    pub fn validate(&self) -> Result<(), ClientError> {
        if self.question.trim().is_empty() {
            return Err(ClientError::Validation("question must not be empty".into()));
        }
        if let Some(document) = &self.document
            && !document.is_pdf()
        {
            return Err(ClientError::Validation(format!(
                "only PDF documents are supported, got {:?}",
                document.file_name
            )));
        }
        Ok(())
    }

    fn into_form(self) -> Result<Form, StreamError> {
        let mut form = Form::new()
            .text("question", self.question.trim().to_string())
            .text("audience", self.audience.as_str());
        if let Some(document) = self.document {
            let part = Part::bytes(document.bytes)
                .file_name(document.file_name)
                .mime_str("application/pdf")
                .map_err(|e| StreamError::protocol(format!("invalid document part: {e}")))?;
            form = form.part("pdf_file", part);
        }
        Ok(form)
    }
}

/// Handle used to abandon a running session.
#[derive(Clone, Debug)]
pub struct AbortHandle {
    inner: tokio::task::AbortHandle,
}

impl AbortHandle {
    /// Stops the read loop. No further messages are sent for the session.
    pub fn abort(&self) {
        self.inner.abort();
    }
}

/// A session started with [`ResearchClient::run`].
pub struct ResearchRun {
    session_id: SessionId,
    rx: mpsc::UnboundedReceiver<SessionMessage>,
    task: JoinHandle<SessionOutcome>,
}

impl ResearchRun {
    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    /// Receives the next message; `None` once the session task is gone.
    pub async fn next_message(&mut self) -> Option<SessionMessage> {
        self.rx.recv().await
    }

    pub fn abort_handle(&self) -> AbortHandle {
        AbortHandle {
            inner: self.task.abort_handle(),
        }
    }

    /// Drains remaining messages and returns the completion payload, if any.
    pub async fn finish(mut self) -> Result<Option<CompletePayload>, ClientError> {
        while let Some(message) = self.rx.recv().await {
            if let SessionUpdate::Finished(_) = message.update {
                break;
            }
        }
        match self.task.await {
            Ok(SessionOutcome::Completed(payload)) => Ok(Some(payload)),
            Ok(SessionOutcome::NoResult) => Ok(None),
            Ok(SessionOutcome::Failed(err)) => Err(err.into()),
            Err(err) if err.is_cancelled() => Err(ClientError::Cancelled),
            Err(err) => Err(ClientError::protocol_msg(format!("session task failed: {err}"))),
        }
    }
}

/// HTTP client for the research service.
#[derive(Clone)]
pub struct ResearchClient {
    http: reqwest::Client,
    config: ClientConfig,
}

impl ResearchClient {
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        if config.base_url.trim().is_empty() {
            return Err(ClientError::Config("base_url must not be empty".into()));
        }
        let http = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| ClientError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { http, config })
    }

    pub fn from_env() -> Result<Self, ClientError> {
        Self::new(ClientConfig::from_env()?)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Validates `request` and spawns its read loop.
    ///
    /// Every message the loop produces, including the final
    /// [`SessionUpdate::Finished`], goes to `tx` tagged with `session_id`.
    pub fn start_session(
        &self,
        request: ResearchRequest,
        session_id: SessionId,
        tx: mpsc::UnboundedSender<SessionMessage>,
    ) -> Result<JoinHandle<SessionOutcome>, ClientError> {
        request.validate()?;
        info!(
            session_id = %session_id,
            audience = %request.audience,
            has_document = request.document.is_some(),
            "starting research session"
        );
        let client = self.clone();
        Ok(tokio::spawn(async move {
            match client.open_stream(request).await {
                Ok(bytes) => forward_session(session_id, bytes, &tx).await,
                Err(err) => {
                    warn!(session_id = %session_id, error = %err, "research request failed");
                    let outcome = SessionOutcome::Failed(err);
                    let _ = tx.send(SessionMessage::finished(session_id, outcome.clone()));
                    outcome
                }
            }
        }))
    }

    /// Starts a session on a private channel.
    pub fn run(&self, request: ResearchRequest) -> Result<ResearchRun, ClientError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let session_id = SessionId::new();
        let task = self.start_session(request, session_id, tx)?;
        Ok(ResearchRun {
            session_id,
            rx,
            task,
        })
    }

    async fn open_stream(&self, request: ResearchRequest) -> Result<ByteStream, StreamError> {
        let form = request.into_form()?;
        let response = self
            .http
            .post(self.config.research_url())
            .header(ACCEPT, "text/event-stream")
            .multipart(form)
            .send()
            .await
            .map_err(|e| StreamError::transport(format!("research request failed: {e}"), None))?;
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(StreamError::transport(
                format!("API error {}: {body}", status.as_u16()),
                Some(status.as_u16()),
            ));
        }
        debug!(%status, "research stream opened");
        Ok(Box::pin(response.bytes_stream()))
    }

    /// Past runs, newest first.
    pub async fn list_runs(&self) -> Result<Vec<RunSummary>, ClientError> {
        let response = self.get(self.config.runs_url()).await?;
        response
            .json::<Vec<RunSummary>>()
            .await
            .map_err(|e| ClientError::protocol_msg(format!("invalid runs listing: {e}")))
    }

    /// Like [`list_runs`](Self::list_runs), but a failure yields an empty list.
    pub async fn list_runs_or_empty(&self) -> Vec<RunSummary> {
        match self.list_runs().await {
            Ok(runs) => runs,
            Err(err) => {
                warn!(error = %err, "failed to load run history");
                Vec::new()
            }
        }
    }

    pub async fn get_run(&self, run_id: &str) -> Result<RunRecord, ClientError> {
        let response = self.get(self.config.run_url(run_id)).await.map_err(|err| match err {
            ClientError::Transport {
                status_code: Some(404),
                ..
            } => ClientError::NotFound {
                run_id: run_id.to_string(),
            },
            other => other,
        })?;
        response
            .json::<RunRecord>()
            .await
            .map_err(|e| ClientError::protocol_msg(format!("invalid run {run_id}: {e}")))
    }

    async fn get(&self, url: String) -> Result<reqwest::Response, ClientError> {
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| ClientError::Transport {
                message: format!("GET {url} failed: {e}"),
                status_code: None,
            })?;
        let status = response.status();
        if status == StatusCode::OK {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(ClientError::Transport {
            message: format!("API error {}: {body}", status.as_u16()),
            status_code: Some(status.as_u16()),
        })
    }
}
