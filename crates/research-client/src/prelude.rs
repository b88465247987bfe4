//! Common imports for typical client usage.
pub use crate::{
    Audience, ClientError, CompletePayload, Document, Phase, ProgressView, RenderQueue,
    ResearchClient, ResearchRequest, SessionBoard, SessionMessage, SessionOutcome, Status,
    StreamEvent,
};
