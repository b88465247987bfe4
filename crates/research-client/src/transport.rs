use futures::StreamExt as _;
use tracing::debug;

use crate::errors::StreamError;
use crate::stream::{CompletePayload, StreamEvent};

/// Message used when an `error` event carries no usable `message` field.
pub const DEFAULT_ERROR_MESSAGE: &str = "Research failed without an error message";

/// Event type assumed when a frame has no `event:` line.
pub const DEFAULT_EVENT_TYPE: &str = "message";

/// One blank-line-delimited frame of the event stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseFrame {
    pub event: String,
    pub data: String,
}

/// Incremental frame splitter.
///
/// Bytes are buffered undecoded until a full frame is available, so a
/// multi-byte character split across chunks is never decoded lossily.
#[derive(Default)]
pub struct SseDecoder {
    buf: Vec<u8>,
    /// Bytes before this offset hold no delimiter start, except possibly the last three.
    scanned: usize,
}

impl SseDecoder {
    /// Appends raw bytes to the buffer without parsing anything.
    pub fn extend(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
    }

    /// Takes the next complete frame off the buffer, skipping frames without data.
    pub fn next_frame(&mut self) -> Option<Result<SseFrame, StreamError>> {
        loop {
            let Some((idx, delim_len)) = find_frame_delimiter(&self.buf, self.scanned) else {
                self.scanned = self.buf.len();
                return None;
            };
            let frame_bytes: Vec<u8> = self.buf.drain(..idx + delim_len).take(idx).collect();
            self.scanned = 0;
            match parse_sse_frame(&frame_bytes) {
                Ok(Some(frame)) => return Some(Ok(frame)),
                Ok(None) => continue,
                Err(err) => return Some(Err(err)),
            }
        }
    }

    /// Appends a chunk and returns every frame it completed, in order.
    pub fn push_chunk(&mut self, chunk: &[u8]) -> Result<Vec<SseFrame>, StreamError> {
        self.extend(chunk);
        let mut frames = Vec::new();
        while let Some(frame) = self.next_frame() {
            frames.push(frame?);
        }
        Ok(frames)
    }

    /// Number of buffered bytes not yet part of a complete frame.
    pub fn pending_len(&self) -> usize {
        self.buf.len()
    }
}

/// Finds the first `\n\n` or `\r\n\r\n`, resuming a scan that stopped at `scanned`.
///
/// A delimiter may straddle the old end of the buffer, so the last three
/// previously scanned bytes are checked again.
fn find_frame_delimiter(buf: &[u8], scanned: usize) -> Option<(usize, usize)> {
    (scanned.saturating_sub(3)..buf.len()).find_map(|i| {
        let rest = &buf[i..];
        if rest.starts_with(b"\n\n") {
            Some((i, 2))
        } else if rest.starts_with(b"\r\n\r\n") {
            Some((i, 4))
        } else {
            None
        }
    })
}

fn parse_sse_frame(bytes: &[u8]) -> Result<Option<SseFrame>, StreamError> {
    if bytes.is_empty() {
        return Ok(None);
    }
    let text = std::str::from_utf8(bytes)
        .map_err(|e| StreamError::protocol(format!("invalid UTF-8 in stream frame: {e}")))?;
    let mut event: Option<&str> = None;
    let mut data: Option<&str> = None;
    for raw_line in text.split('\n') {
        let line = raw_line.trim_end_matches('\r');
        if let Some(rest) = line.strip_prefix("event:") {
            event = Some(rest.trim());
        } else if let Some(rest) = line.strip_prefix("data:") {
            // Last data line wins; multi-line payloads are not concatenated.
            data = Some(rest.trim_start());
        }
    }
    Ok(data.map(|data| SseFrame {
        event: event
            .filter(|e| !e.is_empty())
            .unwrap_or(DEFAULT_EVENT_TYPE)
            .to_string(),
        data: data.to_string(),
    }))
}

/// Parses a frame's JSON payload into a typed event.
pub fn decode_frame(frame: &SseFrame) -> Result<StreamEvent, StreamError> {
    let value: serde_json::Value = serde_json::from_str(&frame.data).map_err(|e| {
        StreamError::protocol(format!("invalid JSON in {} frame: {e}", frame.event))
    })?;
    StreamEvent::from_parts(&frame.event, value).map_err(|e| {
        StreamError::protocol(format!("unexpected {} payload: {e}", frame.event))
    })
}

/// Consumes a chunked byte stream and delivers decoded events to `sink`.
///
/// - `complete` is delivered to the sink and returned; nothing after it is read.
/// - `error` ends consumption with [`StreamError::Remote`].
/// - End of stream without `complete` yields `Ok(None)`.
pub async fn read_event_stream<S, B, E, F>(
    bytes: S,
    mut sink: F,
) -> Result<Option<CompletePayload>, StreamError>
where
    S: futures::Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: std::fmt::Display,
    F: FnMut(StreamEvent),
{
    let mut bytes = std::pin::pin!(bytes);
    let mut decoder = SseDecoder::default();
    let mut delivered = 0_u64;

    while let Some(chunk) = bytes.next().await {
        let chunk = chunk
            .map_err(|e| StreamError::transport(format!("stream read failed: {e}"), None))?;
        decoder.extend(chunk.as_ref());
        while let Some(frame) = decoder.next_frame() {
            let event = decode_frame(&frame?)?;
            debug!(event = event.kind(), seq = delivered, "stream event");
            delivered += 1;
            match event {
                StreamEvent::Error(payload) => {
                    let message = payload
                        .message
                        .filter(|m| !m.trim().is_empty())
                        .unwrap_or_else(|| DEFAULT_ERROR_MESSAGE.to_string());
                    return Err(StreamError::remote(message));
                }
                StreamEvent::Complete(payload) => {
                    sink(StreamEvent::Complete(payload.clone()));
                    return Ok(Some(payload));
                }
                other => sink(other),
            }
        }
    }

    if decoder.pending_len() > 0 {
        debug!(
            pending = decoder.pending_len(),
            "stream ended with an incomplete frame; discarding"
        );
    }
    Ok(None)
}
