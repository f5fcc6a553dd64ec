//! Event Decoder — turns a streamed HTTP body into a lazy sequence of
//! decoded workflow events.
//!
//! The wire format is line-oriented: each meaningful line is
//! `data: <json>`. Blank lines and non-`data` lines are ignored. A
//! malformed JSON payload is a decode failure for that line only — it is
//! logged and skipped, never aborting the stream. The sequence is
//! restartable only by opening a new round; it cannot rewind.

use std::fmt::Display;

use tokio_stream::{Stream, StreamExt};

use super::event::DecodedEvent;
use crate::error::RelayError;

const DATA_PREFIX: &str = "data: ";

/// Decode one raw stream line.
///
/// `None` for lines the protocol ignores (blank, non-`data`); `Some(Err)`
/// for a `data:` line whose payload does not parse.
pub(crate) fn decode_line(line: &str) -> Option<Result<DecodedEvent, RelayError>> {
    let line = line.trim_end_matches('\r');
    let payload = line.strip_prefix(DATA_PREFIX)?;
    match serde_json::from_str::<serde_json::Value>(payload) {
        Ok(value) => match DecodedEvent::from_value(value) {
            Ok(event) => Some(Ok(event)),
            Err(e) => Some(Err(RelayError::Decode(format!("bad event shape: {e}")))),
        },
        Err(e) => Some(Err(RelayError::Decode(format!("bad event payload: {e}")))),
    }
}

/// Lazily decode a byte stream into events, buffering across chunk
/// boundaries. A transport error mid-stream ends the sequence (logged)
/// rather than propagating; a trailing unterminated line is still flushed.
pub(crate) fn event_stream<S, B, E>(bytes: S) -> impl Stream<Item = DecodedEvent>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: Display,
{
    async_stream::stream! {
        tokio::pin!(bytes);
        let mut buffer: Vec<u8> = Vec::new();

        while let Some(chunk) = bytes.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => {
                    tracing::warn!("[EventDecoder] stream read failed: {}", e);
                    break;
                }
            };
            buffer.extend_from_slice(chunk.as_ref());

            while let Some(pos) = buffer.iter().position(|&b| b == b'\n') {
                let line_bytes: Vec<u8> = buffer.drain(..=pos).collect();
                let line = String::from_utf8_lossy(&line_bytes[..pos]);
                match decode_line(&line) {
                    Some(Ok(event)) => yield event,
                    Some(Err(e)) => tracing::warn!("[EventDecoder] skipping line: {}", e),
                    None => {}
                }
            }
        }

        if !buffer.is_empty() {
            let line = String::from_utf8_lossy(&buffer);
            match decode_line(&line) {
                Some(Ok(event)) => yield event,
                Some(Err(e)) => tracing::warn!("[EventDecoder] skipping line: {}", e),
                None => {}
            }
        }
    }
}
