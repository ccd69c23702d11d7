//! HTTP wire format shared by server and client.
//!
//! Fetch responses are newline-delimited JSON. Each line is one frame:
//!
//! ```text
//! {"event":{"id":"...","version":0,"type":"PaymentCaptured","payload":{...}}}
//! {"checkpoint":"41"}
//! ```
//!
//! A page ends at EOF. A stream cut short without a clean end is a failed
//! fetch; checkpoints already received stay valid.

use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

use crate::types::{FetchOptions, PartitionId, Position};

/// Sub-path of the fetch endpoint below a feed's base path.
pub const EVENTS_PATH: &str = "events";

/// Content type of streamed fetch responses.
pub const NDJSON_CONTENT_TYPE: &str = "application/x-ndjson";

// ─── Request ─────────────────────────────────────────────────────────

/// Query string of `GET <feed>/events`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchQuery {
    pub partition: PartitionId,
    pub cursor: String,
    #[serde(rename = "pageSize", default, skip_serializing_if = "Option::is_none")]
    pub page_size: Option<usize>,
    /// Comma-separated event types.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub types: Option<String>,
}

impl FetchQuery {
    pub fn new(partition: PartitionId, cursor: impl Into<String>, options: &FetchOptions) -> Self {
        let types = if options.event_types.is_empty() {
            None
        } else {
            Some(
                options
                    .event_types
                    .iter()
                    .map(String::as_str)
                    .collect::<Vec<_>>()
                    .join(","),
            )
        };
        Self {
            partition,
            cursor: cursor.into(),
            page_size: (options.page_size_hint > 0).then_some(options.page_size_hint),
            types,
        }
    }

    pub fn options(&self) -> FetchOptions {
        let event_types = self
            .types
            .as_deref()
            .map(|t| {
                t.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_owned)
                    .collect()
            })
            .unwrap_or_default();
        FetchOptions {
            page_size_hint: self.page_size.unwrap_or(0),
            event_types,
        }
    }
}

// ─── Frames ──────────────────────────────────────────────────────────

/// One decoded line of a fetch response.
#[derive(Debug, Deserialize)]
pub enum Frame {
    #[serde(rename = "event")]
    Event(Box<RawValue>),
    #[serde(rename = "checkpoint")]
    Checkpoint(String),
}

impl Frame {
    pub fn decode(line: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(line)
    }
}

/// Encode an event frame around an already-serialized envelope.
///
/// Line breaks in the envelope are dropped so the frame stays on one line.
/// JSON strings cannot hold a raw line break, so only insignificant
/// whitespace is removed and the decoded envelope is unchanged.
pub fn encode_event_frame(envelope: &[u8]) -> Vec<u8> {
    const PREFIX: &[u8] = br#"{"event":"#;
    let mut frame = Vec::with_capacity(PREFIX.len() + envelope.len() + 2);
    frame.extend_from_slice(PREFIX);
    frame.extend(
        envelope
            .iter()
            .copied()
            .filter(|b| !matches!(b, b'\n' | b'\r')),
    );
    frame.extend_from_slice(b"}\n");
    frame
}

pub fn encode_checkpoint_frame(position: Position) -> Vec<u8> {
    format!("{{\"checkpoint\":\"{position}\"}}\n").into_bytes()
}

// ─── Errors ──────────────────────────────────────────────────────────

/// Body of every non-2xx response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub kind: String,
}
