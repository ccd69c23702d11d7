use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::value::RawValue;

// ─── Partition & Position ─────────────────────────────────────────

/// Identifier of a partition, unique within a feed.
pub type PartitionId = u32;

/// Ordering position of an event inside its partition.
///
/// Strictly increasing within a partition; gaps are allowed. On the wire a
/// position is its decimal text.
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Position(pub u64);

impl Position {
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Position {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<u64>().map(Self)
    }
}

impl From<u64> for Position {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

// ─── Event ────────────────────────────────────────────────────────

/// One immutable event of a partition.
///
/// Equality is by identity only. The payload is an already-serialized JSON
/// document and is embedded verbatim in the wire envelope.
#[derive(Debug, Clone)]
pub struct Event {
    id: String,
    version: u32,
    position: Position,
    event_type: String,
    payload: Box<RawValue>,
}

impl Event {
    pub fn new(
        id: impl Into<String>,
        version: u32,
        position: impl Into<Position>,
        event_type: impl Into<String>,
        payload: Box<RawValue>,
    ) -> Self {
        Self {
            id: id.into(),
            version,
            position: position.into(),
            event_type: event_type.into(),
            payload,
        }
    }

    /// Build an event whose payload is `value` serialized to JSON.
    pub fn from_value<T: Serialize>(
        id: impl Into<String>,
        version: u32,
        position: impl Into<Position>,
        event_type: impl Into<String>,
        value: &T,
    ) -> serde_json::Result<Self> {
        let payload = serde_json::value::to_raw_value(value)?;
        Ok(Self::new(id, version, position, event_type, payload))
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn payload(&self) -> &RawValue {
        &self.payload
    }

    /// Serialize the wire envelope: `{"id","version","type","payload"}`.
    pub fn to_wire(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }
}

impl PartialEq for Event {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Event {}

impl Serialize for Event {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        // Position travels in the checkpoint frame, not in the envelope.
        let mut s = serializer.serialize_struct("Event", 4)?;
        s.serialize_field("id", &self.id)?;
        s.serialize_field("version", &self.version)?;
        s.serialize_field("type", &self.event_type)?;
        s.serialize_field("payload", &self.payload)?;
        s.end()
    }
}

/// Decoded wire envelope, as seen by a consumer.
#[derive(Debug, Clone, Deserialize)]
pub struct EventEnvelope {
    pub id: String,
    pub version: u32,
    #[serde(rename = "type")]
    pub event_type: String,
    pub payload: Box<RawValue>,
}

// ─── Feed Metadata ────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PartitionInfo {
    pub id: PartitionId,
}

/// Discovery document: feed token plus the partitions currently known.
///
/// A changed token tells the consumer that partition membership may have
/// changed and its partition set must be re-derived.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedInfo {
    pub token: String,
    pub partitions: Vec<PartitionInfo>,
}

impl FeedInfo {
    pub fn partition_ids(&self) -> impl Iterator<Item = PartitionId> + '_ {
        self.partitions.iter().map(|p| p.id)
    }
}

// ─── Fetch Options ────────────────────────────────────────────────

/// Page size value meaning "let the engine choose".
pub const DEFAULT_PAGE_SIZE: usize = 0;

/// Per-fetch options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchOptions {
    /// Maximum events to deliver; [`DEFAULT_PAGE_SIZE`] selects the engine default.
    pub page_size_hint: usize,
    /// Event types to deliver. Empty means every type passes.
    pub event_types: BTreeSet<String>,
}

impl FetchOptions {
    #[must_use]
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size_hint = page_size;
        self
    }

    #[must_use]
    pub fn with_event_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.event_types = types.into_iter().map(Into::into).collect();
        self
    }

    /// Whether an event of `event_type` passes the type filter.
    pub fn accepts(&self, event_type: &str) -> bool {
        self.event_types.is_empty() || self.event_types.contains(event_type)
    }
}

/// Outcome of a completed fetch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchSummary {
    /// Events handed to the receiver (passed the type filter).
    pub delivered: usize,
    /// Events checkpointed, delivered or not.
    pub inspected: usize,
    /// Last checkpoint acknowledged by the receiver.
    pub last_checkpoint: Option<Position>,
}
