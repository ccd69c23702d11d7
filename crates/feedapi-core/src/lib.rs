//! feedapi-core: partitioned, resumable event feeds.
//!
//! Event/cursor/metadata models, the receiver contract, the stateless fetch
//! engine, the publisher trait with an in-memory implementation, the wire
//! format, and the consumer-side resume driver. Synchronous; the transport
//! crates bridge it onto async IO.

pub mod consumer;
pub mod context;
pub mod cursor;
pub mod engine;
pub mod error;
pub mod fixture;
pub mod memory;
pub mod publisher;
pub mod receiver;
pub mod registry;
pub mod retry;
pub mod types;
pub mod wire;

pub use consumer::{PageOutcome, PartitionConsumer};
pub use context::FetchContext;
pub use cursor::{Cursor, FaultKind};
pub use engine::FetchEngine;
pub use error::{
    DiscoveryError, FeedBuildError, FetchError, ReceiverError, RegistryError, TransientKind,
};
pub use memory::MemoryFeed;
pub use publisher::EventPublisher;
pub use receiver::{EventReceiver, FnReceiver};
pub use registry::FeedRegistry;
pub use retry::{RetryPolicy, RetryTracker};
pub use types::{
    Event, EventEnvelope, FeedInfo, FetchOptions, FetchSummary, PartitionId, PartitionInfo,
    Position,
};
