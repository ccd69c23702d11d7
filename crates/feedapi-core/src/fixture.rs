//! Payment fixture feed used by the `serve` command and conformance tests.
//!
//! Two partitions (0 and 1). Positions run `0..n`; the first half of each
//! partition is `PaymentCaptured`, the second half `PaymentCancelled`.

use serde::Serialize;

use crate::engine::FetchEngine;
use crate::error::FeedBuildError;
use crate::memory::MemoryFeed;
use crate::types::{Event, PartitionId};

pub const FIXTURE_FEED_NAME: &str = "testfeed";
pub const FIXTURE_TOKEN: &str = "the-token";
pub const FIXTURE_EVENTS_PER_PARTITION: u64 = 10_000;

pub const PAYMENT_CAPTURED: &str = "PaymentCaptured";
pub const PAYMENT_CANCELLED: &str = "PaymentCancelled";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PaymentPayload<'a> {
    payment_id: &'a str,
    amount_minor: u64,
    currency: &'static str,
}

fn id_prefix(partition: PartitionId) -> &'static str {
    match partition {
        0 => "00000000",
        _ => "11111111",
    }
}

fn payment_event(partition: PartitionId, position: u64, half: u64) -> serde_json::Result<Event> {
    let id = format!("{}-0000-0000-0000-{position:012x}", id_prefix(partition));
    let event_type = if position < half {
        PAYMENT_CAPTURED
    } else {
        PAYMENT_CANCELLED
    };
    let payload = PaymentPayload {
        payment_id: &id,
        amount_minor: 100 + position,
        currency: "NOK",
    };
    Event::from_value(id.clone(), 0, position, event_type, &payload)
}

/// Build the fixture feed with `events_per_partition` events in each partition.
pub fn payment_feed(
    events_per_partition: u64,
    engine: FetchEngine,
) -> Result<MemoryFeed, FeedBuildError> {
    let half = events_per_partition / 2;
    let mut builder = MemoryFeed::builder(FIXTURE_FEED_NAME, FIXTURE_TOKEN).engine(engine);
    for partition in [0, 1] {
        let events = (0..events_per_partition)
            .map(|p| payment_event(partition, p, half))
            .collect::<serde_json::Result<Vec<_>>>()
            .map_err(|e| FeedBuildError::Payload(e.to_string()))?;
        builder = builder.partition(partition, events);
    }
    builder.build()
}
