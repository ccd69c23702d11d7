//! In-memory partitioned feed backed by immutable event vectors.

use std::collections::BTreeMap;

use crate::context::FetchContext;
use crate::engine::FetchEngine;
use crate::error::{DiscoveryError, FeedBuildError, FetchError};
use crate::publisher::EventPublisher;
use crate::receiver::EventReceiver;
use crate::types::{Event, FeedInfo, FetchOptions, FetchSummary, PartitionId, PartitionInfo};

/// Read-only feed. Partitions are fixed at build time, so concurrent fetches
/// need no coordination.
#[derive(Debug)]
pub struct MemoryFeed {
    name: String,
    token: String,
    engine: FetchEngine,
    partitions: BTreeMap<PartitionId, Vec<Event>>,
}

impl MemoryFeed {
    pub fn builder(name: impl Into<String>, token: impl Into<String>) -> MemoryFeedBuilder {
        MemoryFeedBuilder {
            name: name.into(),
            token: token.into(),
            engine: FetchEngine::new(),
            partitions: Vec::new(),
        }
    }

    pub fn engine(&self) -> &FetchEngine {
        &self.engine
    }

    pub fn partition(&self, id: PartitionId) -> Option<&[Event]> {
        self.partitions.get(&id).map(Vec::as_slice)
    }
}

impl EventPublisher for MemoryFeed {
    fn name(&self) -> &str {
        &self.name
    }

    fn feed_info(&self) -> Result<FeedInfo, DiscoveryError> {
        Ok(FeedInfo {
            token: self.token.clone(),
            partitions: self
                .partitions
                .keys()
                .map(|&id| PartitionInfo { id })
                .collect(),
        })
    }

    fn fetch_events(
        &self,
        ctx: &FetchContext,
        partition_id: PartitionId,
        cursor: &str,
        receiver: &mut dyn EventReceiver,
        options: &FetchOptions,
    ) -> Result<FetchSummary, FetchError> {
        let events = self
            .partitions
            .get(&partition_id)
            .ok_or(FetchError::PartitionNotFound(partition_id))?;
        let cursor = self.engine.parse_cursor(cursor)?;
        self.engine.fetch(ctx, events, cursor, receiver, options)
    }
}

#[derive(Debug)]
pub struct MemoryFeedBuilder {
    name: String,
    token: String,
    engine: FetchEngine,
    partitions: Vec<(PartitionId, Vec<Event>)>,
}

impl MemoryFeedBuilder {
    #[must_use]
    pub fn engine(mut self, engine: FetchEngine) -> Self {
        self.engine = engine;
        self
    }

    #[must_use]
    pub fn partition(mut self, id: PartitionId, events: Vec<Event>) -> Self {
        self.partitions.push((id, events));
        self
    }

    /// Validate ids and ordering, then freeze the feed.
    pub fn build(self) -> Result<MemoryFeed, FeedBuildError> {
        let mut partitions = BTreeMap::new();
        for (id, events) in self.partitions {
            for pair in events.windows(2) {
                let (prev, next) = (pair[0].position(), pair[1].position());
                if next <= prev {
                    return Err(FeedBuildError::NonIncreasingPosition {
                        partition: id,
                        previous: prev.get(),
                        position: next.get(),
                    });
                }
            }
            if partitions.insert(id, events).is_some() {
                return Err(FeedBuildError::DuplicatePartition(id));
            }
        }
        Ok(MemoryFeed {
            name: self.name,
            token: self.token,
            engine: self.engine,
            partitions,
        })
    }
}
