//! Feed-side contract: discovery plus page fetch.

use crate::context::FetchContext;
use crate::error::{DiscoveryError, FetchError};
use crate::receiver::EventReceiver;
use crate::types::{FeedInfo, FetchOptions, FetchSummary, PartitionId};

/// A discoverable, partitioned event feed.
///
/// Implementations hold no per-consumer state, so independent fetches may
/// run concurrently on any partitions.
pub trait EventPublisher: Send + Sync {
    /// Local registration name. Not part of the wire protocol.
    fn name(&self) -> &str;

    /// Current token and partition set. Must be side-effect free.
    fn feed_info(&self) -> Result<FeedInfo, DiscoveryError>;

    /// Fetch one page of `partition_id` after `cursor`, driving `receiver`.
    fn fetch_events(
        &self,
        ctx: &FetchContext,
        partition_id: PartitionId,
        cursor: &str,
        receiver: &mut dyn EventReceiver,
        options: &FetchOptions,
    ) -> Result<FetchSummary, FetchError>;
}

impl<T: EventPublisher + ?Sized> EventPublisher for std::sync::Arc<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn feed_info(&self) -> Result<FeedInfo, DiscoveryError> {
        (**self).feed_info()
    }

    fn fetch_events(
        &self,
        ctx: &FetchContext,
        partition_id: PartitionId,
        cursor: &str,
        receiver: &mut dyn EventReceiver,
        options: &FetchOptions,
    ) -> Result<FetchSummary, FetchError> {
        (**self).fetch_events(ctx, partition_id, cursor, receiver, options)
    }
}
