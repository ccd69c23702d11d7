//! `feedapi follow`: consume every partition of a feed in parallel, resuming
//! from and persisting to a checkpoint file.
//!
//! Each round re-discovers the feed. A changed token drops every stored
//! cursor and restarts the newly discovered partitions from the configured
//! start point. Partitions are drained on scoped worker threads; the blocking
//! client never runs on an executor thread.

use std::io::{self, Write};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use anyhow::anyhow;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;

use feedapi_client::HttpFeed;
use feedapi_core::{
    Cursor, DiscoveryError, EventPublisher, EventReceiver, FetchContext, FetchError,
    FetchOptions, PageOutcome, PartitionConsumer, PartitionId, Position, ReceiverError,
};

use crate::checkpoint::CheckpointStore;
use crate::cli::FollowOpts;
use crate::shutdown;

pub async fn cmd_follow(opts: FollowOpts) -> anyhow::Result<()> {
    let stop = CancellationToken::new();
    tokio::spawn({
        let stop = stop.clone();
        async move {
            shutdown::signal().await;
            stop.cancel();
        }
    });
    let handle = Handle::current();
    tokio::task::spawn_blocking(move || follow_blocking(&opts, stop, handle)).await?
}

fn follow_blocking(
    opts: &FollowOpts,
    stop: CancellationToken,
    handle: Handle,
) -> anyhow::Result<()> {
    let feed = HttpFeed::new(opts.feed.url.clone())?;
    let store = CheckpointStore::open(&opts.checkpoint_file)?;
    tracing::info!(
        feed = %feed.endpoint(),
        checkpoint_file = %store.path().display(),
        stored_cursors = store.snapshot().cursors.len(),
        "following feed"
    );

    let follower = Follower::new(&feed, &store, handle, io::stdout())
        .with_options(opts.page.options())
        .with_start(opts.from.cursor())
        .with_stop(stop);
    let poll = Duration::from_millis(opts.poll_interval_ms);

    loop {
        match follower.round() {
            Ok(delivered) => tracing::info!(delivered, "caught up"),
            Err(err) if opts.follow && is_discovery_outage(&err) => {
                tracing::warn!(error = %err, "discovery failed, retrying");
            }
            Err(err) => return Err(err),
        }
        if !opts.follow || !follower.pause(poll) {
            return Ok(());
        }
    }
}

fn is_discovery_outage(err: &anyhow::Error) -> bool {
    matches!(
        err.downcast_ref::<DiscoveryError>(),
        Some(DiscoveryError::Unavailable(_))
    )
}

// ─── Follower ────────────────────────────────────────────────────────

/// Drains all partitions of one feed, writing delivered envelopes to `out`
/// (one per line) and cursors to `store`.
pub(crate) struct Follower<'a, W> {
    feed: &'a dyn EventPublisher,
    store: &'a CheckpointStore,
    handle: Handle,
    out: Mutex<W>,
    options: FetchOptions,
    start: Cursor,
    stop: CancellationToken,
}

impl<'a, W: Write + Send> Follower<'a, W> {
    pub(crate) fn new(
        feed: &'a dyn EventPublisher,
        store: &'a CheckpointStore,
        handle: Handle,
        out: W,
    ) -> Self {
        Self {
            feed,
            store,
            handle,
            out: Mutex::new(out),
            options: FetchOptions::default(),
            start: Cursor::First,
            stop: CancellationToken::new(),
        }
    }

    #[must_use]
    pub(crate) fn with_options(mut self, options: FetchOptions) -> Self {
        self.options = options;
        self
    }

    /// Where partitions without a stored cursor begin.
    #[must_use]
    pub(crate) fn with_start(mut self, start: Cursor) -> Self {
        self.start = start;
        self
    }

    #[must_use]
    pub(crate) fn with_stop(mut self, stop: CancellationToken) -> Self {
        self.stop = stop;
        self
    }

    #[cfg(test)]
    pub(crate) fn into_output(self) -> W {
        self.out.into_inner().unwrap_or_else(PoisonError::into_inner)
    }

    /// Discover, reconcile the checkpoint file, then drain every partition
    /// until it is caught up. Returns the number of delivered events.
    pub(crate) fn round(&self) -> anyhow::Result<usize> {
        let info = self.feed.feed_info()?;
        self.store.reconcile(&info)?;
        let partitions: Vec<PartitionId> = info.partition_ids().collect();
        tracing::debug!(token = %info.token, ?partitions, "feed discovered");

        let results: Vec<anyhow::Result<usize>> = std::thread::scope(|scope| {
            let workers: Vec<_> = partitions
                .iter()
                .map(|&partition| scope.spawn(move || self.drain(partition)))
                .collect();
            workers
                .into_iter()
                .map(|worker| {
                    worker
                        .join()
                        .unwrap_or_else(|_| Err(anyhow!("partition worker panicked")))
                })
                .collect()
        });

        let mut delivered = 0;
        for result in results {
            delivered += result?;
        }
        Ok(delivered)
    }

    fn drain(&self, partition: PartitionId) -> anyhow::Result<usize> {
        let start = self.store.cursor(partition).unwrap_or(self.start);
        let mut consumer =
            PartitionConsumer::new(partition, start).with_options(self.options.clone());
        let ctx = FetchContext::with_token(self.stop.clone());
        let mut delivered = 0;

        loop {
            let mut sink = EnvelopeWriter { out: &self.out };
            let outcome = consumer.next_page(self.feed, &ctx, &mut sink);
            self.store.record(partition, consumer.cursor())?;
            match outcome {
                Ok(PageOutcome::Page(summary)) => delivered += summary.delivered,
                Ok(PageOutcome::CaughtUp) | Err(FetchError::Cancelled) => return Ok(delivered),
                Ok(PageOutcome::Backoff { delay, .. }) => {
                    if !self.pause(delay) {
                        return Ok(delivered);
                    }
                }
                Err(err) => {
                    return Err(anyhow::Error::new(err).context(format!(
                        "partition {partition} stopped at cursor {}",
                        consumer.cursor()
                    )));
                }
            }
        }
    }

    /// Sleep for `delay`. `false` when interrupted by shutdown.
    pub(crate) fn pause(&self, delay: Duration) -> bool {
        let stop = self.stop.clone();
        self.handle.block_on(async move {
            tokio::select! {
                () = stop.cancelled() => false,
                () = tokio::time::sleep(delay) => true,
            }
        })
    }
}

/// Writes delivered envelopes, one per line. Checkpoints are tracked by the
/// consumer, not echoed.
struct EnvelopeWriter<'a, W> {
    out: &'a Mutex<W>,
}

impl<W: Write> EventReceiver for EnvelopeWriter<'_, W> {
    fn event(&mut self, payload: &[u8]) -> Result<(), ReceiverError> {
        let mut out = self.out.lock().unwrap_or_else(PoisonError::into_inner);
        out.write_all(payload)?;
        out.write_all(b"\n")?;
        Ok(())
    }

    fn checkpoint(&mut self, _position: Position) -> Result<(), ReceiverError> {
        Ok(())
    }
}
