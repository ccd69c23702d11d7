//! Consumer-side resume driver for one partition.
//!
//! Fetches page after page, always resuming from the last checkpoint the
//! handler acknowledged. Transient failures keep whatever progress was
//! acknowledged before the failure and yield a backoff delay; everything else
//! is returned to the caller.

use std::time::Duration;

use crate::context::FetchContext;
use crate::cursor::Cursor;
use crate::error::{FetchError, ReceiverError};
use crate::publisher::EventPublisher;
use crate::receiver::EventReceiver;
use crate::retry::{RetryDecision, RetryPolicy, RetryTracker};
use crate::types::{FetchOptions, FetchSummary, PartitionId, Position};

/// Result of one [`PartitionConsumer::next_page`] call.
#[derive(Debug)]
pub enum PageOutcome {
    /// At least one event was inspected.
    Page(FetchSummary),
    /// Nothing after the current cursor.
    CaughtUp,
    /// Retryable failure; call again after `delay`.
    Backoff { delay: Duration, error: FetchError },
}

#[derive(Debug, Clone)]
pub struct PartitionConsumer {
    partition: PartitionId,
    cursor: Cursor,
    options: FetchOptions,
    retry: RetryTracker,
}

impl PartitionConsumer {
    pub fn new(partition: PartitionId, start: Cursor) -> Self {
        Self {
            partition,
            cursor: start,
            options: FetchOptions::default(),
            retry: RetryTracker::default(),
        }
    }

    #[must_use]
    pub fn with_options(mut self, options: FetchOptions) -> Self {
        self.options = options;
        self
    }

    #[must_use]
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry = RetryTracker::new(policy);
        self
    }

    pub fn partition(&self) -> PartitionId {
        self.partition
    }

    /// Where the next fetch resumes.
    pub fn cursor(&self) -> Cursor {
        self.cursor
    }

    /// Fetch the next page, forwarding events and checkpoints to `handler`.
    ///
    /// Receiver errors, permanent errors, cancellation and an exhausted retry
    /// budget are returned as `Err`. The cursor still reflects every
    /// checkpoint `handler` accepted.
    pub fn next_page(
        &mut self,
        publisher: &dyn EventPublisher,
        ctx: &FetchContext,
        handler: &mut dyn EventReceiver,
    ) -> Result<PageOutcome, FetchError> {
        let cursor = self.cursor.to_string();
        let mut tracking = Acknowledging {
            inner: handler,
            acked: None,
        };
        let result =
            publisher.fetch_events(ctx, self.partition, &cursor, &mut tracking, &self.options);

        let acked = tracking.acked;
        if let Some(position) = acked {
            self.cursor = Cursor::At(position);
        }
        // Any completed fetch or acknowledged progress ends a failure run.
        if acked.is_some() || result.is_ok() {
            self.retry.record_success();
        }

        match result {
            Ok(summary) if summary.inspected == 0 => Ok(PageOutcome::CaughtUp),
            Ok(summary) => Ok(PageOutcome::Page(summary)),
            Err(error) if error.is_retryable() => match self.retry.record_failure() {
                RetryDecision::Retry(delay) => {
                    tracing::warn!(
                        partition = self.partition,
                        cursor = %self.cursor,
                        kind = error.kind(),
                        delay_ms = delay.as_millis() as u64,
                        "fetch failed, backing off"
                    );
                    Ok(PageOutcome::Backoff { delay, error })
                }
                RetryDecision::GiveUp { attempts } => {
                    tracing::error!(
                        partition = self.partition,
                        attempts,
                        "retry budget exhausted"
                    );
                    Err(error)
                }
            },
            Err(error) => Err(error),
        }
    }
}

/// Records the last checkpoint the wrapped handler accepted.
struct Acknowledging<'a> {
    inner: &'a mut dyn EventReceiver,
    acked: Option<Position>,
}

impl EventReceiver for Acknowledging<'_> {
    fn event(&mut self, payload: &[u8]) -> Result<(), ReceiverError> {
        self.inner.event(payload)
    }

    fn checkpoint(&mut self, position: Position) -> Result<(), ReceiverError> {
        self.inner.checkpoint(position)?;
        self.acked = Some(position);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::engine::FetchEngine;
    use crate::error::{DiscoveryError, TransientKind};
    use crate::memory::MemoryFeed;
    use crate::receiver::FnReceiver;
    use crate::types::{Event, FeedInfo};

    fn feed(n: u64) -> MemoryFeed {
        let events = (0..n)
            .map(|p| Event::from_value(format!("e{p}"), 0, p, "T", &p).expect("encode"))
            .collect();
        MemoryFeed::builder("f", "t")
            .engine(FetchEngine::new().with_default_page_size(10))
            .partition(0, events)
            .build()
            .expect("feed")
    }

    /// Fails the first `failures` fetches after delivering `partial` events.
    struct Flaky {
        inner: MemoryFeed,
        failures: Mutex<u32>,
        partial: usize,
    }

    impl EventPublisher for Flaky {
        fn name(&self) -> &str {
            "flaky"
        }

        fn feed_info(&self) -> Result<FeedInfo, DiscoveryError> {
            self.inner.feed_info()
        }

        fn fetch_events(
            &self,
            ctx: &FetchContext,
            partition_id: PartitionId,
            cursor: &str,
            receiver: &mut dyn EventReceiver,
            options: &FetchOptions,
        ) -> Result<FetchSummary, FetchError> {
            let mut remaining = self.failures.lock().expect("lock");
            if *remaining == 0 {
                return self
                    .inner
                    .fetch_events(ctx, partition_id, cursor, receiver, options);
            }
            *remaining -= 1;
            let partial = options.clone().with_page_size(self.partial);
            if self.partial > 0 {
                self.inner
                    .fetch_events(ctx, partition_id, cursor, receiver, &partial)?;
            }
            Err(FetchError::Transient(TransientKind::Unavailable))
        }
    }

    fn drain(
        consumer: &mut PartitionConsumer,
        publisher: &dyn EventPublisher,
    ) -> Result<Vec<u64>, FetchError> {
        let mut seen = Vec::new();
        loop {
            let mut handler = FnReceiver::new(
                |_: &[u8]| Ok(()),
                |p: Position| {
                    seen.push(p.get());
                    Ok(())
                },
            );
            match consumer.next_page(publisher, &FetchContext::new(), &mut handler)? {
                PageOutcome::CaughtUp => break,
                PageOutcome::Page(_) | PageOutcome::Backoff { .. } => {}
            }
        }
        Ok(seen)
    }

    #[test]
    fn pages_until_caught_up() {
        let feed = feed(35);
        let mut consumer = PartitionConsumer::new(0, Cursor::First);
        let seen = drain(&mut consumer, &feed).expect("drain");
        assert_eq!(seen, (0..35).collect::<Vec<_>>());
        assert_eq!(consumer.cursor(), Cursor::At(Position(34)));
    }

    #[test]
    fn transient_failure_keeps_acknowledged_progress() {
        let flaky = Flaky {
            inner: feed(30),
            failures: Mutex::new(2),
            partial: 3,
        };
        let mut consumer = PartitionConsumer::new(0, Cursor::First);
        let seen = drain(&mut consumer, &flaky).expect("drain");
        // Each event is seen exactly once despite two failed, partial pages.
        assert_eq!(seen, (0..30).collect::<Vec<_>>());
    }

    #[test]
    fn backoff_reported_then_budget_exhausted() {
        let flaky = Flaky {
            inner: feed(5),
            failures: Mutex::new(10),
            partial: 0,
        };
        let mut consumer = PartitionConsumer::new(0, Cursor::First).with_retry_policy(RetryPolicy {
            initial_backoff_ms: 10,
            multiplier: 2.0,
            max_backoff_ms: 100,
            max_attempts: 2,
        });
        let mut handler = FnReceiver::new(|_: &[u8]| Ok(()), |_| Ok(()));
        let ctx = FetchContext::new();

        let first = consumer.next_page(&flaky, &ctx, &mut handler).expect("backoff");
        assert!(matches!(first, PageOutcome::Backoff { delay, .. } if delay.as_millis() == 10));
        let second = consumer.next_page(&flaky, &ctx, &mut handler).expect("backoff");
        assert!(matches!(second, PageOutcome::Backoff { delay, .. } if delay.as_millis() == 20));
        let err = consumer
            .next_page(&flaky, &ctx, &mut handler)
            .expect_err("give up");
        assert!(matches!(err, FetchError::Transient(TransientKind::Unavailable)));
        assert_eq!(consumer.cursor(), Cursor::First);
    }

    /// Fails every other fetch, starting with the first.
    struct Alternating {
        inner: MemoryFeed,
        calls: Mutex<u32>,
    }

    impl EventPublisher for Alternating {
        fn name(&self) -> &str {
            "alternating"
        }

        fn feed_info(&self) -> Result<FeedInfo, DiscoveryError> {
            self.inner.feed_info()
        }

        fn fetch_events(
            &self,
            ctx: &FetchContext,
            partition_id: PartitionId,
            cursor: &str,
            receiver: &mut dyn EventReceiver,
            options: &FetchOptions,
        ) -> Result<FetchSummary, FetchError> {
            let mut calls = self.calls.lock().expect("lock");
            *calls += 1;
            if *calls % 2 == 1 {
                return Err(FetchError::Transient(TransientKind::Unavailable));
            }
            self.inner
                .fetch_events(ctx, partition_id, cursor, receiver, options)
        }
    }

    #[test]
    fn empty_page_resets_failure_count() {
        let quiet = Alternating {
            inner: feed(0),
            calls: Mutex::new(0),
        };
        let mut consumer = PartitionConsumer::new(0, Cursor::First).with_retry_policy(RetryPolicy {
            initial_backoff_ms: 10,
            multiplier: 2.0,
            max_backoff_ms: 100,
            max_attempts: 2,
        });
        let mut handler = FnReceiver::new(|_: &[u8]| Ok(()), |_| Ok(()));
        let ctx = FetchContext::new();

        for round in 0..4 {
            let failed = consumer
                .next_page(&quiet, &ctx, &mut handler)
                .expect("failures are not consecutive");
            // Delay never grows: each failure is the first of its run.
            assert!(
                matches!(failed, PageOutcome::Backoff { delay, .. } if delay.as_millis() == 10),
                "round {round}: {failed:?}"
            );
            let caught_up = consumer
                .next_page(&quiet, &ctx, &mut handler)
                .expect("caught up");
            assert!(matches!(caught_up, PageOutcome::CaughtUp), "round {round}");
        }
    }

    #[test]
    fn permanent_error_surfaces() {
        let feed = feed(5);
        let mut consumer = PartitionConsumer::new(3, Cursor::First);
        let mut handler = FnReceiver::new(|_: &[u8]| Ok(()), |_| Ok(()));
        let err = consumer
            .next_page(&feed, &FetchContext::new(), &mut handler)
            .expect_err("missing partition");
        assert!(matches!(err, FetchError::PartitionNotFound(3)));
    }

    #[test]
    fn handler_rejection_does_not_advance_cursor() {
        let feed = feed(5);
        let mut consumer = PartitionConsumer::new(0, Cursor::First);
        let mut handler = FnReceiver::new(
            |_: &[u8]| Ok(()),
            |p: Position| {
                if p.get() == 2 {
                    Err("store unavailable".into())
                } else {
                    Ok(())
                }
            },
        );
        let err = consumer
            .next_page(&feed, &FetchContext::new(), &mut handler)
            .expect_err("handler error");
        assert!(matches!(err, FetchError::Receiver(_)));
        assert_eq!(consumer.cursor(), Cursor::At(Position(1)));
    }
}
