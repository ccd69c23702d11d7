//! Fetch engine: one synchronous, bounded pass over a partition.
//!
//! The engine owns no state between calls. All resumption state lives in the
//! cursor the caller passes in and the checkpoints it receives.

use crate::context::FetchContext;
use crate::cursor::Cursor;
use crate::error::FetchError;
use crate::receiver::EventReceiver;
use crate::types::{Event, FetchOptions, FetchSummary};

// ─── Constants ───────────────────────────────────────────────────────

/// Page size used when the caller passes the "default" sentinel.
pub const ENGINE_DEFAULT_PAGE_SIZE: usize = 100;

// ─── Engine ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchEngine {
    default_page_size: usize,
    diagnostics: bool,
}

impl FetchEngine {
    /// Engine with the default page size and diagnostic cursors disabled.
    pub fn new() -> Self {
        Self {
            default_page_size: ENGINE_DEFAULT_PAGE_SIZE,
            diagnostics: false,
        }
    }

    /// Zero is ignored: the default must stay positive.
    #[must_use]
    pub fn with_default_page_size(mut self, page_size: usize) -> Self {
        if page_size > 0 {
            self.default_page_size = page_size;
        }
        self
    }

    /// Enable the fault-injection cursors (`_fault_500`, `_fault_504`).
    #[must_use]
    pub fn with_diagnostics(mut self, enabled: bool) -> Self {
        self.diagnostics = enabled;
        self
    }

    pub fn default_page_size(&self) -> usize {
        self.default_page_size
    }

    pub fn diagnostics(&self) -> bool {
        self.diagnostics
    }

    pub fn parse_cursor(&self, raw: &str) -> Result<Cursor, FetchError> {
        Cursor::parse(raw, self.diagnostics)
    }

    fn page_size(&self, options: &FetchOptions) -> usize {
        if options.page_size_hint == 0 {
            self.default_page_size
        } else {
            options.page_size_hint
        }
    }

    /// Fetch one page from `events`, which must be sorted by strictly
    /// increasing position.
    ///
    /// Events after the resolved cursor are visited in order. Each event that
    /// passes the type filter is delivered, and every visited event is
    /// checkpointed whether delivered or not. Only delivered events count
    /// toward the page size. The first receiver error aborts the fetch.
    pub fn fetch(
        &self,
        ctx: &FetchContext,
        events: &[Event],
        cursor: Cursor,
        receiver: &mut dyn EventReceiver,
        options: &FetchOptions,
    ) -> Result<FetchSummary, FetchError> {
        let after = cursor.resolve(events)?;
        let start = match after {
            Some(p) => events.partition_point(|e| e.position() <= p),
            None => 0,
        };
        let page_size = self.page_size(options);

        let mut summary = FetchSummary::default();
        for event in &events[start..] {
            if summary.delivered >= page_size {
                break;
            }

            if options.accepts(event.event_type()) {
                let wire = event.to_wire()?;
                ctx.check()?;
                receiver.event(&wire).map_err(FetchError::Receiver)?;
                summary.delivered += 1;
            }

            ctx.check()?;
            receiver
                .checkpoint(event.position())
                .map_err(FetchError::Receiver)?;
            summary.inspected += 1;
            summary.last_checkpoint = Some(event.position());
        }

        tracing::debug!(
            cursor = %cursor,
            delivered = summary.delivered,
            inspected = summary.inspected,
            "fetch completed"
        );
        Ok(summary)
    }
}

impl Default for FetchEngine {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ReceiverError, TransientKind};
    use crate::types::{EventEnvelope, Position};

    // ── Test Helpers ─────────────────────────────────────────────────

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Call {
        Event(String),
        Checkpoint(u64),
    }

    #[derive(Default)]
    struct Recorder {
        calls: Vec<Call>,
        fail_event_at: Option<usize>,
        fail_checkpoint_at: Option<u64>,
        cancel_after_events: Option<(usize, FetchContext)>,
    }

    impl Recorder {
        fn delivered_ids(&self) -> Vec<String> {
            self.calls
                .iter()
                .filter_map(|c| match c {
                    Call::Event(id) => Some(id.clone()),
                    Call::Checkpoint(_) => None,
                })
                .collect()
        }

        fn checkpoints(&self) -> Vec<u64> {
            self.calls
                .iter()
                .filter_map(|c| match c {
                    Call::Checkpoint(p) => Some(*p),
                    Call::Event(_) => None,
                })
                .collect()
        }
    }

    impl EventReceiver for Recorder {
        fn event(&mut self, payload: &[u8]) -> Result<(), ReceiverError> {
            let envelope: EventEnvelope = serde_json::from_slice(payload)?;
            if self.fail_event_at == Some(self.delivered_ids().len()) {
                return Err("sink rejected event".into());
            }
            self.calls.push(Call::Event(envelope.id));
            if let Some((n, ctx)) = &self.cancel_after_events {
                if self.delivered_ids().len() == *n {
                    ctx.cancel();
                }
            }
            Ok(())
        }

        fn checkpoint(&mut self, position: Position) -> Result<(), ReceiverError> {
            if self.fail_checkpoint_at == Some(position.get()) {
                return Err("checkpoint store offline".into());
            }
            self.calls.push(Call::Checkpoint(position.get()));
            Ok(())
        }
    }

    fn event(position: u64, event_type: &str) -> Event {
        Event::from_value(format!("e{position}"), 0, position, event_type, &position)
            .expect("encode")
    }

    fn partition(n: u64) -> Vec<Event> {
        (0..n).map(|p| event(p, "A")).collect()
    }

    fn run(
        engine: &FetchEngine,
        events: &[Event],
        cursor: &str,
        options: &FetchOptions,
    ) -> (Result<FetchSummary, FetchError>, Recorder) {
        let mut rec = Recorder::default();
        let result = engine
            .parse_cursor(cursor)
            .and_then(|c| engine.fetch(&FetchContext::new(), events, c, &mut rec, options));
        (result, rec)
    }

    // ── Ordering & Paging ────────────────────────────────────────────

    #[test]
    fn first_cursor_starts_at_lowest_position() {
        let events = partition(250);
        let (result, rec) = run(&FetchEngine::new(), &events, "first", &FetchOptions::default());
        let summary = result.expect("fetch");
        assert_eq!(summary.delivered, 100);
        assert_eq!(summary.inspected, 100);
        assert_eq!(summary.last_checkpoint, Some(Position(99)));
        assert_eq!(rec.checkpoints().first(), Some(&0));
    }

    #[test]
    fn event_precedes_its_checkpoint() {
        let events = partition(2);
        let (_, rec) = run(&FetchEngine::new(), &events, "first", &FetchOptions::default());
        assert_eq!(
            rec.calls,
            vec![
                Call::Event("e0".into()),
                Call::Checkpoint(0),
                Call::Event("e1".into()),
                Call::Checkpoint(1),
            ]
        );
    }

    #[test]
    fn numeric_cursor_is_exclusive() {
        let events = partition(10);
        let (_, rec) = run(&FetchEngine::new(), &events, "4", &FetchOptions::default());
        assert_eq!(rec.checkpoints(), vec![5, 6, 7, 8, 9]);
    }

    #[test]
    fn cursor_inside_a_gap() {
        let events = vec![event(10, "A"), event(20, "A"), event(30, "A")];
        let (_, rec) = run(&FetchEngine::new(), &events, "15", &FetchOptions::default());
        assert_eq!(rec.checkpoints(), vec![20, 30]);
    }

    #[test]
    fn last_cursor_returns_only_freshest_event() {
        let events = partition(50);
        let (result, rec) = run(&FetchEngine::new(), &events, "last", &FetchOptions::default());
        assert_eq!(result.expect("fetch").delivered, 1);
        assert_eq!(rec.delivered_ids(), vec!["e49"]);
    }

    #[test]
    fn explicit_page_size_overrides_default() {
        let events = partition(30);
        let options = FetchOptions::default().with_page_size(7);
        let (result, _) = run(&FetchEngine::new(), &events, "first", &options);
        assert_eq!(result.expect("fetch").delivered, 7);

        let engine = FetchEngine::new().with_default_page_size(12);
        let (result, _) = run(&engine, &events, "first", &FetchOptions::default());
        assert_eq!(result.expect("fetch").delivered, 12);
    }

    #[test]
    fn zero_default_page_size_is_ignored() {
        let engine = FetchEngine::new().with_default_page_size(0);
        assert_eq!(engine.default_page_size(), ENGINE_DEFAULT_PAGE_SIZE);
    }

    #[test]
    fn exhausted_partition_is_not_an_error() {
        let events = partition(3);
        let (result, rec) = run(&FetchEngine::new(), &events, "2", &FetchOptions::default());
        assert_eq!(result.expect("fetch"), FetchSummary::default());
        assert!(rec.calls.is_empty());

        let (result, _) = run(&FetchEngine::new(), &[], "first", &FetchOptions::default());
        assert_eq!(result.expect("fetch").inspected, 0);
    }

    #[test]
    fn resume_from_checkpoint_is_monotonic() {
        let events = partition(25);
        let options = FetchOptions::default().with_page_size(10);
        let engine = FetchEngine::new();
        let (first, _) = run(&engine, &events, "first", &options);
        let cp = first.expect("fetch").last_checkpoint.expect("checkpoint");
        let (_, rec) = run(&engine, &events, &cp.to_string(), &options);
        assert!(rec.checkpoints().iter().all(|&p| p > cp.get()));
        assert_eq!(rec.checkpoints().first(), Some(&10));
    }

    #[test]
    fn same_cursor_yields_identical_output() {
        let events = partition(40);
        let options = FetchOptions::default().with_page_size(15);
        let engine = FetchEngine::new();
        let (_, a) = run(&engine, &events, "12", &options);
        let (_, b) = run(&engine, &events, "12", &options);
        assert_eq!(a.calls, b.calls);
    }

    // ── Type Filter ──────────────────────────────────────────────────

    #[test]
    fn filtered_events_are_checkpointed_but_not_counted() {
        // A B B A B A B B A  -> four A events spread over nine positions
        let types = ["A", "B", "B", "A", "B", "A", "B", "B", "A", "B"];
        let events: Vec<Event> = types
            .iter()
            .enumerate()
            .map(|(i, t)| event(i as u64, t))
            .collect();
        let options = FetchOptions::default()
            .with_page_size(4)
            .with_event_types(["A"]);
        let (result, rec) = run(&FetchEngine::new(), &events, "first", &options);
        let summary = result.expect("fetch");

        assert_eq!(summary.delivered, 4);
        assert_eq!(summary.inspected, 9);
        assert_eq!(summary.last_checkpoint, Some(Position(8)));
        assert_eq!(rec.delivered_ids(), vec!["e0", "e3", "e5", "e8"]);
        assert_eq!(rec.checkpoints(), (0..9).collect::<Vec<_>>());
    }

    #[test]
    fn filter_matching_nothing_scans_to_the_end() {
        let events = partition(300);
        let options = FetchOptions::default().with_event_types(["Z"]);
        let (result, rec) = run(&FetchEngine::new(), &events, "first", &options);
        let summary = result.expect("fetch");
        assert_eq!(summary.delivered, 0);
        assert_eq!(summary.inspected, 300);
        assert!(rec.delivered_ids().is_empty());
    }

    // ── Errors ───────────────────────────────────────────────────────

    #[test]
    fn malformed_cursor_delivers_nothing() {
        let events = partition(5);
        let (result, rec) = run(
            &FetchEngine::new(),
            &events,
            "not-a-number",
            &FetchOptions::default(),
        );
        assert!(matches!(result, Err(FetchError::InvalidCursor { .. })));
        assert!(rec.calls.is_empty());
    }

    #[test]
    fn diagnostic_cursors_fail_without_output() {
        let engine = FetchEngine::new().with_diagnostics(true);
        let events = partition(5);
        for (cursor, kind) in [
            ("_fault_500", TransientKind::ServerFault),
            ("_fault_504", TransientKind::GatewayTimeout),
        ] {
            let (result, rec) = run(&engine, &events, cursor, &FetchOptions::default());
            assert!(matches!(result, Err(FetchError::Transient(k)) if k == kind));
            assert!(rec.calls.is_empty());
        }
    }

    #[test]
    fn diagnostic_cursors_disabled_by_default() {
        let (result, _) = run(
            &FetchEngine::new(),
            &partition(5),
            "_fault_500",
            &FetchOptions::default(),
        );
        assert!(matches!(result, Err(FetchError::InvalidCursor { .. })));
    }

    #[test]
    fn receiver_event_error_aborts() {
        let events = partition(10);
        let mut rec = Recorder {
            fail_event_at: Some(3),
            ..Recorder::default()
        };
        let err = FetchEngine::new()
            .fetch(
                &FetchContext::new(),
                &events,
                Cursor::First,
                &mut rec,
                &FetchOptions::default(),
            )
            .expect_err("receiver failure");
        assert!(matches!(err, FetchError::Receiver(_)));
        assert_eq!(err.to_string(), "sink rejected event");
        assert_eq!(rec.checkpoints(), vec![0, 1, 2]);
    }

    #[test]
    fn receiver_checkpoint_error_aborts() {
        let events = partition(10);
        let mut rec = Recorder {
            fail_checkpoint_at: Some(2),
            ..Recorder::default()
        };
        let err = FetchEngine::new()
            .fetch(
                &FetchContext::new(),
                &events,
                Cursor::First,
                &mut rec,
                &FetchOptions::default(),
            )
            .expect_err("receiver failure");
        assert_eq!(err.to_string(), "checkpoint store offline");
        assert_eq!(rec.delivered_ids(), vec!["e0", "e1", "e2"]);
        assert_eq!(rec.checkpoints(), vec![0, 1]);
    }

    // ── Cancellation ─────────────────────────────────────────────────

    #[test]
    fn cancelled_context_stops_before_any_delivery() {
        let ctx = FetchContext::new();
        ctx.cancel();
        let mut rec = Recorder::default();
        let err = FetchEngine::new()
            .fetch(&ctx, &partition(5), Cursor::First, &mut rec, &FetchOptions::default())
            .expect_err("cancelled");
        assert!(matches!(err, FetchError::Cancelled));
        assert!(rec.calls.is_empty());
    }

    #[test]
    fn cancellation_mid_page_stops_promptly() {
        let ctx = FetchContext::new();
        let mut rec = Recorder {
            cancel_after_events: Some((2, ctx.clone())),
            ..Recorder::default()
        };
        let err = FetchEngine::new()
            .fetch(&ctx, &partition(10), Cursor::First, &mut rec, &FetchOptions::default())
            .expect_err("cancelled");
        assert!(matches!(err, FetchError::Cancelled));
        // The second event is delivered; its checkpoint is not.
        assert_eq!(rec.delivered_ids(), vec!["e0", "e1"]);
        assert_eq!(rec.checkpoints(), vec![0]);
    }
}
