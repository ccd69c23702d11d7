//! One-shot client subcommands: `discover` and `fetch`.

use std::io::{self, Write};

use feedapi_client::HttpFeed;
use feedapi_core::wire::{encode_checkpoint_frame, encode_event_frame};
use feedapi_core::{EventPublisher, EventReceiver, FetchContext, Position, ReceiverError};

use crate::cli::{FeedOpts, FetchOpts};

/// `feedapi discover`
pub async fn cmd_discover(opts: FeedOpts) -> anyhow::Result<()> {
    let info = tokio::task::spawn_blocking(move || -> anyhow::Result<_> {
        let feed = HttpFeed::new(opts.url)?;
        Ok(feed.feed_info()?)
    })
    .await??;
    println!("{}", serde_json::to_string_pretty(&info)?);
    Ok(())
}

/// `feedapi fetch`: one page, echoed in wire framing.
pub async fn cmd_fetch(opts: FetchOpts) -> anyhow::Result<()> {
    let summary = tokio::task::spawn_blocking(move || -> anyhow::Result<_> {
        let feed = HttpFeed::new(opts.feed.url)?;
        let mut out = FrameWriter::new(io::stdout().lock());
        let summary = feed.fetch_events(
            &FetchContext::new(),
            opts.partition,
            &opts.cursor,
            &mut out,
            &opts.page.options(),
        )?;
        out.into_inner().flush()?;
        Ok(summary)
    })
    .await??;

    tracing::info!(
        delivered = summary.delivered,
        inspected = summary.inspected,
        next_cursor = ?summary.last_checkpoint.map(|p| p.to_string()),
        "page fetched"
    );
    Ok(())
}

/// Writes every frame it receives to `out` as NDJSON.
pub(crate) struct FrameWriter<W> {
    out: W,
}

impl<W: Write> FrameWriter<W> {
    pub(crate) fn new(out: W) -> Self {
        Self { out }
    }

    pub(crate) fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> EventReceiver for FrameWriter<W> {
    fn event(&mut self, payload: &[u8]) -> Result<(), ReceiverError> {
        self.out.write_all(&encode_event_frame(payload))?;
        Ok(())
    }

    fn checkpoint(&mut self, position: Position) -> Result<(), ReceiverError> {
        self.out.write_all(&encode_checkpoint_frame(position))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use feedapi_core::fixture::payment_feed;
    use feedapi_core::{FetchEngine, FetchOptions};

    use super::*;

    #[test]
    fn frame_writer_emits_wire_frames() {
        let feed = payment_feed(4, FetchEngine::new()).unwrap();
        let mut out = FrameWriter::new(Vec::new());
        feed.fetch_events(
            &FetchContext::new(),
            0,
            "first",
            &mut out,
            &FetchOptions::default().with_page_size(1),
        )
        .unwrap();
        let text = String::from_utf8(out.into_inner()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with(r#"{"event":{"id":"00000000-0000-0000-0000-000000000000""#));
        assert_eq!(lines[1], r#"{"checkpoint":"0"}"#);
    }
}
