//! `GET /{feed}/events`: drives the synchronous engine on a blocking thread
//! and streams its frames as they are produced.
//!
//! The response status is chosen by whichever arrives first: a frame (200,
//! streaming) or the fetch outcome (200 empty page, or the mapped error). Once
//! streaming has started, a failure can only be reported by aborting the body
//! without a clean end, which the client sees as a truncated stream.

use std::io;

use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::header::CONTENT_TYPE;
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::DropGuard;

use feedapi_core::wire::{
    FetchQuery, NDJSON_CONTENT_TYPE, encode_checkpoint_frame, encode_event_frame,
};
use feedapi_core::{
    EventReceiver, FetchContext, FetchError, FetchSummary, PartitionId, Position, ReceiverError,
};

use crate::error::HandlerError;
use crate::router::AppState;

type FetchResult = Result<FetchSummary, HandlerError>;

pub(crate) async fn fetch_events(
    State(state): State<AppState>,
    Path(feed): Path<String>,
    Query(query): Query<FetchQuery>,
) -> Result<Response, HandlerError> {
    let publisher = state.publisher(&feed)?;
    let options = query.options();

    let ctx = match state.config.fetch_timeout {
        Some(timeout) => FetchContext::new().with_timeout(timeout),
        None => FetchContext::new(),
    };
    // Dropping the response (client gone) cancels the fetch.
    let cancel_on_drop = ctx.cancellation_token().clone().drop_guard();

    let (tx, mut frames) = mpsc::channel::<Bytes>(state.config.stream_buffer.max(1));
    let partition = query.partition;
    let cursor = query.cursor.clone();
    let mut task = tokio::task::spawn_blocking(move || {
        let mut receiver = ChannelReceiver { tx };
        publisher.fetch_events(&ctx, partition, &cursor, &mut receiver, &options)
    });

    let head = tokio::select! {
        biased;
        Some(frame) = frames.recv() => Head::Frame(frame),
        joined = &mut task => Head::Done(flatten(joined)),
    };

    let (first, outcome) = match head {
        Head::Frame(frame) => (frame, Outcome::Pending(task)),
        Head::Done(result) => match frames.try_recv() {
            // Frames sent just before the task finished.
            Ok(frame) => (frame, Outcome::Ready(result)),
            Err(_) => {
                let summary = result?;
                log_completed(&feed, partition, &query.cursor, &summary);
                return Ok(ndjson(Body::empty()));
            }
        },
    };

    let stream = FrameStream {
        feed,
        partition,
        cursor: query.cursor,
        first: Some(first),
        frames,
        outcome,
        _cancel_on_drop: cancel_on_drop,
    };
    let body = Body::from_stream(futures_util::stream::unfold(stream, next_chunk));
    Ok(ndjson(body))
}

fn ndjson(body: Body) -> Response {
    ([(CONTENT_TYPE, NDJSON_CONTENT_TYPE)], body).into_response()
}

fn flatten(joined: Result<Result<FetchSummary, FetchError>, tokio::task::JoinError>) -> FetchResult {
    Ok(joined??)
}

fn log_completed(feed: &str, partition: PartitionId, cursor: &str, summary: &FetchSummary) {
    tracing::debug!(
        feed,
        partition,
        cursor,
        delivered = summary.delivered,
        inspected = summary.inspected,
        "page served"
    );
}

// ─── Streaming ───────────────────────────────────────────────────────

enum Head {
    Frame(Bytes),
    Done(FetchResult),
}

enum Outcome {
    Pending(JoinHandle<Result<FetchSummary, FetchError>>),
    Ready(FetchResult),
    Finished,
}

struct FrameStream {
    feed: String,
    partition: PartitionId,
    cursor: String,
    first: Option<Bytes>,
    frames: mpsc::Receiver<Bytes>,
    outcome: Outcome,
    _cancel_on_drop: DropGuard,
}

async fn next_chunk(mut s: FrameStream) -> Option<(io::Result<Bytes>, FrameStream)> {
    if let Some(frame) = s.first.take() {
        return Some((Ok(frame), s));
    }
    if let Some(frame) = s.frames.recv().await {
        return Some((Ok(frame), s));
    }

    // Channel closed: the fetch has returned.
    let result = match std::mem::replace(&mut s.outcome, Outcome::Finished) {
        Outcome::Pending(task) => flatten(task.await),
        Outcome::Ready(result) => result,
        Outcome::Finished => return None,
    };
    match result {
        Ok(summary) => {
            log_completed(&s.feed, s.partition, &s.cursor, &summary);
            None
        }
        Err(err) => {
            tracing::warn!(
                feed = %s.feed,
                partition = s.partition,
                cursor = %s.cursor,
                kind = err.kind(),
                error = %err,
                "fetch failed mid-stream, aborting response"
            );
            Some((Err(io::Error::other(err)), s))
        }
    }
}

// ─── Receiver ────────────────────────────────────────────────────────

#[derive(Debug, Error)]
#[error("response stream closed by client")]
struct StreamClosed;

/// Forwards frames to the response body. Blocks while the buffer is full, so
/// a slow client throttles the engine.
struct ChannelReceiver {
    tx: mpsc::Sender<Bytes>,
}

impl ChannelReceiver {
    fn send(&self, frame: Vec<u8>) -> Result<(), ReceiverError> {
        self.tx
            .blocking_send(Bytes::from(frame))
            .map_err(|_| Box::new(StreamClosed) as ReceiverError)
    }
}

impl EventReceiver for ChannelReceiver {
    fn event(&mut self, payload: &[u8]) -> Result<(), ReceiverError> {
        self.send(encode_event_frame(payload))
    }

    fn checkpoint(&mut self, position: Position) -> Result<(), ReceiverError> {
        self.send(encode_checkpoint_frame(position))
    }
}
