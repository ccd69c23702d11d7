//! [`HttpFeed`]: a remote feed behind the HTTP wire protocol.

use std::io::{self, BufRead, BufReader};

use reqwest::blocking::Client;

use feedapi_core::wire::{EVENTS_PATH, FetchQuery, Frame};
use feedapi_core::{
    DiscoveryError, EventPublisher, EventReceiver, FeedInfo, FetchContext, FetchError,
    FetchOptions, FetchSummary, PartitionId, Position, TransientKind,
};

use crate::error::{ClientError, discovery_error, fetch_error, transport_fetch_error};

/// Blocking client for one feed, addressed by its base URL
/// (e.g. `http://127.0.0.1:8080/testfeed`).
///
/// Consumers drive it through [`EventPublisher`] exactly like an in-process
/// feed. Must not be created or dropped on an async executor thread.
#[derive(Debug, Clone)]
pub struct HttpFeed {
    client: Client,
    endpoint: String,
    name: String,
}

impl HttpFeed {
    pub fn new(endpoint: impl Into<String>) -> Result<Self, ClientError> {
        let endpoint = endpoint.into().trim().trim_end_matches('/').to_owned();
        if endpoint.is_empty() {
            return Err(ClientError::EmptyEndpoint);
        }
        let client = Client::builder().build()?;
        let name = endpoint
            .rsplit('/')
            .next()
            .unwrap_or_default()
            .to_owned();
        Ok(Self {
            client,
            endpoint,
            name,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn events_url(&self) -> String {
        format!("{}/{EVENTS_PATH}", self.endpoint)
    }
}

impl EventPublisher for HttpFeed {
    fn name(&self) -> &str {
        &self.name
    }

    fn feed_info(&self) -> Result<FeedInfo, DiscoveryError> {
        let response = self
            .client
            .get(&self.endpoint)
            .send()
            .map_err(|err| DiscoveryError::Unavailable(format!("discovery request failed: {err}")))?;
        if !response.status().is_success() {
            return Err(discovery_error(response));
        }
        response
            .json::<FeedInfo>()
            .map_err(|err| DiscoveryError::Protocol(format!("discovery decode failed: {err}")))
    }

    fn fetch_events(
        &self,
        ctx: &FetchContext,
        partition_id: PartitionId,
        cursor: &str,
        receiver: &mut dyn EventReceiver,
        options: &FetchOptions,
    ) -> Result<FetchSummary, FetchError> {
        ctx.check()?;
        let query = FetchQuery::new(partition_id, cursor, options);
        let mut request = self.client.get(self.events_url()).query(&query);
        if let Some(remaining) = ctx.remaining() {
            request = request.timeout(remaining);
        }
        let response = request.send().map_err(|err| transport_fetch_error(&err))?;
        if !response.status().is_success() {
            return Err(fetch_error(partition_id, cursor, response));
        }

        let mut reader = BufReader::new(response);
        let mut summary = FetchSummary::default();
        let mut line = Vec::new();
        loop {
            line.clear();
            let read = reader
                .read_until(b'\n', &mut line)
                .map_err(|err| stream_error(partition_id, &summary, &err))?;
            if read == 0 {
                break;
            }
            if line.last() != Some(&b'\n') {
                tracing::warn!(partition = partition_id, "stream ended mid-frame");
                return Err(FetchError::Transient(TransientKind::Unavailable));
            }

            let frame = Frame::decode(&line)
                .map_err(|err| FetchError::Protocol(format!("undecodable frame: {err}")))?;
            ctx.check()?;
            match frame {
                Frame::Event(envelope) => {
                    receiver
                        .event(envelope.get().as_bytes())
                        .map_err(FetchError::Receiver)?;
                    summary.delivered += 1;
                }
                Frame::Checkpoint(raw) => {
                    let position = raw.parse::<Position>().map_err(|_| {
                        FetchError::Protocol(format!("non-numeric checkpoint {raw:?}"))
                    })?;
                    receiver
                        .checkpoint(position)
                        .map_err(FetchError::Receiver)?;
                    summary.inspected += 1;
                    summary.last_checkpoint = Some(position);
                }
            }
        }

        tracing::debug!(
            feed = %self.name,
            partition = partition_id,
            cursor,
            delivered = summary.delivered,
            inspected = summary.inspected,
            "page received"
        );
        Ok(summary)
    }
}

/// A body that fails while reading was cut short by the server or the network.
fn stream_error(partition: PartitionId, summary: &FetchSummary, err: &io::Error) -> FetchError {
    tracing::warn!(
        partition,
        received = summary.inspected,
        error = %err,
        "fetch stream truncated"
    );
    if err.kind() == io::ErrorKind::TimedOut {
        FetchError::DeadlineExceeded
    } else {
        FetchError::Transient(TransientKind::Unavailable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_is_last_path_segment() {
        let feed = HttpFeed::new("http://localhost:8080/payments/").expect("feed");
        assert_eq!(feed.name(), "payments");
        assert_eq!(feed.endpoint(), "http://localhost:8080/payments");
        assert_eq!(feed.events_url(), "http://localhost:8080/payments/events");
    }

    #[test]
    fn empty_endpoint_rejected() {
        assert!(matches!(
            HttpFeed::new("  "),
            Err(ClientError::EmptyEndpoint)
        ));
    }
}
