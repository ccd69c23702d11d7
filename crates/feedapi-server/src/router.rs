//! Route table: one discovery and one fetch endpoint per registered feed.

use std::sync::Arc;

use axum::Router;
use axum::routing::get;

use feedapi_core::{EventPublisher, FeedRegistry};

use crate::config::ServerConfig;
use crate::error::HandlerError;
use crate::{discovery, events};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) registry: Arc<FeedRegistry>,
    pub(crate) config: ServerConfig,
}

impl AppState {
    pub(crate) fn publisher(&self, feed: &str) -> Result<Arc<dyn EventPublisher>, HandlerError> {
        self.registry
            .get(feed)
            .ok_or_else(|| HandlerError::UnknownFeed(feed.to_owned()))
    }
}

/// Build the router for every feed in `registry`.
///
/// | Method | Path | Description |
/// |--------|------|-------------|
/// | `GET` | `/{feed}` | Discovery: token and partitions |
/// | `GET` | `/{feed}/events` | Streamed page of events and checkpoints |
pub fn router(registry: FeedRegistry, config: ServerConfig) -> Router {
    let state = AppState {
        registry: Arc::new(registry),
        config,
    };
    Router::new()
        .route("/{feed}", get(discovery::discover))
        .route("/{feed}/events", get(events::fetch_events))
        .with_state(state)
}
