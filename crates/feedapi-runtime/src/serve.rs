//! `feedapi serve`: the payment fixture feed over HTTP.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::net::TcpListener;

use feedapi_core::fixture::payment_feed;
use feedapi_core::{FeedRegistry, FetchEngine};
use feedapi_server::ServerConfig;

use crate::cli::ServeOpts;
use crate::shutdown;

pub async fn run(opts: ServeOpts) -> anyhow::Result<()> {
    let engine = FetchEngine::new()
        .with_default_page_size(opts.default_page_size)
        .with_diagnostics(opts.diagnostics);
    let events = opts.events_per_partition;
    let feed = tokio::task::spawn_blocking(move || payment_feed(events, engine)).await??;
    let registry = FeedRegistry::new().with(Arc::new(feed))?;

    let config = ServerConfig {
        stream_buffer: opts.stream_buffer,
        fetch_timeout: opts.fetch_timeout_ms.map(Duration::from_millis),
    };
    tracing::info!(
        events_per_partition = events,
        default_page_size = opts.default_page_size,
        diagnostics = opts.diagnostics,
        "fixture feed ready"
    );

    let listener = TcpListener::bind(opts.listen)
        .await
        .with_context(|| format!("cannot listen on {}", opts.listen))?;
    feedapi_server::serve(listener, registry, config, shutdown::signal()).await?;
    tracing::info!("feed server stopped");
    Ok(())
}
