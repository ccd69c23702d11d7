//! feedapi-server: HTTP transport for partitioned event feeds.
//!
//! Exposes discovery and streamed fetch endpoints for every feed in a
//! [`FeedRegistry`](feedapi_core::FeedRegistry).

pub mod config;
mod discovery;
pub mod error;
mod events;
pub mod router;

use std::future::Future;

use tokio::net::TcpListener;

use feedapi_core::FeedRegistry;

pub use config::ServerConfig;
pub use error::{HandlerError, fetch_status};
pub use router::router;

/// Serve `registry` on `listener` until `shutdown` resolves.
pub async fn serve<F>(
    listener: TcpListener,
    registry: FeedRegistry,
    config: ServerConfig,
    shutdown: F,
) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let feeds: Vec<String> = registry.names().map(str::to_owned).collect();
    tracing::info!(addr = %listener.local_addr()?, ?feeds, "feed server listening");
    axum::serve(listener, router(registry, config))
        .with_graceful_shutdown(shutdown)
        .await
}
