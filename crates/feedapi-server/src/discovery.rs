use axum::Json;
use axum::extract::{Path, State};

use feedapi_core::FeedInfo;

use crate::error::HandlerError;
use crate::router::AppState;

/// `GET /{feed}`: current token and partitions.
pub(crate) async fn discover(
    State(state): State<AppState>,
    Path(feed): Path<String>,
) -> Result<Json<FeedInfo>, HandlerError> {
    let publisher = state.publisher(&feed)?;
    // Publishers may do IO here; keep it off the reactor.
    let info = tokio::task::spawn_blocking(move || publisher.feed_info()).await??;
    tracing::debug!(feed = %feed, token = %info.token, partitions = info.partitions.len(), "discovery");
    Ok(Json(info))
}
