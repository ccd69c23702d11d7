//! Mapping of fetch and discovery failures onto HTTP responses.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tokio::task::JoinError;

use feedapi_core::wire::ErrorBody;
use feedapi_core::{DiscoveryError, FetchError, TransientKind};

#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("feed {0:?} is not registered")]
    UnknownFeed(String),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    #[error("feed task failed: {0}")]
    Task(#[from] JoinError),
}

impl HandlerError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::UnknownFeed(_) => StatusCode::NOT_FOUND,
            Self::Fetch(err) => fetch_status(err),
            Self::Discovery(_) | Self::Task(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::UnknownFeed(_) => "unknown_feed",
            Self::Fetch(err) => err.kind(),
            Self::Discovery(_) => "discovery",
            Self::Task(_) => "internal",
        }
    }
}

/// HTTP status for a fetch failure reported before any frame was sent.
pub fn fetch_status(err: &FetchError) -> StatusCode {
    match err {
        FetchError::PartitionNotFound(_) => StatusCode::NOT_FOUND,
        FetchError::InvalidCursor { .. } => StatusCode::BAD_REQUEST,
        FetchError::Transient(TransientKind::ServerFault) => StatusCode::BAD_GATEWAY,
        FetchError::Transient(TransientKind::GatewayTimeout) | FetchError::DeadlineExceeded => {
            StatusCode::GATEWAY_TIMEOUT
        }
        FetchError::Transient(TransientKind::Unavailable) | FetchError::Cancelled => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        FetchError::Receiver(_) | FetchError::Encoding(_) | FetchError::Protocol(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl IntoResponse for HandlerError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::warn!(kind = self.kind(), error = %self, "request failed");
        } else {
            tracing::debug!(kind = self.kind(), error = %self, "request rejected");
        }
        let body = ErrorBody {
            error: self.to_string(),
            kind: self.kind().to_owned(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_status_table() {
        let cases = [
            (FetchError::PartitionNotFound(1), StatusCode::NOT_FOUND),
            (FetchError::invalid_cursor("x"), StatusCode::BAD_REQUEST),
            (
                FetchError::Transient(TransientKind::ServerFault),
                StatusCode::BAD_GATEWAY,
            ),
            (
                FetchError::Transient(TransientKind::GatewayTimeout),
                StatusCode::GATEWAY_TIMEOUT,
            ),
            (FetchError::DeadlineExceeded, StatusCode::GATEWAY_TIMEOUT),
            (FetchError::Cancelled, StatusCode::SERVICE_UNAVAILABLE),
            (
                FetchError::Receiver("x".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(fetch_status(&err), status, "{err:?}");
        }
    }

    #[test]
    fn unknown_feed_is_not_found() {
        let err = HandlerError::UnknownFeed("nope".into());
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        assert_eq!(err.kind(), "unknown_feed");
    }
}
