//! Translation of HTTP outcomes back into feed errors.

use reqwest::StatusCode;
use reqwest::blocking::Response;
use thiserror::Error;

use feedapi_core::wire::ErrorBody;
use feedapi_core::{DiscoveryError, FetchError, PartitionId, TransientKind};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("feed endpoint must not be empty")]
    EmptyEndpoint,

    #[error("http client build failed: {0}")]
    Build(#[from] reqwest::Error),
}

/// Status and decoded error body of a failed response.
fn read_error_body(response: Response) -> (StatusCode, Option<ErrorBody>) {
    let status = response.status();
    let body = response
        .bytes()
        .ok()
        .and_then(|b| serde_json::from_slice::<ErrorBody>(&b).ok());
    (status, body)
}

/// Map a non-success fetch response onto a [`FetchError`].
pub(crate) fn fetch_error(partition: PartitionId, cursor: &str, response: Response) -> FetchError {
    let (status, body) = read_error_body(response);
    classify_fetch_failure(partition, cursor, status, body.as_ref())
}

fn classify_fetch_failure(
    partition: PartitionId,
    cursor: &str,
    status: StatusCode,
    body: Option<&ErrorBody>,
) -> FetchError {
    let kind = body.map(|b| b.kind.as_str());
    match status {
        StatusCode::BAD_REQUEST if kind == Some("invalid_cursor") => {
            FetchError::invalid_cursor(cursor)
        }
        StatusCode::NOT_FOUND if kind == Some("unknown_feed") => {
            FetchError::Protocol(describe(status, body))
        }
        StatusCode::NOT_FOUND => FetchError::PartitionNotFound(partition),
        StatusCode::BAD_GATEWAY => FetchError::Transient(TransientKind::ServerFault),
        StatusCode::GATEWAY_TIMEOUT => FetchError::Transient(TransientKind::GatewayTimeout),
        s if s.is_server_error() => FetchError::Transient(TransientKind::Unavailable),
        _ => FetchError::Protocol(describe(status, body)),
    }
}

/// Map a non-success discovery response onto a [`DiscoveryError`].
pub(crate) fn discovery_error(response: Response) -> DiscoveryError {
    let (status, body) = read_error_body(response);
    let message = describe(status, body.as_ref());
    if status.is_server_error() {
        DiscoveryError::Unavailable(message)
    } else {
        DiscoveryError::Protocol(message)
    }
}

/// Connection-level failure: the request never produced a status.
pub(crate) fn transport_fetch_error(err: &reqwest::Error) -> FetchError {
    tracing::debug!(error = %err, "fetch request failed");
    if err.is_timeout() {
        FetchError::DeadlineExceeded
    } else {
        FetchError::Transient(TransientKind::Unavailable)
    }
}

fn describe(status: StatusCode, body: Option<&ErrorBody>) -> String {
    match body {
        Some(body) => format!("{status}: {}", body.error),
        None => format!("unexpected status {status}"),
    }
}
