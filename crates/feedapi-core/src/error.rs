//! Error taxonomy for discovery and fetch.

use std::fmt;

use thiserror::Error;

use crate::types::PartitionId;

/// Error type returned by receivers. Opaque to the engine.
pub type ReceiverError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Kind of retryable failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransientKind {
    /// Upstream server fault (HTTP 502).
    ServerFault,
    /// Upstream timed out (HTTP 504).
    GatewayTimeout,
    /// Connection failure, truncated stream or any other 5xx.
    Unavailable,
}

impl TransientKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ServerFault => "server_fault",
            Self::GatewayTimeout => "gateway_timeout",
            Self::Unavailable => "unavailable",
        }
    }
}

impl fmt::Display for TransientKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("partition {0} does not exist")]
    PartitionNotFound(PartitionId),

    #[error("invalid cursor {cursor:?}")]
    InvalidCursor { cursor: String },

    #[error("transient failure: {0}")]
    Transient(TransientKind),

    #[error("fetch cancelled")]
    Cancelled,

    #[error("fetch deadline exceeded")]
    DeadlineExceeded,

    /// Raised by the receiver; carried through unchanged.
    #[error(transparent)]
    Receiver(ReceiverError),

    #[error("failed to encode event envelope: {0}")]
    Encoding(#[from] serde_json::Error),

    #[error("feed protocol violation: {0}")]
    Protocol(String),
}

impl FetchError {
    pub fn invalid_cursor(cursor: impl Into<String>) -> Self {
        Self::InvalidCursor {
            cursor: cursor.into(),
        }
    }

    /// Retry with backoff from the last acknowledged checkpoint.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_) | Self::DeadlineExceeded)
    }

    /// Retrying without correcting the request cannot succeed.
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            Self::PartitionNotFound(_)
                | Self::InvalidCursor { .. }
                | Self::Encoding(_)
                | Self::Protocol(_)
        )
    }

    /// Stable snake_case tag used in error bodies and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::PartitionNotFound(_) => "partition_not_found",
            Self::InvalidCursor { .. } => "invalid_cursor",
            Self::Transient(kind) => kind.as_str(),
            Self::Cancelled => "cancelled",
            Self::DeadlineExceeded => "deadline_exceeded",
            Self::Receiver(_) => "receiver",
            Self::Encoding(_) => "encoding",
            Self::Protocol(_) => "protocol",
        }
    }
}

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("feed unavailable: {0}")]
    Unavailable(String),

    #[error("malformed discovery response: {0}")]
    Protocol(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("feed {0:?} is already registered")]
    Duplicate(String),

    #[error("feed name must not be empty")]
    EmptyName,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FeedBuildError {
    #[error("partition {0} declared twice")]
    DuplicatePartition(PartitionId),

    #[error("partition {partition}: position {position} does not follow {previous}")]
    NonIncreasingPosition {
        partition: PartitionId,
        previous: u64,
        position: u64,
    },

    #[error("event payload encoding failed: {0}")]
    Payload(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification() {
        assert!(FetchError::Transient(TransientKind::ServerFault).is_retryable());
        assert!(FetchError::DeadlineExceeded.is_retryable());
        assert!(!FetchError::Cancelled.is_retryable());
        assert!(!FetchError::Cancelled.is_permanent());
        assert!(FetchError::PartitionNotFound(3).is_permanent());
        assert!(FetchError::invalid_cursor("x").is_permanent());

        let receiver = FetchError::Receiver("disk full".into());
        assert!(!receiver.is_retryable());
        assert!(!receiver.is_permanent());
    }

    #[test]
    fn receiver_error_is_transparent() {
        let err = FetchError::Receiver("disk full".into());
        assert_eq!(err.to_string(), "disk full");
        assert_eq!(err.kind(), "receiver");
    }

    #[test]
    fn kinds() {
        assert_eq!(
            FetchError::Transient(TransientKind::GatewayTimeout).kind(),
            "gateway_timeout"
        );
        assert_eq!(FetchError::PartitionNotFound(1).kind(), "partition_not_found");
    }
}
