//! feedapi-client: consume a remote feed over HTTP.
//!
//! [`HttpFeed`] implements [`EventPublisher`](feedapi_core::EventPublisher),
//! so the consumer driver in `feedapi-core` works unchanged against a feed
//! served by `feedapi-server`. Statuses map back onto the same error kinds the
//! server produced them from; a stream that ends without a clean terminator is
//! reported as a transient failure after the frames already delivered.

mod error;
pub mod feed;

pub use error::ClientError;
pub use feed::HttpFeed;
