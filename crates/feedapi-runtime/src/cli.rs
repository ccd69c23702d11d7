//! CLI definition using clap derive.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use feedapi_core::engine::ENGINE_DEFAULT_PAGE_SIZE;
use feedapi_core::fixture::FIXTURE_EVENTS_PER_PARTITION;
use feedapi_core::{Cursor, FetchOptions};
use feedapi_server::config::DEFAULT_STREAM_BUFFER;

#[derive(Parser)]
#[command(name = "feedapi", about = "Serve and consume partitioned, resumable event feeds")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Serve the payment fixture feed over HTTP
    Serve(ServeOpts),
    /// Print a feed's token and partitions
    Discover(FeedOpts),
    /// Fetch one page of a partition and print its frames (NDJSON)
    Fetch(FetchOpts),
    /// Consume every partition, persisting cursors to a checkpoint file
    Follow(FollowOpts),
}

#[derive(clap::Args)]
pub struct ServeOpts {
    /// Listen address
    #[arg(long, env = "FEEDAPI_LISTEN", default_value = "127.0.0.1:8080")]
    pub listen: SocketAddr,

    /// Honour the `_fault_500` / `_fault_504` diagnostic cursors
    #[arg(long)]
    pub diagnostics: bool,

    /// Page size used when a request carries no hint
    #[arg(long, default_value_t = ENGINE_DEFAULT_PAGE_SIZE)]
    pub default_page_size: usize,

    /// Events generated in each fixture partition
    #[arg(long, default_value_t = FIXTURE_EVENTS_PER_PARTITION)]
    pub events_per_partition: u64,

    /// Abort fetches that run longer than this
    #[arg(long)]
    pub fetch_timeout_ms: Option<u64>,

    /// Frames buffered per response before the engine waits for the client
    #[arg(long, default_value_t = DEFAULT_STREAM_BUFFER)]
    pub stream_buffer: usize,
}

#[derive(clap::Args)]
pub struct FeedOpts {
    /// Base URL of the feed
    #[arg(long = "feed", env = "FEEDAPI_FEED_URL", default_value = "http://127.0.0.1:8080/testfeed")]
    pub url: String,
}

#[derive(clap::Args, Default)]
pub struct PageOpts {
    /// Page size hint sent to the feed
    #[arg(long)]
    pub page_size: Option<usize>,

    /// Only deliver these event types (comma-separated)
    #[arg(long, value_delimiter = ',')]
    pub types: Vec<String>,
}

impl PageOpts {
    pub fn options(&self) -> FetchOptions {
        FetchOptions::default()
            .with_page_size(self.page_size.unwrap_or(0))
            .with_event_types(self.types.iter().map(|t| t.trim()).filter(|t| !t.is_empty()))
    }
}

#[derive(clap::Args)]
pub struct FetchOpts {
    #[command(flatten)]
    pub feed: FeedOpts,

    #[arg(long)]
    pub partition: u32,

    /// `first`, `last` or a checkpoint
    #[arg(long, default_value = "first")]
    pub cursor: String,

    #[command(flatten)]
    pub page: PageOpts,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum StartFrom {
    #[default]
    First,
    Last,
}

impl StartFrom {
    pub fn cursor(self) -> Cursor {
        match self {
            Self::First => Cursor::First,
            Self::Last => Cursor::Last,
        }
    }
}

#[derive(clap::Args)]
pub struct FollowOpts {
    #[command(flatten)]
    pub feed: FeedOpts,

    #[command(flatten)]
    pub page: PageOpts,

    /// Where per-partition cursors are stored
    #[arg(long, default_value = "feedapi-checkpoints.json")]
    pub checkpoint_file: PathBuf,

    /// Start point for partitions without a stored cursor
    #[arg(long, value_enum, default_value_t = StartFrom::First)]
    pub from: StartFrom,

    /// Keep polling after catching up
    #[arg(long)]
    pub follow: bool,

    /// Delay between polls in follow mode
    #[arg(long, default_value = "1000")]
    pub poll_interval_ms: u64,
}
