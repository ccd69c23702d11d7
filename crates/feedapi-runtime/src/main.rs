//! feedapi: serve and consume partitioned, resumable event feeds.
//!
//! `serve` hosts the payment fixture feed; `discover`, `fetch` and `follow`
//! talk to any feed speaking the same HTTP protocol.

use clap::Parser;

mod checkpoint;
mod cli;
mod commands;
mod follow;
mod serve;
mod shutdown;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = cli::Cli::parse();

    // stdout carries feed data; logs go to stderr.
    let filter = std::env::var("FEEDAPI_LOG")
        .or_else(|_| std::env::var("RUST_LOG"))
        .unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(filter))
        .with_writer(std::io::stderr)
        .init();

    match args.command {
        cli::Command::Serve(opts) => serve::run(opts).await?,
        cli::Command::Discover(opts) => commands::cmd_discover(opts).await?,
        cli::Command::Fetch(opts) => commands::cmd_fetch(opts).await?,
        cli::Command::Follow(opts) => follow::cmd_follow(opts).await?,
    }

    Ok(())
}
