use std::path::PathBuf;

use clap::Parser;

/// Fetch one HTTP resource over a hand-rolled user-space TCP/IP stack.
#[derive(Parser, Debug)]
#[command(name = "rawnet", version, about)]
pub struct Cli {
    /// URL to fetch, e.g. http://example.com/index.html. Only the http scheme is supported.
    pub url: String,

    /// Output file path. Defaults to the last path segment, or index.html if the path ends in
    /// a slash.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Increase log verbosity (-v for debug, -vv for trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Network interface to send and receive on. Defaults to the interface that owns the
    /// default route.
    #[arg(short, long)]
    pub interface: Option<String>,
}
