//! Transcript Relay - a small HTTP service that fetches YouTube transcripts
//!
//! Transcripts are acquired through an ordered chain of strategies (the direct
//! caption API first, then `yt-dlp`). The first strategy that succeeds wins; when
//! every strategy fails the caller receives an aggregated failure report and is
//! invited to upload the transcript manually.

pub mod cli;
pub mod config;
pub mod output;
pub mod pipeline;
pub mod server;
pub mod strategies;
pub mod utils;

pub use cli::{Cli, Commands};
pub use config::Config;
pub use pipeline::{Acquisition, AttemptReport, FetchError, TranscriptPipeline};
pub use strategies::{
    CaptionEntry, FailureKind, StrategyChain, StrategyFailure, Transcript, TranscriptStrategy,
};

/// Result type used throughout the library
pub type Result<T> = anyhow::Result<T>;

/// Error types specific to the relay
#[derive(thiserror::Error, Debug)]
pub enum RelayError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: std::net::SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("Server error: {0}")]
    Server(String),
}
