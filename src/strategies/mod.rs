use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

pub mod caption_api;
pub mod yt_dlp;

use crate::config::Config;
use crate::utils::format_duration;
use crate::Result;

pub use caption_api::CaptionApiStrategy;
pub use yt_dlp::YtDlpStrategy;

/// A single timed caption line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptionEntry {
    pub text: String,

    /// Start time in seconds
    pub start: f64,

    /// Duration in seconds
    pub duration: f64,
}

/// Transcript produced by a strategy.
///
/// The variant names double as the response keys, so a flattened transcript
/// serializes as `"transcript": [...]` or `"transcript_vtt": "..."`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Transcript {
    /// Structured caption entries
    #[serde(rename = "transcript")]
    Entries(Vec<CaptionEntry>),

    /// Raw subtitle file content (WebVTT)
    #[serde(rename = "transcript_vtt")]
    Raw(String),
}

impl Transcript {
    /// Short human-readable description used in logs
    pub fn summary(&self) -> String {
        match self {
            Transcript::Entries(entries) => format!("{} caption entries", entries.len()),
            Transcript::Raw(content) => format!("{} bytes of subtitle text", content.len()),
        }
    }
}

/// Closed set of reasons a strategy can fail for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Captions are turned off for the video
    Disabled,
    /// No caption track exists for the requested language
    NotFound,
    /// Network or HTTP level failure
    Transport,
    /// External tool could not run or exited with an error
    Tool,
    /// Attempt exceeded its deadline
    Timeout,
    Other,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Disabled => "disabled",
            FailureKind::NotFound => "not_found",
            FailureKind::Transport => "transport",
            FailureKind::Tool => "tool",
            FailureKind::Timeout => "timeout",
            FailureKind::Other => "other",
        }
    }

    /// Known, expected conditions as opposed to unexpected errors
    pub fn is_classified(&self) -> bool {
        matches!(self, FailureKind::Disabled | FailureKind::NotFound)
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a single strategy failed. Displays as the bare message.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
#[error("{message}")]
pub struct StrategyFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl StrategyFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn disabled(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Disabled, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(FailureKind::NotFound, message)
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Transport, message)
    }

    pub fn tool(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Tool, message)
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Other, message)
    }

    pub fn timeout(limit: Duration) -> Self {
        Self::new(
            FailureKind::Timeout,
            format!("timed out after {}", format_duration(limit.as_secs_f64())),
        )
    }
}

/// Trait for one way of acquiring a transcript
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TranscriptStrategy: Send + Sync {
    /// Source tag reported alongside a successful transcript
    fn name(&self) -> &'static str;

    /// Fetch the transcript of `video_id` in `language`
    async fn fetch(&self, video_id: &str, language: &str) -> std::result::Result<Transcript, StrategyFailure>;
}

/// Ordered list of strategies, tried front to back
pub struct StrategyChain {
    strategies: Vec<Box<dyn TranscriptStrategy>>,
}

impl StrategyChain {
    /// Create an empty chain
    pub fn new() -> Self {
        Self {
            strategies: Vec::new(),
        }
    }

    /// Create the default chain: caption API first, yt-dlp second
    pub fn from_config(config: &Config) -> Result<Self> {
        let mut chain = Self::new();

        chain.register(Box::new(CaptionApiStrategy::new(config.caption_api_url()?)?));
        chain.register(Box::new(YtDlpStrategy::new(&config.yt_dlp.path)));

        Ok(chain)
    }

    /// Append a strategy at the lowest priority
    pub fn register(&mut self, strategy: Box<dyn TranscriptStrategy>) {
        self.strategies.push(strategy);
    }

    /// Strategy names in priority order
    pub fn names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|strategy| strategy.name()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn TranscriptStrategy> {
        self.strategies.iter().map(|boxed| boxed.as_ref())
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }
}

impl Default for StrategyChain {
    fn default() -> Self {
        Self::new()
    }
}
