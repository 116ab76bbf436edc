use async_trait::async_trait;
use std::io::ErrorKind;
use std::process::Stdio;
use tokio::process::Command;

use super::{StrategyFailure, Transcript, TranscriptStrategy};
use crate::utils::last_stderr_line;

const STRATEGY_NAME: &str = "yt_dlp";
const WATCH_URL: &str = "https://www.youtube.com/watch?v=";

type Attempt<T> = std::result::Result<T, StrategyFailure>;

/// Auto-generated subtitle download using yt-dlp
pub struct YtDlpStrategy {
    yt_dlp_path: String,
}

impl YtDlpStrategy {
    pub fn new(yt_dlp_path: impl Into<String>) -> Self {
        Self {
            yt_dlp_path: yt_dlp_path.into(),
        }
    }
}

#[async_trait]
impl TranscriptStrategy for YtDlpStrategy {
    fn name(&self) -> &'static str {
        STRATEGY_NAME
    }

    async fn fetch(&self, video_id: &str, language: &str) -> Attempt<Transcript> {
        // The id becomes part of the subtitle file name.
        if video_id.contains(['/', '\\']) || video_id.starts_with('.') {
            return Err(StrategyFailure::other(
                "video id cannot be used as a subtitle file name",
            ));
        }

        // Removed on drop, whichever way this attempt ends.
        let scratch = tempfile::Builder::new()
            .prefix("transcript-relay-")
            .tempdir()
            .map_err(|e| StrategyFailure::other(format!("failed to create scratch directory: {e}")))?;

        let url = format!("{}{}", WATCH_URL, video_id);
        tracing::debug!("Running {} for {}", self.yt_dlp_path, url);

        let output = Command::new(&self.yt_dlp_path)
            .args([
                "--skip-download",
                "--write-auto-sub",
                "--sub-lang",
                language,
                "--sub-format",
                "vtt",
                "--no-warnings",
                "--no-playlist",
            ])
            .arg("-P")
            .arg(scratch.path())
            .args(["-o", "%(id)s.%(ext)s"])
            .arg(&url)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| StrategyFailure::tool(format!("failed to launch yt-dlp: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let status = match output.status.code() {
                Some(code) => format!("yt-dlp exited with status {code}"),
                None => "yt-dlp was terminated by a signal".to_string(),
            };
            let message = match last_stderr_line(&stderr) {
                Some(detail) => format!("{status}: {detail}"),
                None => status,
            };
            return Err(StrategyFailure::tool(message));
        }

        let subtitle_path = scratch
            .path()
            .join(format!("{}.{}.vtt", video_id, language));

        match tokio::fs::read_to_string(&subtitle_path).await {
            Ok(content) => Ok(Transcript::Raw(content)),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(StrategyFailure::not_found(
                "yt-dlp produced no subtitle file for this video",
            )),
            Err(e) => Err(StrategyFailure::other(format!(
                "failed to read subtitle file {}: {}",
                subtitle_path.display(),
                e
            ))),
        }
    }
}

impl Default for YtDlpStrategy {
    fn default() -> Self {
        Self::new("yt-dlp")
    }
}
