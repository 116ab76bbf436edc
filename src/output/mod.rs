//! Response bodies shared by the HTTP handlers and the `fetch` command.

use anyhow::Result;
use serde::Serialize;
use std::path::Path;

use crate::pipeline::{Acquisition, AttemptReport, FetchError};
use crate::strategies::Transcript;

/// Error text of the aggregated failure response
pub const EXHAUSTED_MESSAGE: &str = "Could not fetch transcript automatically.";

/// `{ "transcript": [...], "source": ... }` or `{ "transcript_vtt": "...", "source": ... }`
#[derive(Debug, Serialize)]
pub struct TranscriptBody<'a> {
    #[serde(flatten)]
    pub transcript: &'a Transcript,
    pub source: &'a str,
}

impl<'a> From<&'a Acquisition> for TranscriptBody<'a> {
    fn from(acquisition: &'a Acquisition) -> Self {
        Self {
            transcript: &acquisition.transcript,
            source: acquisition.source,
        }
    }
}

/// Every strategy failed; the caller should upload the transcript
#[derive(Debug, Serialize)]
pub struct ExhaustedBody<'a> {
    pub error: &'static str,
    pub details: &'a AttemptReport,
    pub upload_required: bool,
}

impl<'a> From<&'a AttemptReport> for ExhaustedBody<'a> {
    fn from(report: &'a AttemptReport) -> Self {
        Self {
            error: EXHAUSTED_MESSAGE,
            details: report,
            upload_required: true,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorBody<'a> {
    pub error: &'a str,
}

/// Acknowledgement of a manual upload
#[derive(Debug, Serialize)]
pub struct UploadAck {
    pub transcript_uploaded: bool,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_id: Option<String>,
}

/// JSON body for a pipeline outcome
pub fn outcome_json(outcome: &std::result::Result<Acquisition, FetchError>) -> serde_json::Result<serde_json::Value> {
    match outcome {
        Ok(acquisition) => serde_json::to_value(TranscriptBody::from(acquisition)),
        Err(FetchError::Exhausted(report)) => serde_json::to_value(ExhaustedBody::from(report)),
        Err(err @ FetchError::MissingVideoId) => serde_json::to_value(ErrorBody {
            error: &err.to_string(),
        }),
    }
}

fn render(outcome: &std::result::Result<Acquisition, FetchError>, pretty: bool) -> Result<String> {
    let value = outcome_json(outcome)?;
    let content = if pretty {
        serde_json::to_string_pretty(&value)?
    } else {
        serde_json::to_string(&value)?
    };
    Ok(content)
}

/// Save a pipeline outcome to file as JSON
pub fn save_to_file(
    outcome: &std::result::Result<Acquisition, FetchError>,
    path: &Path,
    pretty: bool,
) -> Result<()> {
    let content = render(outcome, pretty)?;
    fs_err::write(path, content)?;
    Ok(())
}

/// Print a pipeline outcome to console as JSON
pub fn print_to_console(outcome: &std::result::Result<Acquisition, FetchError>, pretty: bool) -> Result<()> {
    println!("{}", render(outcome, pretty)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategies::{CaptionEntry, StrategyFailure};
    use serde_json::json;

    #[test]
    fn test_entries_body() {
        let acquisition = Acquisition {
            video_id: "abc123".into(),
            transcript: Transcript::Entries(vec![CaptionEntry {
                text: "hi".into(),
                start: 1.0,
                duration: 2.0,
            }]),
            source: "youtube_transcript_api",
            attempts: AttemptReport::default(),
        };

        assert_eq!(
            outcome_json(&Ok(acquisition)).unwrap(),
            json!({
                "transcript": [{"text": "hi", "start": 1.0, "duration": 2.0}],
                "source": "youtube_transcript_api",
            })
        );
    }

    #[test]
    fn test_raw_body() {
        let acquisition = Acquisition {
            video_id: "abc123".into(),
            transcript: Transcript::Raw("WEBVTT".into()),
            source: "yt_dlp",
            attempts: AttemptReport::default(),
        };

        assert_eq!(
            outcome_json(&Ok(acquisition)).unwrap(),
            json!({"transcript_vtt": "WEBVTT", "source": "yt_dlp"})
        );
    }

    #[test]
    fn test_exhausted_body() {
        let mut report = AttemptReport::new(["youtube_transcript_api", "yt_dlp"]);
        report.mark_failed(0, StrategyFailure::disabled("transcripts are disabled for this video"));
        report.mark_failed(1, StrategyFailure::tool("tool exited 1"));

        assert_eq!(
            outcome_json(&Err(FetchError::Exhausted(report))).unwrap(),
            json!({
                "error": "Could not fetch transcript automatically.",
                "details": {
                    "youtube_transcript_api": "transcripts are disabled for this video",
                    "yt_dlp": "tool exited 1",
                },
                "upload_required": true,
            })
        );
    }

    #[test]
    fn test_missing_video_id_body() {
        assert_eq!(
            outcome_json(&Err(FetchError::MissingVideoId)).unwrap(),
            json!({"error": "Missing video_id"})
        );
    }
}
