//! Direct caption API strategy.
//!
//! Talks to the same endpoints the YouTube web and Android clients use:
//! the watch page yields the innertube API key, the innertube `player`
//! endpoint lists the caption tracks, and each track's `baseUrl` serves the
//! timedtext XML that is parsed into [`CaptionEntry`] values.

use async_trait::async_trait;
use regex::Regex;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT_LANGUAGE};
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::sync::OnceLock;
use url::Url;

use super::{CaptionEntry, StrategyFailure, Transcript, TranscriptStrategy};
use crate::Result;

const STRATEGY_NAME: &str = "youtube_transcript_api";
const INNERTUBE_CLIENT_NAME: &str = "ANDROID";
const INNERTUBE_CLIENT_VERSION: &str = "20.10.38";

type Attempt<T> = std::result::Result<T, StrategyFailure>;

/// Caption track advertised by the player response
#[derive(Debug, Clone, PartialEq)]
pub struct CaptionTrack {
    pub language_code: String,
    pub base_url: String,
    pub is_generated: bool,
}

/// Fetches structured captions straight from YouTube
pub struct CaptionApiStrategy {
    client: Client,
    base_url: Url,
}

impl CaptionApiStrategy {
    /// Create a strategy talking to `base_url` (normally `https://www.youtube.com`)
    pub fn new(base_url: Url) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US"));

        let client = Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build HTTP client: {}", e))?;

        Ok(Self { client, base_url })
    }

    fn endpoint(&self, path: &str) -> Attempt<Url> {
        self.base_url
            .join(path)
            .map_err(|e| StrategyFailure::other(format!("invalid caption API url: {e}")))
    }

    /// Download the watch page HTML
    async fn fetch_watch_page(&self, video_id: &str) -> Attempt<String> {
        let mut url = self.endpoint("watch")?;
        url.query_pairs_mut().append_pair("v", video_id);

        tracing::debug!("Fetching watch page: {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| StrategyFailure::transport(format!("failed to fetch watch page: {e}")))?;
        check_status(response.status(), "watch page")?;

        response
            .text()
            .await
            .map_err(|e| StrategyFailure::transport(format!("failed to read watch page: {e}")))
    }

    /// Ask the innertube player endpoint for the video's metadata
    async fn fetch_player_response(&self, video_id: &str, api_key: &str) -> Attempt<Value> {
        let mut url = self.endpoint("youtubei/v1/player")?;
        url.query_pairs_mut().append_pair("key", api_key);

        let body = serde_json::json!({
            "context": {
                "client": {
                    "clientName": INNERTUBE_CLIENT_NAME,
                    "clientVersion": INNERTUBE_CLIENT_VERSION,
                }
            },
            "videoId": video_id,
        });

        let response = self
            .client
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(|e| StrategyFailure::transport(format!("failed to query player endpoint: {e}")))?;
        check_status(response.status(), "player endpoint")?;

        response
            .json()
            .await
            .map_err(|e| StrategyFailure::other(format!("failed to parse player response: {e}")))
    }

    /// Download and parse a single caption track
    async fn fetch_track(&self, track: &CaptionTrack) -> Attempt<Vec<CaptionEntry>> {
        if track.base_url.contains("&exp=xpe") {
            return Err(StrategyFailure::other(
                "caption track requires a PO token and cannot be fetched directly",
            ));
        }

        let response = self
            .client
            .get(&track.base_url)
            .send()
            .await
            .map_err(|e| StrategyFailure::transport(format!("failed to fetch caption track: {e}")))?;
        check_status(response.status(), "caption track")?;

        let xml = response
            .text()
            .await
            .map_err(|e| StrategyFailure::transport(format!("failed to read caption track: {e}")))?;

        parse_timedtext(&xml)
    }
}

#[async_trait]
impl TranscriptStrategy for CaptionApiStrategy {
    fn name(&self) -> &'static str {
        STRATEGY_NAME
    }

    async fn fetch(&self, video_id: &str, language: &str) -> Attempt<Transcript> {
        let html = self.fetch_watch_page(video_id).await?;
        let api_key = extract_api_key(&html)?;
        let player = self.fetch_player_response(video_id, &api_key).await?;

        check_playability(&player)?;

        let tracks = caption_tracks(&player)?;
        let track = select_track(&tracks, language)?;
        tracing::debug!(
            "Using {} caption track '{}'",
            if track.is_generated { "generated" } else { "manual" },
            track.language_code
        );

        let entries = self.fetch_track(track).await?;
        if entries.is_empty() {
            return Err(StrategyFailure::not_found("no transcript found for this video"));
        }

        Ok(Transcript::Entries(entries))
    }
}

fn check_status(status: StatusCode, what: &str) -> Attempt<()> {
    if status == StatusCode::TOO_MANY_REQUESTS {
        return Err(StrategyFailure::transport(
            "YouTube is rate limiting requests (HTTP 429)",
        ));
    }

    if !status.is_success() {
        return Err(StrategyFailure::transport(format!(
            "HTTP {} from {}",
            status, what
        )));
    }

    Ok(())
}

/// Pull the innertube API key out of the watch page
pub fn extract_api_key(html: &str) -> Attempt<String> {
    static API_KEY: OnceLock<Regex> = OnceLock::new();

    if html.contains("class=\"g-recaptcha\"") {
        return Err(StrategyFailure::transport(
            "YouTube is asking for a captcha; requests from this IP are blocked",
        ));
    }

    let re = API_KEY.get_or_init(|| {
        Regex::new(r#""INNERTUBE_API_KEY":\s*"([a-zA-Z0-9_-]+)""#).expect("valid api key pattern")
    });

    re.captures(html)
        .and_then(|caps| caps.get(1))
        .map(|key| key.as_str().to_string())
        .ok_or_else(|| StrategyFailure::other("could not parse YouTube page data"))
}

/// Fail unless the player reports the video as playable
pub fn check_playability(player: &Value) -> Attempt<()> {
    let Some(playability) = player.get("playabilityStatus") else {
        return Ok(());
    };

    let status = playability["status"].as_str().unwrap_or("");
    if status == "OK" {
        return Ok(());
    }

    let reason = playability["reason"].as_str().unwrap_or("no reason given");
    Err(match status {
        "LOGIN_REQUIRED" => StrategyFailure::other(format!("video requires sign-in: {reason}")),
        "ERROR" => StrategyFailure::other(format!("video is unavailable: {reason}")),
        _ => StrategyFailure::other(format!("video is unplayable ({status}): {reason}")),
    })
}

/// List the caption tracks in a player response
pub fn caption_tracks(player: &Value) -> Attempt<Vec<CaptionTrack>> {
    let disabled = || StrategyFailure::disabled("transcripts are disabled for this video");

    let renderer = player
        .get("captions")
        .and_then(|c| c.get("playerCaptionsTracklistRenderer"))
        .ok_or_else(disabled)?;

    let tracks: Vec<CaptionTrack> = renderer["captionTracks"]
        .as_array()
        .map(|tracks| {
            tracks
                .iter()
                .filter_map(|track| {
                    Some(CaptionTrack {
                        language_code: track["languageCode"].as_str()?.to_string(),
                        base_url: track["baseUrl"].as_str()?.replace("&fmt=srv3", ""),
                        is_generated: track["kind"].as_str() == Some("asr"),
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    if tracks.is_empty() {
        return Err(disabled());
    }

    Ok(tracks)
}

/// Pick the track for `language`, preferring manually created captions
pub fn select_track<'a>(tracks: &'a [CaptionTrack], language: &str) -> Attempt<&'a CaptionTrack> {
    tracks
        .iter()
        .find(|t| !t.is_generated && t.language_code == language)
        .or_else(|| tracks.iter().find(|t| t.language_code == language))
        .ok_or_else(|| StrategyFailure::not_found("no transcript found for this video"))
}

/// Parse YouTube timedtext XML into caption entries
pub fn parse_timedtext(xml: &str) -> Attempt<Vec<CaptionEntry>> {
    static TEXT: OnceLock<Regex> = OnceLock::new();
    static START: OnceLock<Regex> = OnceLock::new();
    static DUR: OnceLock<Regex> = OnceLock::new();
    static TAG: OnceLock<Regex> = OnceLock::new();

    let text_re = TEXT.get_or_init(|| {
        Regex::new(r"(?s)<text\b([^>]*?)>(.*?)</text>").expect("valid text pattern")
    });
    let start_re =
        START.get_or_init(|| Regex::new(r#"\bstart="([^"]*)""#).expect("valid start pattern"));
    let dur_re = DUR.get_or_init(|| Regex::new(r#"\bdur="([^"]*)""#).expect("valid dur pattern"));
    let tag_re = TAG.get_or_init(|| Regex::new(r"<[^>]*>").expect("valid tag pattern"));

    let mut entries = Vec::new();

    for caps in text_re.captures_iter(xml) {
        let attrs = &caps[1];
        let raw = &caps[2];
        if raw.is_empty() {
            continue;
        }

        let start = start_re
            .captures(attrs)
            .and_then(|c| c[1].parse::<f64>().ok())
            .ok_or_else(|| {
                StrategyFailure::other("malformed caption track: entry without a valid start time")
            })?;
        let duration = dur_re
            .captures(attrs)
            .and_then(|c| c[1].parse::<f64>().ok())
            .unwrap_or(0.0);

        // Text is entity-encoded once by XML and once more by YouTube.
        let xml_decoded = html_escape::decode_html_entities(raw);
        let stripped = tag_re.replace_all(&xml_decoded, "");
        let text = html_escape::decode_html_entities(&stripped).into_owned();

        entries.push(CaptionEntry {
            text,
            start,
            duration,
        });
    }

    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategies::FailureKind;

    #[test]
    fn test_extract_api_key() {
        let html = r#"<script>ytcfg.set({"INNERTUBE_API_KEY": "AIzaSyA-test_key"});</script>"#;
        assert_eq!(extract_api_key(html).unwrap(), "AIzaSyA-test_key");
    }

    #[test]
    fn test_extract_api_key_missing() {
        let err = extract_api_key("<html></html>").unwrap_err();
        assert_eq!(err.kind, FailureKind::Other);
    }

    #[test]
    fn test_extract_api_key_captcha() {
        let err = extract_api_key(r#"<div class="g-recaptcha"></div>"#).unwrap_err();
        assert_eq!(err.kind, FailureKind::Transport);
    }

    #[test]
    fn test_captions_missing_means_disabled() {
        let player = serde_json::json!({"playabilityStatus": {"status": "OK"}});
        let err = caption_tracks(&player).unwrap_err();
        assert_eq!(err.kind, FailureKind::Disabled);
        assert_eq!(err.message, "transcripts are disabled for this video");
    }

    #[test]
    fn test_select_track_prefers_manual() {
        let tracks = vec![
            CaptionTrack {
                language_code: "en".into(),
                base_url: "https://example.com/asr".into(),
                is_generated: true,
            },
            CaptionTrack {
                language_code: "en".into(),
                base_url: "https://example.com/manual".into(),
                is_generated: false,
            },
        ];
        assert_eq!(
            select_track(&tracks, "en").unwrap().base_url,
            "https://example.com/manual"
        );

        let err = select_track(&tracks, "fr").unwrap_err();
        assert_eq!(err.kind, FailureKind::NotFound);
        assert_eq!(err.message, "no transcript found for this video");
    }

    #[test]
    fn test_caption_tracks_strip_srv3() {
        let player = serde_json::json!({
            "captions": {"playerCaptionsTracklistRenderer": {"captionTracks": [
                {"languageCode": "en", "baseUrl": "https://example.com/t?lang=en&fmt=srv3", "kind": "asr"}
            ]}}
        });
        let tracks = caption_tracks(&player).unwrap();
        assert_eq!(tracks[0].base_url, "https://example.com/t?lang=en");
        assert!(tracks[0].is_generated);
    }

    #[test]
    fn test_playability_error() {
        let player = serde_json::json!({
            "playabilityStatus": {"status": "ERROR", "reason": "This video is unavailable"}
        });
        let err = check_playability(&player).unwrap_err();
        assert!(err.message.contains("This video is unavailable"));
    }

    #[test]
    fn test_parse_timedtext() {
        let xml = r#"<?xml version="1.0" encoding="utf-8" ?><transcript>
<text start="0.5" dur="1.5">Hey &amp;#39;there&amp;#39;</text>
<text start="2" dur="3.25">&lt;b&gt;bold&lt;/b&gt; move</text>
<text start="5.25"></text>
<text start="6">no duration</text>
</transcript>"#;

        let entries = parse_timedtext(xml).unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].text, "Hey 'there'");
        assert_eq!(entries[0].start, 0.5);
        assert_eq!(entries[0].duration, 1.5);
        assert_eq!(entries[1].text, "bold move");
        assert_eq!(entries[2].duration, 0.0);

        let named = parse_timedtext(r#"<text start="0" dur="1">caf&amp;eacute;</text>"#).unwrap();
        assert_eq!(named[0].text, "café");
    }

    #[test]
    fn test_parse_timedtext_rejects_missing_start() {
        let err = parse_timedtext(r#"<text dur="1">x</text>"#).unwrap_err();
        assert!(err.message.starts_with("malformed caption track"));
    }

    #[test]
    fn test_parse_timedtext_named_entities() {
        let xml = r#"<text start="0" dur="1">caf&amp;eacute; &amp;hellip; fish &amp; chips</text>"#;

        let entries = parse_timedtext(xml).unwrap();
        assert_eq!(entries[0].text, "caf\u{e9} \u{2026} fish & chips");
    }
}
