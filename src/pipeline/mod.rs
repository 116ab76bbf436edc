use std::time::Duration;

use crate::config::Config;
use crate::strategies::{StrategyChain, StrategyFailure, Transcript};
use crate::Result;

pub mod report;

pub use report::{AttemptOutcome, AttemptReport};

/// Successful pipeline run
#[derive(Debug, Clone)]
pub struct Acquisition {
    /// The (trimmed) video id the transcript belongs to
    pub video_id: String,

    pub transcript: Transcript,

    /// Name of the strategy that produced the transcript
    pub source: &'static str,

    /// Outcome of every strategy in the chain
    pub attempts: AttemptReport,
}

/// Why the pipeline produced no transcript
#[derive(thiserror::Error, Debug)]
pub enum FetchError {
    #[error("Missing video_id")]
    MissingVideoId,

    /// Every strategy failed; manual upload is the remaining option
    #[error("Could not fetch transcript automatically.")]
    Exhausted(AttemptReport),
}

/// Drives the strategy chain for one video at a time
pub struct TranscriptPipeline {
    chain: StrategyChain,
    language: String,
    strategy_timeout: Duration,
}

impl TranscriptPipeline {
    pub fn new(chain: StrategyChain, language: impl Into<String>, strategy_timeout: Duration) -> Self {
        Self {
            chain,
            language: language.into(),
            strategy_timeout,
        }
    }

    /// Build the default chain from configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self::new(
            StrategyChain::from_config(config)?,
            config.transcripts.language.clone(),
            config.strategy_timeout(),
        ))
    }

    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.chain.names()
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn strategy_timeout(&self) -> Duration {
        self.strategy_timeout
    }

    /// Try each strategy in order until one produces a transcript
    pub async fn fetch(&self, video_id: &str) -> std::result::Result<Acquisition, FetchError> {
        let video_id = video_id.trim();
        if video_id.is_empty() {
            return Err(FetchError::MissingVideoId);
        }

        let mut report = AttemptReport::new(self.chain.names());

        for (index, strategy) in self.chain.iter().enumerate() {
            let name = strategy.name();
            tracing::debug!("Trying strategy {} for {}", name, video_id);

            let outcome = tokio::time::timeout(
                self.strategy_timeout,
                strategy.fetch(video_id, &self.language),
            )
            .await
            .unwrap_or_else(|_| Err(StrategyFailure::timeout(self.strategy_timeout)));

            match outcome {
                Ok(transcript) => {
                    tracing::info!(
                        strategy = name,
                        "Fetched transcript for {}: {}",
                        video_id,
                        transcript.summary()
                    );
                    report.mark_succeeded(index);
                    tracing::info!(attempts = %report, "Acquisition report for {}", video_id);

                    return Ok(Acquisition {
                        video_id: video_id.to_string(),
                        transcript,
                        source: name,
                        attempts: report,
                    });
                }
                Err(failure) => {
                    // Disabled / NotFound are expected outcomes, not faults
                    if failure.kind.is_classified() {
                        tracing::info!(
                            strategy = name,
                            kind = %failure.kind,
                            "Strategy found no transcript for {}: {}",
                            video_id,
                            failure
                        );
                    } else {
                        tracing::warn!(
                            strategy = name,
                            kind = %failure.kind,
                            "Strategy failed for {}: {}",
                            video_id,
                            failure
                        );
                    }
                    report.mark_failed(index, failure);
                }
            }
        }

        tracing::warn!(
            attempts = %report,
            "All {} strategies failed for {}; manual upload required",
            report.len(),
            video_id
        );
        Err(FetchError::Exhausted(report))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategies::{
        CaptionEntry, FailureKind, MockTranscriptStrategy, TranscriptStrategy,
    };
    use async_trait::async_trait;

    fn entries() -> Transcript {
        Transcript::Entries(vec![CaptionEntry {
            text: "hello".into(),
            start: 0.0,
            duration: 1.0,
        }])
    }

    fn mock(name: &'static str) -> MockTranscriptStrategy {
        let mut strategy = MockTranscriptStrategy::new();
        strategy.expect_name().return_const(name);
        strategy
    }

    fn pipeline(strategies: Vec<MockTranscriptStrategy>) -> TranscriptPipeline {
        let mut chain = StrategyChain::new();
        for strategy in strategies {
            chain.register(Box::new(strategy));
        }
        TranscriptPipeline::new(chain, "en", Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_missing_video_id_invokes_nothing() {
        let mut first = mock("youtube_transcript_api");
        first.expect_fetch().never();
        let mut second = mock("yt_dlp");
        second.expect_fetch().never();

        let pipeline = pipeline(vec![first, second]);

        assert!(matches!(pipeline.fetch("").await, Err(FetchError::MissingVideoId)));
        assert!(matches!(pipeline.fetch("   ").await, Err(FetchError::MissingVideoId)));
    }

    #[tokio::test]
    async fn test_first_success_wins() {
        let mut first = mock("youtube_transcript_api");
        first
            .expect_fetch()
            .withf(|video_id, language| video_id == "abc123" && language == "en")
            .times(1)
            .returning(|_, _| Ok(entries()));
        let mut second = mock("yt_dlp");
        second.expect_fetch().never();

        let acquisition = pipeline(vec![first, second]).fetch(" abc123 ").await.unwrap();

        assert_eq!(acquisition.source, "youtube_transcript_api");
        assert_eq!(acquisition.video_id, "abc123");
        assert_eq!(acquisition.transcript, entries());
        assert_eq!(
            acquisition.attempts.outcome("yt_dlp"),
            Some(&AttemptOutcome::NotAttempted)
        );
    }

    #[tokio::test]
    async fn test_fallback_success_is_not_recorded_as_failure() {
        let mut first = mock("youtube_transcript_api");
        first
            .expect_fetch()
            .times(1)
            .returning(|_, _| Err(StrategyFailure::disabled("transcripts are disabled for this video")));
        let mut second = mock("yt_dlp");
        second
            .expect_fetch()
            .times(1)
            .returning(|_, _| Ok(Transcript::Raw("WEBVTT".into())));

        let acquisition = pipeline(vec![first, second]).fetch("abc123").await.unwrap();

        assert_eq!(acquisition.source, "yt_dlp");
        assert_eq!(acquisition.transcript, Transcript::Raw("WEBVTT".into()));
        assert_eq!(
            acquisition.attempts.outcome("yt_dlp"),
            Some(&AttemptOutcome::Succeeded)
        );
        let failures: Vec<_> = acquisition.attempts.failures().map(|(name, _)| name).collect();
        assert_eq!(failures, vec!["youtube_transcript_api"]);
    }

    #[tokio::test]
    async fn test_exhaustion_reports_every_strategy() {
        let mut first = mock("youtube_transcript_api");
        first
            .expect_fetch()
            .times(1)
            .returning(|_, _| Err(StrategyFailure::not_found("no transcript found for this video")));
        let mut second = mock("yt_dlp");
        second
            .expect_fetch()
            .times(1)
            .returning(|_, _| Err(StrategyFailure::tool("tool exited 1")));

        let err = pipeline(vec![first, second]).fetch("abc123").await.unwrap_err();

        let FetchError::Exhausted(report) = err else {
            panic!("expected exhaustion, got {err:?}");
        };
        assert_eq!(
            serde_json::to_value(&report).unwrap(),
            serde_json::json!({
                "youtube_transcript_api": "no transcript found for this video",
                "yt_dlp": "tool exited 1",
            })
        );
    }

    #[tokio::test]
    async fn test_empty_chain_is_exhausted() {
        let pipeline = pipeline(Vec::new());
        let err = pipeline.fetch("abc123").await.unwrap_err();
        assert!(matches!(err, FetchError::Exhausted(report) if report.is_empty()));
    }

    struct Stalled;

    #[async_trait]
    impl TranscriptStrategy for Stalled {
        fn name(&self) -> &'static str {
            "stalled"
        }

        async fn fetch(
            &self,
            _video_id: &str,
            _language: &str,
        ) -> std::result::Result<Transcript, StrategyFailure> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(Transcript::Raw("too late".into()))
        }
    }

    #[tokio::test]
    async fn test_timeout_counts_as_failure_and_chain_continues() {
        let mut fallback = mock("yt_dlp");
        fallback
            .expect_fetch()
            .times(1)
            .returning(|_, _| Ok(Transcript::Raw("WEBVTT".into())));

        let mut chain = StrategyChain::new();
        chain.register(Box::new(Stalled));
        chain.register(Box::new(fallback));
        let pipeline = TranscriptPipeline::new(chain, "en", Duration::from_millis(50));

        let acquisition = pipeline.fetch("abc123").await.unwrap();

        assert_eq!(acquisition.source, "yt_dlp");
        match acquisition.attempts.outcome("stalled") {
            Some(AttemptOutcome::Failed(failure)) => {
                assert_eq!(failure.kind, FailureKind::Timeout);
                assert_eq!(failure.message, "timed out after 50ms");
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }
}
