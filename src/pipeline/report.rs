use serde::ser::{Serialize, SerializeMap, Serializer};
use std::fmt;

use crate::strategies::StrategyFailure;

/// What happened to one strategy during a pipeline run
#[derive(Debug, Clone, PartialEq)]
pub enum AttemptOutcome {
    /// Never invoked because an earlier strategy succeeded
    NotAttempted,
    Succeeded,
    Failed(StrategyFailure),
}

impl AttemptOutcome {
    /// Text used in the `details` map of an aggregated failure
    pub fn describe(&self) -> &str {
        match self {
            AttemptOutcome::NotAttempted => "not attempted",
            AttemptOutcome::Succeeded => "succeeded",
            AttemptOutcome::Failed(failure) => &failure.message,
        }
    }
}

/// Per-strategy outcomes in chain order.
///
/// Serializes as a JSON object from strategy name to reason, keeping the
/// chain's order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttemptReport {
    entries: Vec<(&'static str, AttemptOutcome)>,
}

impl AttemptReport {
    /// Start a report with every strategy marked as not attempted
    pub fn new(names: impl IntoIterator<Item = &'static str>) -> Self {
        Self {
            entries: names
                .into_iter()
                .map(|name| (name, AttemptOutcome::NotAttempted))
                .collect(),
        }
    }

    pub(crate) fn mark_succeeded(&mut self, index: usize) {
        if let Some(entry) = self.entries.get_mut(index) {
            entry.1 = AttemptOutcome::Succeeded;
        }
    }

    pub(crate) fn mark_failed(&mut self, index: usize, failure: StrategyFailure) {
        if let Some(entry) = self.entries.get_mut(index) {
            entry.1 = AttemptOutcome::Failed(failure);
        }
    }

    /// Outcome recorded for the strategy called `name`
    pub fn outcome(&self, name: &str) -> Option<&AttemptOutcome> {
        self.entries
            .iter()
            .find(|(entry_name, _)| *entry_name == name)
            .map(|(_, outcome)| outcome)
    }

    pub fn entries(&self) -> &[(&'static str, AttemptOutcome)] {
        &self.entries
    }

    /// Failures in the order they happened
    pub fn failures(&self) -> impl Iterator<Item = (&'static str, &StrategyFailure)> {
        self.entries.iter().filter_map(|(name, outcome)| match outcome {
            AttemptOutcome::Failed(failure) => Some((*name, failure)),
            _ => None,
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for AttemptReport {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, outcome) in &self.entries {
            map.serialize_entry(name, outcome.describe())?;
        }
        map.end()
    }
}

/// Compact JSON, as logged after every pipeline run
impl fmt::Display for AttemptReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let json = serde_json::to_string(self).map_err(|_| fmt::Error)?;
        f.write_str(&json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serializes_in_chain_order() {
        let mut report = AttemptReport::new(["zeta", "alpha", "mid"]);
        report.mark_failed(0, StrategyFailure::transport("HTTP 503"));
        report.mark_succeeded(1);

        let json = serde_json::to_string(&report).unwrap();
        assert_eq!(
            json,
            r#"{"zeta":"HTTP 503","alpha":"succeeded","mid":"not attempted"}"#
        );
    }

    #[test]
    fn test_failures_skip_other_outcomes() {
        let mut report = AttemptReport::new(["a", "b"]);
        report.mark_failed(1, StrategyFailure::tool("exit 2"));

        let failures: Vec<_> = report.failures().collect();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].0, "b");
        assert_eq!(report.outcome("a"), Some(&AttemptOutcome::NotAttempted));
    }

    #[test]
    fn test_display_is_compact_json() {
        let mut report = AttemptReport::new(["youtube_transcript_api", "yt_dlp"]);
        report.mark_failed(0, StrategyFailure::disabled("transcripts are disabled for this video"));
        report.mark_succeeded(1);

        assert_eq!(
            report.to_string(),
            r#"{"youtube_transcript_api":"transcripts are disabled for this video","yt_dlp":"succeeded"}"#
        );
    }
}
