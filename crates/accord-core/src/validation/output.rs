//! Output quality checks for provider candidates.
//!
//! A candidate that fails here counts against the provider that produced it,
//! exactly like a failed call.

use thiserror::Error;

use crate::guidance::{Guidance, GuidanceCandidate};

/// Minimum summary length, in characters after trimming.
pub const MIN_SUMMARY_CHARS: usize = 10;

/// Minimum fallback recommendation length, in characters after trimming.
pub const MIN_FALLBACK_CHARS: usize = 5;

/// Reasons a candidate was rejected.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OutputQualityError {
    #[error("Guidance is missing or empty")]
    Missing,

    #[error("Summary is too short or empty ({chars} chars, need {min})", min = MIN_SUMMARY_CHARS)]
    SummaryTooShort { chars: usize },

    #[error("Fallback recommendation is too short or empty ({chars} chars, need {min})", min = MIN_FALLBACK_CHARS)]
    FallbackTooShort { chars: usize },

    #[error("No talking points provided")]
    NoTalkingPoints,

    #[error("Invalid confidence value: {0}")]
    ConfidenceOutOfRange(f64),
}

/// Accepts or rejects a candidate by the guidance quality contract.
///
/// Checks run in a fixed order and stop at the first failure:
/// presence, summary, fallback recommendation, talking points, confidence.
#[derive(Debug, Clone, Copy, Default)]
pub struct OutputValidator;

impl OutputValidator {
    pub fn new() -> Self {
        Self
    }

    pub fn validate(&self, candidate: Option<GuidanceCandidate>) -> Result<Guidance, OutputQualityError> {
        let candidate = candidate.ok_or(OutputQualityError::Missing)?;

        let summary_chars = candidate.summary.trim().chars().count();
        if summary_chars < MIN_SUMMARY_CHARS {
            return Err(OutputQualityError::SummaryTooShort { chars: summary_chars });
        }

        let fallback_chars = candidate.fallback_recommendation.trim().chars().count();
        if fallback_chars < MIN_FALLBACK_CHARS {
            return Err(OutputQualityError::FallbackTooShort { chars: fallback_chars });
        }

        let talking_points = prune_blank(candidate.talking_points);
        if talking_points.is_empty() {
            return Err(OutputQualityError::NoTalkingPoints);
        }

        // NaN fails the range check too
        if !(0.0..=1.0).contains(&candidate.confidence) {
            return Err(OutputQualityError::ConfidenceOutOfRange(candidate.confidence));
        }

        Ok(Guidance {
            summary: candidate.summary,
            fallback_recommendation: candidate.fallback_recommendation,
            talking_points,
            risk_callouts: prune_blank(candidate.risk_callouts),
            confidence: candidate.confidence,
            model: candidate.model,
            latency_ms: candidate.latency_ms,
            cached: candidate.cached,
            documentation_url: candidate.documentation_url,
            generated_prompt: candidate.generated_prompt,
        })
    }
}

fn prune_blank(items: Vec<String>) -> Vec<String> {
    items
        .into_iter()
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .collect()
}
