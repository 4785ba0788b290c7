//! Extraction of guidance JSON from model text.
//!
//! Models are asked for bare JSON but often wrap it in a fenced code block
//! or add prose around it.

use lazy_static::lazy_static;
use regex::Regex;

use accord_core::GuidanceCandidate;

lazy_static! {
    static ref FENCED_JSON: Regex =
        Regex::new(r"(?s)```(?:json)?\s*(\{.*?\})\s*```").expect("valid fenced JSON regex");
}

/// Parse a candidate from model text.
///
/// A fenced JSON block wins if present; otherwise the whole text is parsed.
/// Returns `None` when no JSON object can be read.
pub fn extract_candidate(text: &str) -> Option<GuidanceCandidate> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    let json = FENCED_JSON
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map_or(text, |m| m.as_str());

    match serde_json::from_str::<GuidanceCandidate>(json) {
        Ok(candidate) => Some(candidate),
        Err(e) => {
            tracing::debug!(error = %e, "Provider text is not a guidance object");
            None
        }
    }
}
