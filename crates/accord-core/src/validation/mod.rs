//! Validation at both ends of the orchestration.
//!
//! - [`InputValidator`] normalizes and rejects requests before any provider
//!   is touched.
//! - [`OutputValidator`] accepts or rejects provider candidates.

mod input;
mod output;
mod schema;

pub use input::{sanitize_text, InputValidator, InvalidInput, MAX_FIELD_CHARS};
pub use output::{OutputQualityError, OutputValidator, MIN_FALLBACK_CHARS, MIN_SUMMARY_CHARS};
pub use schema::check_context_schema;
