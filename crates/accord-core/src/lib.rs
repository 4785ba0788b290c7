//! # accord-core
//!
//! Deterministic building blocks for negotiation guidance.
//!
//! This crate holds everything that does not talk to a model:
//! - Validating and sanitizing a negotiation context
//! - Checking a provider's candidate against the guidance quality contract
//! - Generating best-effort guidance when no provider can be used
//!
//! ## Key Guarantees
//!
//! 1. **No I/O**: Nothing here performs network calls
//! 2. **Deterministic**: The fallback is a pure function of its input
//! 3. **Checked output**: Every [`Guidance`] built here meets the quality contract
//!
//! ## Example
//!
//! ```rust,ignore
//! use accord_core::{FallbackGenerator, InputValidator, NegotiationContext};
//!
//! let context = NegotiationContext::new(
//!     "SLA Enhancement", "c-1", "sla_enhancement", "99% uptime", "99.9% uptime",
//! );
//! let context = InputValidator::new().validate(context)?;
//! let guidance = FallbackGenerator::new().generate(&context, None);
//! println!("{}", guidance.summary);
//! ```

pub mod context;
pub mod fallback;
pub mod guidance;
pub mod prompts;
pub mod provider;
pub mod validation;

// Re-export main types at crate root
pub use context::{NegotiationContext, NegotiationMetadata};
pub use fallback::{FallbackGenerator, FALLBACK_CONFIDENCE, FALLBACK_MODEL};
pub use guidance::{Guidance, GuidanceCandidate, DEFAULT_PROVIDER_CONFIDENCE};
pub use prompts::{build_prompt, normalize_override, resolve_prompt, RESPONSE_SCHEMA, SYSTEM_PROMPT};
pub use provider::{ProviderId, UnknownProvider};
pub use validation::{
    InputValidator, InvalidInput, OutputQualityError, OutputValidator, MAX_FIELD_CHARS,
    MIN_FALLBACK_CHARS, MIN_SUMMARY_CHARS,
};
