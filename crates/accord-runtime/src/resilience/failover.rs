//! Provider try-order.

use accord_core::ProviderId;

/// Decides the order in which providers are tried for one request.
///
/// The order depends only on the caller's preference, never on health.
/// Health is consulted per provider by the orchestrator.
#[derive(Debug, Clone, Copy, Default)]
pub struct FailoverSequencer;

impl FailoverSequencer {
    pub fn new() -> Self {
        Self
    }

    /// Primary, secondary, fallback; or secondary first when it is preferred.
    /// Any other preference leaves the default order unchanged.
    pub fn order(&self, preferred: Option<ProviderId>) -> Vec<ProviderId> {
        match preferred {
            Some(ProviderId::OpenAi) => {
                vec![ProviderId::OpenAi, ProviderId::Gemini, ProviderId::Fallback]
            }
            _ => vec![ProviderId::Gemini, ProviderId::OpenAi, ProviderId::Fallback],
        }
    }
}
