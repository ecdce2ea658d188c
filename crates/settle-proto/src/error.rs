//! Error taxonomy for the verification harness.
//!
//! Every failure a scenario can encounter maps to exactly one variant here,
//! because the propagation policy differs per class: transport failures,
//! timeouts, and authoring mistakes abort a scenario immediately; rejected
//! actions are expected on fault paths; an exhausted poll budget may
//! downgrade to a warning when the scenario marked the observation as
//! best-effort.

use std::time::Duration;

/// Result alias used throughout the harness crates.
pub type Result<T, E = HarnessError> = std::result::Result<T, E>;

/// Classified harness failure.
#[derive(Debug, Clone, thiserror::Error)]
pub enum HarnessError {
    /// Backend unreachable, request failed, or response body undecodable.
    /// Distinct from slow settlement: this signals infrastructure failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// Registration or login rejected by the backend.
    #[error("authentication rejected: {0}")]
    Auth(String),

    /// A mutating action rejected, with the backend-supplied reason when
    /// one was present.
    #[error("action rejected: {0}")]
    Action(String),

    /// A suspension point exceeded its budget.
    #[error("step timed out after {0:?}")]
    Timeout(Duration),

    /// A poll predicate never accepted within the retry budget.
    #[error("settlement not observed within {attempts} attempts ({detail})")]
    Exhausted { attempts: u32, detail: String },

    /// An invariant did not hold.
    #[error("assertion failed: {0}")]
    Assertion(String),

    /// Scenario authoring mistake (e.g. a step referenced an unbound
    /// identity). Reported distinctly from backend-originated failures.
    #[error("scenario authoring error: {0}")]
    Binding(String),
}

impl HarnessError {
    /// Returns true when the error aborts the owning scenario outright
    /// rather than feeding into fault-path or best-effort handling.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            HarnessError::Transport(_) | HarnessError::Timeout(_) | HarnessError::Binding(_)
        )
    }
}
