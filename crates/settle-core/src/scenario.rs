//! Scenario and step definitions.
//!
//! A scenario is an ordered sequence of steps over named identity
//! bindings. Scenarios that touch a backend-global account declare a
//! serialization group; the orchestrator runs at most one scenario per
//! group at a time because the ledger has no per-scenario isolation.

use settle_proto::TokenAmount;

use crate::assertions::CheckKind;
use crate::faults::FaultKind;

/// A scenario definition.
#[derive(Debug, Clone)]
pub struct Scenario {
    pub name: String,
    /// Serialization group, for scenarios sharing backend state.
    pub group: Option<String>,
    pub steps: Vec<Step>,
}

impl Scenario {
    /// Creates a new empty scenario.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            group: None,
            steps: Vec::new(),
        }
    }

    /// Places the scenario in a serialization group.
    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    /// Appends a step.
    pub fn step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }
}

/// One step of a scenario. Steps execute strictly in declared order; a
/// step that references an unbound name is a harness-authoring error, not
/// a backend failure.
#[derive(Debug, Clone)]
pub enum Step {
    /// Registers a fresh identity and binds it under `bind`.
    Provision { bind: String, prefix: String },

    /// Logs in an existing identity (pre-seeded account) under `bind`.
    Authenticate {
        bind: String,
        email: String,
        password: String,
    },

    /// Issues a mutating action as `actor`. Actions are never retried
    /// implicitly: a rejection fails the scenario unless `record_outcome`
    /// names a key, in which case the rejection (or its absence) is
    /// recorded for a later `errorSurfaced` assertion.
    Act {
        actor: String,
        action: Action,
        record_outcome: Option<String>,
    },

    /// Reads backend state as seen for `actor` and records it under
    /// `record`. With a `settle` spec the read runs under the settlement
    /// poller instead of once.
    Observe {
        actor: String,
        what: ObserveKind,
        record: String,
        settle: Option<SettleSpec>,
    },

    /// Evaluates a post-condition over previously recorded values.
    Assert {
        label: String,
        kind: CheckKind,
        observed: Source,
        expected: Option<Source>,
    },

    /// Drives one deliberately invalid action through the fault-path
    /// driver and asserts the system degraded safely. The rejection (or
    /// its absence) can be recorded for a later `errorSurfaced` check.
    Fault {
        actor: String,
        kind: FaultKind,
        record: Option<String>,
    },
}

impl Step {
    /// Short label for step-level diagnostics.
    pub fn label(&self) -> String {
        match self {
            Step::Provision { bind, .. } => format!("provision {bind}"),
            Step::Authenticate { bind, .. } => format!("authenticate {bind}"),
            Step::Act {
                actor,
                action: Action::Transfer { .. },
                ..
            } => format!("transfer from {actor}"),
            Step::Act {
                actor,
                action: Action::ClaimReward,
                ..
            } => format!("claim reward as {actor}"),
            Step::Observe {
                actor,
                what,
                settle,
                ..
            } => {
                let mode = if settle.is_some() { "poll" } else { "observe" };
                format!("{mode} {what:?} of {actor}")
            }
            Step::Assert { label, .. } => format!("assert {label}"),
            Step::Fault { actor, kind, .. } => format!("fault {kind:?} as {actor}"),
        }
    }
}

/// A mutating request against the backend.
#[derive(Debug, Clone)]
pub enum Action {
    Transfer {
        to: Recipient,
        amount: TokenAmount,
    },
    ClaimReward,
}

/// Where a transfer is addressed.
#[derive(Debug, Clone)]
pub enum Recipient {
    /// The bound identity's address.
    Bound(String),
    /// The sender's own address (self-transfer fault path).
    Own,
    /// A literal string, well-formed or not.
    Literal(String),
}

/// What an observation reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObserveKind {
    Balance,
    RewardEligibility,
    /// The session's own address via `me`, for stability checks.
    OwnAddress,
}

/// Settlement tolerance for an observation.
#[derive(Debug, Clone)]
pub struct SettleSpec {
    pub accept: Accept,
    /// Best-effort settlement: an exhausted budget downgrades the scenario
    /// to a warning instead of failing it, because the backend's
    /// settlement latency is not guaranteed bounded.
    pub best_effort: bool,
}

impl SettleSpec {
    pub fn until(accept: Accept) -> Self {
        Self {
            accept,
            best_effort: false,
        }
    }

    pub fn best_effort(accept: Accept) -> Self {
        Self {
            accept,
            best_effort: true,
        }
    }
}

/// Predicate applied to a polled observation.
#[derive(Debug, Clone)]
pub enum Accept {
    AmountAtLeast(TokenAmount),
    AmountPositive,
    CanClaimIs(bool),
}

/// Operand of an `Assert` step, resolved against the scenario's recorded
/// values and bindings at evaluation time.
#[derive(Debug, Clone)]
pub enum Source {
    /// A value recorded by an earlier `Observe` or `Act` step.
    Recorded(String),
    /// A literal amount.
    Amount(TokenAmount),
    /// A literal string.
    Text(String),
    /// The bound identity's address as text.
    AddressOf(String),
    /// Exact sum of several recorded amounts (conservation checks).
    SumRecorded(Vec<String>),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_collects_steps_in_order() {
        let scenario = Scenario::new("peer-transfer")
            .step(Step::Provision {
                bind: "a".into(),
                prefix: "userA".into(),
            })
            .step(Step::Observe {
                actor: "a".into(),
                what: ObserveKind::Balance,
                record: "a_before".into(),
                settle: None,
            });

        assert_eq!(scenario.name, "peer-transfer");
        assert!(scenario.group.is_none());
        assert_eq!(scenario.steps.len(), 2);
        assert_eq!(scenario.steps[0].label(), "provision a");
        assert_eq!(scenario.steps[1].label(), "observe Balance of a");
    }

    #[test]
    fn group_marks_shared_state() {
        let scenario = Scenario::new("funded-transfer").with_group("seed");
        assert_eq!(scenario.group.as_deref(), Some("seed"));
    }
}
