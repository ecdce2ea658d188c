//! Scenario orchestration.
//!
//! Runs scenarios concurrently as cooperative futures, one logical actor
//! per scenario: steps within a scenario execute strictly in order, while
//! independent scenarios interleave at suspension points. Scenarios that
//! declare the same serialization group contend on a per-group mutex, so
//! at most one of them runs at a time; that protects backend-global
//! identities (pre-funded seed accounts) from interleaved mutation.
//!
//! Every suspension point carries a timeout. On timeout the step fails
//! with the `Timeout` outcome, distinct from a backend-reported failure,
//! and the scenario terminates without compensating actions: the backend
//! is the system of record, rollback is its responsibility.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use futures::future::join_all;
use tracing::{debug, info, warn};

use settle_proto::{HarnessError, Result, TokenAmount};

use crate::assertions::{check, Observed};
use crate::client::LedgerBackend;
use crate::config::HarnessConfig;
use crate::faults::drive_invalid;
use crate::identity::{Identity, Provisioner};
use crate::poller::{poll, PollBudget, PollOutcome};
use crate::report::{ScenarioReport, StepOutcome, StepReport, SuiteReport, Verdict};
use crate::scenario::{Accept, Action, ObserveKind, Recipient, Scenario, Source, Step};

type GroupLock = Arc<tokio::sync::Mutex<()>>;

/// Drives scenarios against a ledger backend.
pub struct Orchestrator<B: LedgerBackend> {
    backend: Arc<B>,
    provisioner: Provisioner<B>,
    config: HarnessConfig,
    groups: Mutex<HashMap<String, GroupLock>>,
}

impl<B: LedgerBackend> Orchestrator<B> {
    pub fn new(backend: Arc<B>, config: HarnessConfig) -> Self {
        let provisioner = Provisioner::new(Arc::clone(&backend), config.auth_timeout());
        Self {
            backend,
            provisioner,
            config,
            groups: Mutex::new(HashMap::new()),
        }
    }

    /// Runs all scenarios, interleaving freely except within serialization
    /// groups, and aggregates their reports.
    pub async fn run_suite(&self, scenarios: &[Scenario]) -> SuiteReport {
        let started = Instant::now();
        let reports = join_all(scenarios.iter().map(|s| self.run_scenario(s))).await;
        SuiteReport {
            scenarios: reports,
            duration: started.elapsed(),
        }
    }

    /// Runs one scenario to its terminal verdict.
    pub async fn run_scenario(&self, scenario: &Scenario) -> ScenarioReport {
        let started = Instant::now();

        // Hold the group lock for the whole scenario, not per step:
        // mutual exclusion protects the shared identity across the entire
        // provision-act-verify sequence.
        let group_lock = scenario.group.as_deref().map(|g| self.group_lock(g));
        let _guard = match &group_lock {
            Some(lock) => {
                debug!(scenario = %scenario.name, group = scenario.group.as_deref(), "waiting for serialization group");
                Some(lock.lock().await)
            }
            None => None,
        };
        info!(scenario = %scenario.name, "starting scenario");

        let mut bindings: HashMap<String, Identity> = HashMap::new();
        let mut records: HashMap<String, Observed> = HashMap::new();
        let mut steps = Vec::with_capacity(scenario.steps.len());
        let mut verdict = Verdict::Passed;
        let mut first_error = None;

        for (index, step) in scenario.steps.iter().enumerate() {
            let index = index + 1;
            let label = step.label();
            match self.run_step(step, &mut bindings, &mut records).await {
                Ok(StepOutcome::Warned(detail)) => {
                    warn!(scenario = %scenario.name, step = index, %detail, "best-effort settlement unconfirmed");
                    if verdict == Verdict::Passed {
                        verdict = Verdict::Warning;
                    }
                    steps.push(StepReport {
                        index,
                        label,
                        outcome: StepOutcome::Warned(detail),
                    });
                }
                Ok(outcome) => {
                    steps.push(StepReport {
                        index,
                        label,
                        outcome,
                    });
                }
                Err(error) => {
                    warn!(scenario = %scenario.name, step = index, %error, "scenario failed");
                    verdict = Verdict::Failed;
                    first_error = Some(format!("step {index} ({label}): {error}"));
                    steps.push(StepReport {
                        index,
                        label,
                        outcome: StepOutcome::Failed(error),
                    });
                    break;
                }
            }
        }

        info!(scenario = %scenario.name, verdict = verdict.as_str(), "scenario finished");
        ScenarioReport {
            name: scenario.name.clone(),
            verdict,
            steps,
            first_error,
            duration: started.elapsed(),
        }
    }

    fn group_lock(&self, name: &str) -> GroupLock {
        let mut groups = self.groups.lock().expect("group registry poisoned");
        Arc::clone(groups.entry(name.to_string()).or_default())
    }

    async fn run_step(
        &self,
        step: &Step,
        bindings: &mut HashMap<String, Identity>,
        records: &mut HashMap<String, Observed>,
    ) -> Result<StepOutcome> {
        match step {
            Step::Provision { bind, prefix } => {
                let identity = self.provisioner.provision(prefix).await?;
                let detail = format!("{} as {}", identity.handle, identity.address);
                bindings.insert(bind.clone(), identity);
                Ok(StepOutcome::Completed(detail))
            }

            Step::Authenticate {
                bind,
                email,
                password,
            } => {
                let identity = self.provisioner.authenticate(email, password).await?;
                let detail = format!("{} as {}", identity.handle, identity.address);
                bindings.insert(bind.clone(), identity);
                Ok(StepOutcome::Completed(detail))
            }

            Step::Act {
                actor,
                action,
                record_outcome,
            } => {
                let identity = resolve_actor(bindings, actor)?.clone();
                let result = self.act(&identity, action, bindings).await;
                match (result, record_outcome) {
                    (Ok(receipt), record) => {
                        if let Some(key) = record {
                            records.insert(key.clone(), Observed::Rejection(None));
                        }
                        Ok(StepOutcome::Completed(format!("accepted: {receipt}")))
                    }
                    (Err(HarnessError::Action(reason) | HarnessError::Auth(reason)), Some(key)) => {
                        records.insert(key.clone(), Observed::Rejection(Some(reason.clone())));
                        Ok(StepOutcome::Completed(format!("rejected: {reason}")))
                    }
                    // Actions are not retried implicitly; an unexpected
                    // rejection is a terminal scenario outcome.
                    (Err(error), _) => Err(error),
                }
            }

            Step::Observe {
                actor,
                what,
                record,
                settle,
            } => {
                let identity = resolve_actor(bindings, actor)?.clone();
                match settle {
                    None => {
                        let observed = self.observe_once(&identity, *what).await?;
                        let detail = observed.to_string();
                        records.insert(record.clone(), observed);
                        Ok(StepOutcome::Completed(detail))
                    }
                    Some(spec) => {
                        let budget = PollBudget::from(&self.config.poll);
                        let accept = &spec.accept;
                        let outcome = poll(
                            &budget,
                            || self.observe_once(&identity, *what),
                            |observed| accept_matches(accept, observed),
                        )
                        .await;
                        match outcome {
                            PollOutcome::Settled { value, attempts } => {
                                let detail = format!("{value} (settled, attempt {attempts})");
                                records.insert(record.clone(), value);
                                Ok(StepOutcome::Completed(detail))
                            }
                            PollOutcome::Exhausted { attempts, last } => {
                                let detail = match &last {
                                    Some(value) => format!("last observed {value}"),
                                    None => "nothing observed".to_string(),
                                };
                                if spec.best_effort {
                                    if let Some(value) = last {
                                        records.insert(record.clone(), value);
                                    }
                                    Ok(StepOutcome::Warned(format!(
                                        "unsettled after {attempts} attempts ({detail})"
                                    )))
                                } else {
                                    Err(HarnessError::Exhausted { attempts, detail })
                                }
                            }
                            PollOutcome::Transport { error, .. } => Err(error),
                        }
                    }
                }
            }

            Step::Assert {
                label,
                kind,
                observed,
                expected,
            } => {
                let observed = resolve_source(observed, bindings, records)?;
                let expected = expected
                    .as_ref()
                    .map(|source| resolve_source(source, bindings, records))
                    .transpose()?;
                let result = check(kind, &observed, expected.as_ref());
                debug!(assert = %label, passed = result.passed, detail = %result.detail, "assertion evaluated");
                result
                    .into_result()
                    .map_err(|e| rename_assertion(e, label))?;
                Ok(StepOutcome::Completed(label.clone()))
            }

            Step::Fault {
                actor,
                kind,
                record,
            } => {
                let identity = resolve_actor(bindings, actor)?.clone();
                // The driver budgets each of its backend calls itself.
                let result = drive_invalid(
                    self.backend.as_ref(),
                    *kind,
                    &identity,
                    self.config.token.decimals,
                    self.config.request_timeout(),
                )
                .await?;

                let detail = result.observed().to_string();
                if let Some(key) = record {
                    records.insert(key.clone(), result.observed());
                }
                Ok(StepOutcome::Completed(detail))
            }
        }
    }

    async fn act(
        &self,
        identity: &Identity,
        action: &Action,
        bindings: &HashMap<String, Identity>,
    ) -> Result<String> {
        let timeout = self.config.request_timeout();
        match action {
            Action::Transfer { to, amount } => {
                let recipient = match to {
                    Recipient::Bound(name) => {
                        resolve_actor(bindings, name)?.address.to_string()
                    }
                    Recipient::Own => identity.address.to_string(),
                    Recipient::Literal(raw) => raw.clone(),
                };
                let receipt = tokio::time::timeout(
                    timeout,
                    self.backend
                        .transfer(&identity.token, &recipient, amount, &identity.password),
                )
                .await
                .map_err(|_| HarnessError::Timeout(timeout))??;
                Ok(receipt.tx_hash)
            }
            Action::ClaimReward => {
                let receipt = tokio::time::timeout(
                    timeout,
                    self.backend
                        .claim_reward(&identity.token, &identity.password),
                )
                .await
                .map_err(|_| HarnessError::Timeout(timeout))??;
                Ok(receipt.tx_hash)
            }
        }
    }

    async fn observe_once(&self, identity: &Identity, what: ObserveKind) -> Result<Observed> {
        let timeout = self.config.request_timeout();
        let read = async {
            match what {
                ObserveKind::Balance => {
                    let info = self.backend.balance(&identity.address).await?;
                    Ok(Observed::Amount(info.balance))
                }
                ObserveKind::RewardEligibility => {
                    let status = self.backend.reward_status(&identity.address).await?;
                    Ok(Observed::Flag(status.can_claim))
                }
                ObserveKind::OwnAddress => {
                    let user = self.backend.me(&identity.token).await?;
                    Ok(Observed::Text(user.address))
                }
            }
        };
        tokio::time::timeout(timeout, read)
            .await
            .map_err(|_| HarnessError::Timeout(timeout))?
    }
}

fn resolve_actor<'a>(
    bindings: &'a HashMap<String, Identity>,
    name: &str,
) -> Result<&'a Identity> {
    bindings.get(name).ok_or_else(|| {
        HarnessError::Binding(format!("step references unbound identity '{name}'"))
    })
}

fn resolve_source(
    source: &Source,
    bindings: &HashMap<String, Identity>,
    records: &HashMap<String, Observed>,
) -> Result<Observed> {
    match source {
        Source::Recorded(key) => records.get(key).cloned().ok_or_else(|| {
            HarnessError::Binding(format!("assertion references unrecorded value '{key}'"))
        }),
        Source::Amount(amount) => Ok(Observed::Amount(*amount)),
        Source::Text(text) => Ok(Observed::Text(text.clone())),
        Source::AddressOf(name) => {
            Ok(Observed::Text(resolve_actor(bindings, name)?.address.to_string()))
        }
        Source::SumRecorded(keys) => {
            let mut total = TokenAmount::ZERO;
            for key in keys {
                match records.get(key) {
                    Some(Observed::Amount(amount)) => {
                        total = total.checked_add(amount).ok_or_else(|| {
                            HarnessError::Binding(format!("sum over '{key}' overflowed"))
                        })?;
                    }
                    Some(other) => {
                        return Err(HarnessError::Binding(format!(
                            "sum operand '{key}' is not an amount ({other})"
                        )));
                    }
                    None => {
                        return Err(HarnessError::Binding(format!(
                            "sum references unrecorded value '{key}'"
                        )));
                    }
                }
            }
            Ok(Observed::Amount(total))
        }
    }
}

fn accept_matches(accept: &Accept, observed: &Observed) -> bool {
    match (accept, observed) {
        (Accept::AmountAtLeast(min), Observed::Amount(amount)) => amount >= min,
        (Accept::AmountPositive, Observed::Amount(amount)) => !amount.is_zero(),
        (Accept::CanClaimIs(expected), Observed::Flag(actual)) => actual == expected,
        _ => false,
    }
}

fn rename_assertion(error: HarnessError, label: &str) -> HarnessError {
    match error {
        HarnessError::Assertion(detail) => {
            HarnessError::Assertion(format!("{label}: {detail}"))
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unbound_actor_is_a_binding_error() {
        let bindings = HashMap::new();
        let err = resolve_actor(&bindings, "ghost").unwrap_err();
        assert!(matches!(err, HarnessError::Binding(_)));
        assert!(err.to_string().contains("ghost"));
    }

    #[test]
    fn sum_source_adds_exactly() {
        let bindings = HashMap::new();
        let mut records = HashMap::new();
        records.insert(
            "a".to_string(),
            Observed::Amount(TokenAmount::from_base_units("1000000000000000000").unwrap()),
        );
        records.insert(
            "b".to_string(),
            Observed::Amount(TokenAmount::from_base_units("500000000000000000").unwrap()),
        );

        let observed = resolve_source(
            &Source::SumRecorded(vec!["a".into(), "b".into()]),
            &bindings,
            &records,
        )
        .unwrap();
        assert_eq!(
            observed,
            Observed::Amount(TokenAmount::from_base_units("1500000000000000000").unwrap())
        );
    }

    #[test]
    fn accept_predicates() {
        let one = TokenAmount::from_base_units("1").unwrap();
        assert!(accept_matches(
            &Accept::AmountAtLeast(one),
            &Observed::Amount(one)
        ));
        assert!(!accept_matches(
            &Accept::AmountPositive,
            &Observed::Amount(TokenAmount::ZERO)
        ));
        assert!(accept_matches(&Accept::CanClaimIs(false), &Observed::Flag(false)));
        // Type confusion never settles.
        assert!(!accept_matches(&Accept::AmountPositive, &Observed::Flag(true)));
    }
}
