//! Built-in scenario suite.
//!
//! Covers the settlement flows end users actually exercise: register and
//! claim, peer transfers funded by a claim, transfers from a pre-funded
//! seed account, and the invalid-action paths. Fresh identities fund
//! themselves through the daily reward so the suite runs against an empty
//! deployment; seed-account scenarios appear only when the config names
//! one, and carry its serialization group.

use anyhow::Context;
use settle_core::{
    Accept, Action, CheckKind, FaultKind, HarnessConfig, ObserveKind, Recipient, Scenario,
    SettleSpec, Source, Step,
};
use settle_proto::{TokenAmount, ADDRESS_PATTERN};

/// Builds the built-in suite for a configuration.
pub fn built_in(config: &HarnessConfig) -> anyhow::Result<Vec<Scenario>> {
    let decimals = config.token.decimals;
    let one = TokenAmount::units(1, decimals).context("composing transfer amount")?;

    let mut suite = vec![
        register_claim(),
        register_observe(),
        peer_transfer(one),
        wrong_password_login(),
        wrong_password_claim(),
        excess_transfer(),
        self_transfer(),
        malformed_address(),
    ];

    if let Some(seed) = &config.seed_account {
        suite.push(funded_transfer(seed, one));
    }

    Ok(suite)
}

/// A fresh account starts empty, and a reward claim settles into a
/// positive balance and a spent eligibility flag.
fn register_claim() -> Scenario {
    Scenario::new("register-claim")
        .step(Step::Provision {
            bind: "u".into(),
            prefix: "claimer".into(),
        })
        .step(Step::Observe {
            actor: "u".into(),
            what: ObserveKind::Balance,
            record: "before".into(),
            settle: None,
        })
        .step(Step::Assert {
            label: "fresh account starts at zero".into(),
            kind: CheckKind::ExactEquals,
            observed: Source::Recorded("before".into()),
            expected: Some(Source::Amount(TokenAmount::ZERO)),
        })
        // Claim only once the account reports itself eligible.
        .step(Step::Observe {
            actor: "u".into(),
            what: ObserveKind::RewardEligibility,
            record: "eligible_before".into(),
            settle: Some(SettleSpec::until(Accept::CanClaimIs(true))),
        })
        .step(Step::Act {
            actor: "u".into(),
            action: Action::ClaimReward,
            record_outcome: None,
        })
        .step(Step::Observe {
            actor: "u".into(),
            what: ObserveKind::Balance,
            record: "after".into(),
            settle: Some(SettleSpec::until(Accept::AmountPositive)),
        })
        .step(Step::Observe {
            actor: "u".into(),
            what: ObserveKind::RewardEligibility,
            record: "eligible_after".into(),
            settle: Some(SettleSpec::until(Accept::CanClaimIs(false))),
        })
        .step(Step::Assert {
            label: "claim only adds funds".into(),
            kind: CheckKind::GreaterOrEqual,
            observed: Source::Recorded("after".into()),
            expected: Some(Source::Recorded("before".into())),
        })
}

/// Registration yields a stable, well-formed address.
fn register_observe() -> Scenario {
    Scenario::new("register-observe")
        .step(Step::Provision {
            bind: "u".into(),
            prefix: "observer".into(),
        })
        .step(Step::Observe {
            actor: "u".into(),
            what: ObserveKind::OwnAddress,
            record: "addr".into(),
            settle: None,
        })
        .step(Step::Assert {
            label: "address is well-formed".into(),
            kind: CheckKind::FormatMatches(ADDRESS_PATTERN.into()),
            observed: Source::Recorded("addr".into()),
            expected: None,
        })
        .step(Step::Assert {
            label: "session address matches registration".into(),
            kind: CheckKind::ExactEquals,
            observed: Source::Recorded("addr".into()),
            expected: Some(Source::AddressOf("u".into())),
        })
        .step(Step::Observe {
            actor: "u".into(),
            what: ObserveKind::OwnAddress,
            record: "addr_again".into(),
            settle: None,
        })
        .step(Step::Assert {
            label: "address stable across reads".into(),
            kind: CheckKind::ExactEquals,
            observed: Source::Recorded("addr_again".into()),
            expected: Some(Source::Recorded("addr".into())),
        })
        .step(Step::Observe {
            actor: "u".into(),
            what: ObserveKind::Balance,
            record: "balance".into(),
            settle: None,
        })
        .step(Step::Assert {
            label: "new account holds nothing".into(),
            kind: CheckKind::ExactEquals,
            observed: Source::Recorded("balance".into()),
            expected: Some(Source::Amount(TokenAmount::ZERO)),
        })
}

/// Two fresh identities: the sender funds itself through a claim, then a
/// transfer settles into the recipient's balance for the exact amount.
fn peer_transfer(amount: TokenAmount) -> Scenario {
    Scenario::new("peer-transfer")
        .step(Step::Provision {
            bind: "a".into(),
            prefix: "sender".into(),
        })
        .step(Step::Provision {
            bind: "b".into(),
            prefix: "recipient".into(),
        })
        .step(Step::Act {
            actor: "a".into(),
            action: Action::ClaimReward,
            record_outcome: None,
        })
        .step(Step::Observe {
            actor: "a".into(),
            what: ObserveKind::Balance,
            record: "a_funded".into(),
            settle: Some(SettleSpec::until(Accept::AmountAtLeast(amount))),
        })
        .step(Step::Act {
            actor: "a".into(),
            action: Action::Transfer {
                to: Recipient::Bound("b".into()),
                amount,
            },
            record_outcome: None,
        })
        .step(Step::Observe {
            actor: "b".into(),
            what: ObserveKind::Balance,
            record: "b_after".into(),
            settle: Some(SettleSpec::until(Accept::AmountAtLeast(amount))),
        })
        .step(Step::Assert {
            label: "recipient credited the exact amount".into(),
            kind: CheckKind::ExactEquals,
            observed: Source::Recorded("b_after".into()),
            expected: Some(Source::Amount(amount)),
        })
        .step(Step::Observe {
            actor: "a".into(),
            what: ObserveKind::Balance,
            record: "a_after".into(),
            settle: None,
        })
        .step(Step::Assert {
            label: "sender never gains from a send".into(),
            kind: CheckKind::LessOrEqual,
            observed: Source::Recorded("a_after".into()),
            expected: Some(Source::Recorded("a_funded".into())),
        })
        .step(Step::Assert {
            label: "no value created across the pair".into(),
            kind: CheckKind::LessOrEqual,
            observed: Source::SumRecorded(vec!["a_after".into(), "b_after".into()]),
            expected: Some(Source::Recorded("a_funded".into())),
        })
}

/// Transfer from the deployment's pre-funded account. Settlement is
/// best-effort here: the shared account lives on a real chain and its
/// latency is not under the suite's control.
fn funded_transfer(seed: &settle_core::SeedAccount, amount: TokenAmount) -> Scenario {
    Scenario::new("funded-transfer")
        .with_group(seed.group.clone())
        .step(Step::Authenticate {
            bind: "seed".into(),
            email: seed.email.clone(),
            password: seed.password.clone(),
        })
        .step(Step::Observe {
            actor: "seed".into(),
            what: ObserveKind::Balance,
            record: "seed_before".into(),
            settle: None,
        })
        .step(Step::Provision {
            bind: "b".into(),
            prefix: "funded-recipient".into(),
        })
        .step(Step::Act {
            actor: "seed".into(),
            action: Action::Transfer {
                to: Recipient::Bound("b".into()),
                amount,
            },
            record_outcome: None,
        })
        .step(Step::Observe {
            actor: "b".into(),
            what: ObserveKind::Balance,
            record: "b_after".into(),
            settle: Some(SettleSpec::best_effort(Accept::AmountAtLeast(amount))),
        })
        .step(Step::Observe {
            actor: "seed".into(),
            what: ObserveKind::Balance,
            record: "seed_after".into(),
            settle: None,
        })
        .step(Step::Assert {
            label: "seed account never gains from a send".into(),
            kind: CheckKind::LessOrEqual,
            observed: Source::Recorded("seed_after".into()),
            expected: Some(Source::Recorded("seed_before".into())),
        })
}

fn wrong_password_login() -> Scenario {
    Scenario::new("wrong-password-login")
        .step(Step::Provision {
            bind: "u".into(),
            prefix: "victim".into(),
        })
        .step(Step::Fault {
            actor: "u".into(),
            kind: FaultKind::WrongSecretLogin,
            record: Some("outcome".into()),
        })
        .step(Step::Assert {
            label: "wrong password rejected at login".into(),
            kind: CheckKind::ErrorSurfaced("password".into()),
            observed: Source::Recorded("outcome".into()),
            expected: None,
        })
}

fn wrong_password_claim() -> Scenario {
    Scenario::new("wrong-password-claim")
        .step(Step::Provision {
            bind: "u".into(),
            prefix: "victim".into(),
        })
        .step(Step::Fault {
            actor: "u".into(),
            kind: FaultKind::WrongSecretClaim,
            record: Some("outcome".into()),
        })
        .step(Step::Assert {
            label: "wrong password rejected at claim".into(),
            kind: CheckKind::ErrorSurfaced("password".into()),
            observed: Source::Recorded("outcome".into()),
            expected: None,
        })
}

fn excess_transfer() -> Scenario {
    Scenario::new("excess-transfer")
        .step(Step::Provision {
            bind: "u".into(),
            prefix: "overdrawn".into(),
        })
        .step(Step::Fault {
            actor: "u".into(),
            kind: FaultKind::ExcessTransfer,
            record: Some("outcome".into()),
        })
        .step(Step::Assert {
            label: "overspend degrades safely".into(),
            kind: CheckKind::ErrorSurfaced("insufficient".into()),
            observed: Source::Recorded("outcome".into()),
            expected: None,
        })
}

fn self_transfer() -> Scenario {
    Scenario::new("self-transfer")
        .step(Step::Provision {
            bind: "u".into(),
            prefix: "narcissist".into(),
        })
        .step(Step::Fault {
            actor: "u".into(),
            kind: FaultKind::SelfTransfer,
            record: Some("outcome".into()),
        })
        .step(Step::Assert {
            label: "self-transfer degrades safely".into(),
            kind: CheckKind::ErrorSurfaced("self".into()),
            observed: Source::Recorded("outcome".into()),
            expected: None,
        })
}

fn malformed_address() -> Scenario {
    Scenario::new("malformed-address")
        .step(Step::Provision {
            bind: "u".into(),
            prefix: "fumble".into(),
        })
        .step(Step::Fault {
            actor: "u".into(),
            kind: FaultKind::MalformedRecipient,
            record: Some("outcome".into()),
        })
        .step(Step::Assert {
            label: "malformed recipient degrades safely".into(),
            kind: CheckKind::ErrorSurfaced("address".into()),
            observed: Source::Recorded("outcome".into()),
            expected: None,
        })
}
