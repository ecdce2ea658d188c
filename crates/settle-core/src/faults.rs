//! Fault-path driver.
//!
//! Issues deliberately invalid actions and checks the system degrades
//! without corrupting state. This is a fails-safe check: a structured
//! error is recorded when the backend surfaces one, but only asserted
//! where the contract documents it (wrong-secret login and claim). For
//! the rest, the properties that always hold are (a) the acting session
//! stays on its authenticated surface and (b) no balance invariant is
//! violated.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, info};

use settle_proto::{HarnessError, Result, TokenAmount};

use crate::assertions::Observed;
use crate::client::LedgerBackend;
use crate::identity::Identity;

/// Well-formed but arbitrary recipient used for the excess-amount case.
const SINK_ADDRESS: &str = "0x1234567890123456789012345678901234567890";

const WRONG_SECRET: &str = "Wrong-Password-123!";

/// The invalid actions the driver knows how to issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    WrongSecretLogin,
    WrongSecretClaim,
    ExcessTransfer,
    SelfTransfer,
    MalformedRecipient,
}

/// Outcome of one fault-path probe.
#[derive(Debug, Clone)]
pub struct FaultResult {
    pub kind: FaultKind,
    /// Backend error string when one was surfaced; `None` when the flow
    /// completed without a structured error channel.
    pub rejection: Option<String>,
    pub balance_before: TokenAmount,
    pub balance_after: TokenAmount,
}

impl FaultResult {
    /// The recorded outcome in assertion-engine terms.
    pub fn observed(&self) -> Observed {
        Observed::Rejection(self.rejection.clone())
    }
}

/// Issues the invalid action for `kind` as `session` and verifies the
/// fails-safe properties. Returns the outcome, or an `Assertion` error
/// naming the violated property. Transport failures and timeouts
/// propagate unchanged; each backend call runs under its own `timeout`
/// budget so a slow-but-healthy backend is not misreported.
pub async fn drive_invalid<B: LedgerBackend>(
    backend: &B,
    kind: FaultKind,
    session: &Identity,
    decimals: u32,
    timeout: Duration,
) -> Result<FaultResult> {
    let balance_before = budgeted(timeout, backend.balance(&session.address))
        .await?
        .balance;
    debug!(handle = %session.handle, ?kind, balance = %balance_before, "driving fault path");

    let rejection = match kind {
        FaultKind::WrongSecretLogin => {
            match budgeted(timeout, backend.login(&session.email, WRONG_SECRET)).await {
                Ok(_) => {
                    return Err(HarnessError::Assertion(format!(
                        "{}: login with a wrong secret was accepted and issued a token",
                        session.handle
                    )));
                }
                Err(HarnessError::Auth(reason)) => Some(reason),
                Err(other) => return Err(other),
            }
        }
        FaultKind::WrongSecretClaim => {
            match budgeted(timeout, backend.claim_reward(&session.token, WRONG_SECRET)).await {
                Ok(receipt) => {
                    return Err(HarnessError::Assertion(format!(
                        "{}: reward claim with a wrong secret was accepted ({})",
                        session.handle, receipt.tx_hash
                    )));
                }
                Err(HarnessError::Action(reason) | HarnessError::Auth(reason)) => Some(reason),
                Err(other) => return Err(other),
            }
        }
        FaultKind::ExcessTransfer => {
            let excess = fault_amount(1_000_000, decimals)?
                .checked_add(&balance_before)
                .ok_or_else(|| {
                    HarnessError::Binding("excess-transfer amount overflowed".into())
                })?;
            submit_transfer(backend, session, SINK_ADDRESS, &excess, timeout).await?
        }
        FaultKind::SelfTransfer => {
            let one = fault_amount(1, decimals)?;
            let own = session.address.to_string();
            submit_transfer(backend, session, &own, &one, timeout).await?
        }
        FaultKind::MalformedRecipient => {
            let one = fault_amount(1, decimals)?;
            submit_transfer(backend, session, "0xinvalid", &one, timeout).await?
        }
    };

    // Property (a): the session survived. `me` still answers with the
    // original address under the original token. Only an auth rejection
    // here means the session was lost; an unreachable backend is an
    // infrastructure failure, not a safety violation.
    let user = match budgeted(timeout, backend.me(&session.token)).await {
        Ok(user) => user,
        Err(HarnessError::Auth(reason)) => {
            return Err(HarnessError::Assertion(format!(
                "{}: session lost after {kind:?} fault ({reason})",
                session.handle
            )));
        }
        Err(other) => return Err(other),
    };
    if !session.address.as_str().eq_ignore_ascii_case(&user.address) {
        return Err(HarnessError::Assertion(format!(
            "{}: address changed after {kind:?} fault: {} -> {}",
            session.handle, session.address, user.address
        )));
    }

    // Property (b): balance invariants hold. A malformed recipient must
    // mutate nothing; the other transfer faults must never increase the
    // sender's balance.
    let balance_after = budgeted(timeout, backend.balance(&session.address))
        .await?
        .balance;
    match kind {
        FaultKind::MalformedRecipient if balance_after != balance_before => {
            return Err(HarnessError::Assertion(format!(
                "{}: malformed-recipient transfer mutated balance {} -> {}",
                session.handle, balance_before, balance_after
            )));
        }
        _ if balance_after > balance_before
            && matches!(kind, FaultKind::ExcessTransfer | FaultKind::SelfTransfer) =>
        {
            return Err(HarnessError::Assertion(format!(
                "{}: {kind:?} fault increased balance {} -> {}",
                session.handle, balance_before, balance_after
            )));
        }
        _ => {}
    }

    info!(handle = %session.handle, ?kind, surfaced = rejection.is_some(), "fault path degraded safely");
    Ok(FaultResult {
        kind,
        rejection,
        balance_before,
        balance_after,
    })
}

async fn submit_transfer<B: LedgerBackend>(
    backend: &B,
    session: &Identity,
    to: &str,
    amount: &TokenAmount,
    timeout: Duration,
) -> Result<Option<String>> {
    match budgeted(
        timeout,
        backend.transfer(&session.token, to, amount, &session.password),
    )
    .await
    {
        // Degraded-but-non-crashing acceptance: the contract does not
        // promise a structured error for every invalid transfer.
        Ok(_) => Ok(None),
        Err(HarnessError::Action(reason) | HarnessError::Auth(reason)) => Ok(Some(reason)),
        Err(other) => Err(other),
    }
}

async fn budgeted<T>(timeout: Duration, fut: impl Future<Output = Result<T>>) -> Result<T> {
    tokio::time::timeout(timeout, fut)
        .await
        .map_err(|_| HarnessError::Timeout(timeout))?
}

fn fault_amount(units: u64, decimals: u32) -> Result<TokenAmount> {
    TokenAmount::units(units, decimals)
        .map_err(|e| HarnessError::Binding(format!("composing fault amount: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockLedger;
    use async_trait::async_trait;
    use settle_proto::{Address, AuthPayload, BalanceInfo, RewardStatus, TxReceipt, UserInfo};

    /// Delegates to a mock ledger, optionally failing `me` and delaying
    /// every call by a fixed amount.
    struct ShimLedger {
        inner: MockLedger,
        delay: Duration,
        me_failure: Option<HarnessError>,
    }

    impl ShimLedger {
        fn new(inner: MockLedger) -> Self {
            Self {
                inner,
                delay: Duration::ZERO,
                me_failure: None,
            }
        }

        async fn pause(&self) {
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
        }
    }

    #[async_trait]
    impl LedgerBackend for ShimLedger {
        async fn register(&self, email: &str, password: &str) -> Result<AuthPayload> {
            self.pause().await;
            self.inner.register(email, password).await
        }

        async fn login(&self, email: &str, password: &str) -> Result<AuthPayload> {
            self.pause().await;
            self.inner.login(email, password).await
        }

        async fn me(&self, token: &str) -> Result<UserInfo> {
            self.pause().await;
            if let Some(error) = &self.me_failure {
                return Err(error.clone());
            }
            self.inner.me(token).await
        }

        async fn balance(&self, address: &Address) -> Result<BalanceInfo> {
            self.pause().await;
            self.inner.balance(address).await
        }

        async fn transfer(
            &self,
            token: &str,
            to: &str,
            amount: &TokenAmount,
            password: &str,
        ) -> Result<TxReceipt> {
            self.pause().await;
            self.inner.transfer(token, to, amount, password).await
        }

        async fn reward_status(&self, address: &Address) -> Result<RewardStatus> {
            self.pause().await;
            self.inner.reward_status(address).await
        }

        async fn claim_reward(&self, token: &str, password: &str) -> Result<TxReceipt> {
            self.pause().await;
            self.inner.claim_reward(token, password).await
        }
    }

    async fn session_on(ledger: &ShimLedger) -> Identity {
        let payload = ledger.inner.register("fault@harness.test", "pw").await.unwrap();
        Identity {
            handle: "fault".into(),
            email: payload.email,
            password: "pw".into(),
            address: Address::parse(&payload.address).unwrap(),
            token: payload.token,
        }
    }

    #[tokio::test]
    async fn session_check_transport_failure_stays_transport() {
        let mut ledger = ShimLedger::new(MockLedger::new());
        ledger.me_failure = Some(HarnessError::Transport("connection refused".into()));
        let session = session_on(&ledger).await;

        let err = drive_invalid(
            &ledger,
            FaultKind::WrongSecretLogin,
            &session,
            18,
            Duration::from_secs(5),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, HarnessError::Transport(_)), "{err}");
    }

    #[tokio::test]
    async fn session_check_auth_rejection_is_session_lost() {
        let mut ledger = ShimLedger::new(MockLedger::new());
        ledger.me_failure = Some(HarnessError::Auth("invalid token".into()));
        let session = session_on(&ledger).await;

        let err = drive_invalid(
            &ledger,
            FaultKind::WrongSecretLogin,
            &session,
            18,
            Duration::from_secs(5),
        )
        .await
        .unwrap_err();
        assert!(
            matches!(err, HarnessError::Assertion(ref m) if m.contains("session lost")),
            "{err}"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_budget_applies_per_call_not_per_fault() {
        // Four round-trips of 3s each: 12s total, every call within the
        // 5s per-call budget.
        let mut ledger = ShimLedger::new(MockLedger::new());
        ledger.delay = Duration::from_secs(3);
        let session = session_on(&ledger).await;

        let result = drive_invalid(
            &ledger,
            FaultKind::SelfTransfer,
            &session,
            18,
            Duration::from_secs(5),
        )
        .await
        .unwrap();
        assert!(result.rejection.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_call_times_out() {
        let mut ledger = ShimLedger::new(MockLedger::new());
        ledger.delay = Duration::from_secs(30);
        let session = session_on(&ledger).await;

        let err = drive_invalid(
            &ledger,
            FaultKind::SelfTransfer,
            &session,
            18,
            Duration::from_secs(5),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, HarnessError::Timeout(_)), "{err}");
    }
}
