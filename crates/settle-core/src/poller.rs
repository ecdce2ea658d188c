//! Fixed-delay settlement poller.
//!
//! Every settlement check in the harness runs through this single
//! contract, so retry policy is defined once and independently testable.
//! The delay is fixed rather than exponential: the target system settles
//! in roughly constant time (one local confirmation), not under load.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, trace};

use settle_proto::{HarnessError, Result};

use crate::config::PollConfig;

/// Retry budget for one settlement check.
#[derive(Debug, Clone, Copy)]
pub struct PollBudget {
    pub max_attempts: u32,
    pub interval: Duration,
    /// Optional settle grace before the first observation.
    pub grace: Duration,
}

impl PollBudget {
    pub fn new(max_attempts: u32, interval: Duration) -> Self {
        Self {
            max_attempts,
            interval,
            grace: Duration::ZERO,
        }
    }

    pub fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }
}

impl From<&PollConfig> for PollBudget {
    fn from(config: &PollConfig) -> Self {
        PollBudget::new(config.max_attempts, config.interval()).with_grace(config.grace())
    }
}

/// Terminal state of a poll.
///
/// `Exhausted` means the retry budget elapsed while the result was still
/// pending; it carries the last observed value for diagnostics. `Transport`
/// means the backend was unreachable or returned garbage, which is
/// infrastructure failure, never slow settlement, and is reported after the
/// attempt that hit it without consuming the rest of the budget.
#[derive(Debug)]
pub enum PollOutcome<T> {
    Settled { value: T, attempts: u32 },
    Exhausted { attempts: u32, last: Option<T> },
    Transport { error: HarnessError, attempts: u32 },
}

impl<T> PollOutcome<T> {
    pub fn is_settled(&self) -> bool {
        matches!(self, PollOutcome::Settled { .. })
    }
}

/// Repeatedly calls `observe` until `accept` holds or the budget runs out.
///
/// The first observation happens immediately after the grace period; each
/// subsequent one after a fixed `interval` sleep. Exactly
/// `budget.max_attempts` observations are made on an always-false
/// predicate.
pub async fn poll<T, Obs, Fut, Acc>(budget: &PollBudget, mut observe: Obs, accept: Acc) -> PollOutcome<T>
where
    Obs: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
    Acc: Fn(&T) -> bool,
{
    if !budget.grace.is_zero() {
        trace!(grace = ?budget.grace, "settle grace before first observation");
        tokio::time::sleep(budget.grace).await;
    }

    let mut last = None;
    for attempt in 1..=budget.max_attempts {
        match observe().await {
            Ok(value) => {
                if accept(&value) {
                    debug!(attempt, "observation settled");
                    return PollOutcome::Settled {
                        value,
                        attempts: attempt,
                    };
                }
                trace!(attempt, "still pending");
                last = Some(value);
            }
            Err(error) => {
                debug!(attempt, %error, "observation hit transport failure");
                return PollOutcome::Transport {
                    error,
                    attempts: attempt,
                };
            }
        }
        if attempt < budget.max_attempts {
            tokio::time::sleep(budget.interval).await;
        }
    }

    debug!(attempts = budget.max_attempts, "poll budget exhausted");
    PollOutcome::Exhausted {
        attempts: budget.max_attempts,
        last,
    }
}
