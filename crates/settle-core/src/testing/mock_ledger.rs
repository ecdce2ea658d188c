//! In-memory ledger backend with configurable settlement lag.
//!
//! Reproduces the behavior the harness is built to tolerate: accepted
//! actions whose effects become visible only after later reads, scripted
//! transport outages, and the original backend's rejection rules
//! (wrong password, insufficient balance, self-transfer, malformed
//! recipient). Engine tests run against this instead of a live backend.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;

use settle_proto::{
    Address, AuthPayload, BalanceInfo, HarnessError, Result, RewardStatus, TokenAmount,
    TxReceipt, UserInfo,
};

use crate::client::LedgerBackend;

/// Start/end instants of one mutating call, for exclusivity tests.
#[derive(Debug, Clone, Copy)]
pub struct CallSpan {
    pub started: Instant,
    pub finished: Instant,
}

#[derive(Debug, Clone)]
struct MockUser {
    user_id: u64,
    password: String,
    address: String,
}

#[derive(Debug, Clone)]
struct PendingCredit {
    to: String,
    amount: TokenAmount,
    reads_left: u32,
}

#[derive(Default)]
struct MockState {
    users: HashMap<String, MockUser>,
    tokens: HashMap<String, String>,
    balances: HashMap<String, TokenAmount>,
    claimed: HashSet<String>,
    pending: Vec<PendingCredit>,
    outages: u32,
    seq: u64,
    transfer_spans: Vec<CallSpan>,
}

/// Deterministic in-memory [`LedgerBackend`].
pub struct MockLedger {
    state: Mutex<MockState>,
    /// Accepted credits become visible after this many reads of the
    /// credited address.
    settlement_lag: u32,
    reward_amount: TokenAmount,
    /// Artificial time each transfer occupies, for overlap detection.
    transfer_hold: Duration,
}

impl MockLedger {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockState::default()),
            settlement_lag: 0,
            reward_amount: TokenAmount::from_base_units("100000000000000000000")
                .expect("static amount"),
            transfer_hold: Duration::ZERO,
        }
    }

    /// Credits settle only after `lag` reads of the credited address.
    pub fn with_settlement_lag(mut self, lag: u32) -> Self {
        self.settlement_lag = lag;
        self
    }

    pub fn with_reward_amount(mut self, amount: TokenAmount) -> Self {
        self.reward_amount = amount;
        self
    }

    pub fn with_transfer_hold(mut self, hold: Duration) -> Self {
        self.transfer_hold = hold;
        self
    }

    /// Pre-creates a funded account, like the deployment's seed identity.
    pub fn with_seed_account(self, email: &str, password: &str, balance: TokenAmount) -> Self {
        {
            let mut state = self.state.lock().expect("mock state poisoned");
            state.seq += 1;
            let seq = state.seq;
            let address = format!("0x{seq:040x}");
            state.balances.insert(address.to_lowercase(), balance);
            state.users.insert(
                email.to_string(),
                MockUser {
                    user_id: seq,
                    password: password.to_string(),
                    address,
                },
            );
        }
        self
    }

    /// The next `n` calls fail with a transport error.
    pub fn fail_next(&self, n: u32) {
        self.state.lock().expect("mock state poisoned").outages = n;
    }

    /// Spans of all accepted transfers, in acceptance order.
    pub fn transfer_spans(&self) -> Vec<CallSpan> {
        self.state
            .lock()
            .expect("mock state poisoned")
            .transfer_spans
            .clone()
    }

    /// Settled balance of an address, bypassing the read-lag model.
    pub fn settled_balance(&self, address: &str) -> TokenAmount {
        let state = self.state.lock().expect("mock state poisoned");
        state
            .balances
            .get(&address.to_lowercase())
            .copied()
            .unwrap_or(TokenAmount::ZERO)
    }

    fn take_outage(state: &mut MockState) -> bool {
        if state.outages > 0 {
            state.outages -= 1;
            true
        } else {
            false
        }
    }

    fn session_email(state: &MockState, token: &str) -> Result<String> {
        state
            .tokens
            .get(token)
            .cloned()
            .ok_or_else(|| HarnessError::Auth("invalid token".into()))
    }

    fn credit(state: &mut MockState, to: &str, amount: TokenAmount, lag: u32) {
        if lag == 0 {
            let entry = state
                .balances
                .entry(to.to_lowercase())
                .or_insert(TokenAmount::ZERO);
            *entry = entry.checked_add(&amount).unwrap_or(*entry);
        } else {
            state.pending.push(PendingCredit {
                to: to.to_lowercase(),
                amount,
                reads_left: lag,
            });
        }
    }

    /// Advances the settlement clock for `address`: each read of an
    /// address ticks its pending credits, applying those that reach zero.
    fn tick_pending(state: &mut MockState, address: &str) {
        let address = address.to_lowercase();
        let mut settled = Vec::new();
        for credit in &mut state.pending {
            if credit.to == address {
                credit.reads_left -= 1;
                if credit.reads_left == 0 {
                    settled.push((credit.to.clone(), credit.amount));
                }
            }
        }
        state.pending.retain(|c| c.reads_left > 0);
        for (to, amount) in settled {
            let entry = state.balances.entry(to).or_insert(TokenAmount::ZERO);
            *entry = entry.checked_add(&amount).unwrap_or(*entry);
        }
    }
}

impl Default for MockLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LedgerBackend for MockLedger {
    async fn register(&self, email: &str, password: &str) -> Result<AuthPayload> {
        let mut state = self.state.lock().expect("mock state poisoned");
        if Self::take_outage(&mut state) {
            return Err(HarnessError::Transport("mock outage".into()));
        }
        if state.users.contains_key(email) {
            return Err(HarnessError::Auth("email already registered".into()));
        }
        state.seq += 1;
        let seq = state.seq;
        let address = format!("0x{seq:040x}");
        let token = format!("mock-token-{seq}");
        state.users.insert(
            email.to_string(),
            MockUser {
                user_id: seq,
                password: password.to_string(),
                address: address.clone(),
            },
        );
        state.tokens.insert(token.clone(), email.to_string());
        state
            .balances
            .insert(address.to_lowercase(), TokenAmount::ZERO);
        Ok(AuthPayload {
            user_id: seq,
            email: email.to_string(),
            address,
            token,
        })
    }

    async fn login(&self, email: &str, password: &str) -> Result<AuthPayload> {
        let mut state = self.state.lock().expect("mock state poisoned");
        if Self::take_outage(&mut state) {
            return Err(HarnessError::Transport("mock outage".into()));
        }
        let user = state
            .users
            .get(email)
            .cloned()
            .ok_or_else(|| HarnessError::Auth("account not found".into()))?;
        if user.password != password {
            return Err(HarnessError::Auth("invalid password".into()));
        }
        state.seq += 1;
        let token = format!("mock-token-{}", state.seq);
        state.tokens.insert(token.clone(), email.to_string());
        Ok(AuthPayload {
            user_id: user.user_id,
            email: email.to_string(),
            address: user.address,
            token,
        })
    }

    async fn me(&self, token: &str) -> Result<UserInfo> {
        let mut state = self.state.lock().expect("mock state poisoned");
        if Self::take_outage(&mut state) {
            return Err(HarnessError::Transport("mock outage".into()));
        }
        let email = Self::session_email(&state, token)?;
        let user = state
            .users
            .get(&email)
            .cloned()
            .ok_or_else(|| HarnessError::Auth("invalid token".into()))?;
        Ok(UserInfo {
            user_id: user.user_id,
            email,
            address: user.address,
        })
    }

    async fn balance(&self, address: &Address) -> Result<BalanceInfo> {
        let mut state = self.state.lock().expect("mock state poisoned");
        if Self::take_outage(&mut state) {
            return Err(HarnessError::Transport("mock outage".into()));
        }
        Self::tick_pending(&mut state, address.as_str());
        let balance = state
            .balances
            .get(&address.as_str().to_lowercase())
            .copied()
            .unwrap_or(TokenAmount::ZERO);
        Ok(BalanceInfo {
            address: address.to_string(),
            balance,
            symbol: "QXB".to_string(),
        })
    }

    async fn transfer(
        &self,
        token: &str,
        to: &str,
        amount: &TokenAmount,
        password: &str,
    ) -> Result<TxReceipt> {
        let started = Instant::now();
        if !self.transfer_hold.is_zero() {
            tokio::time::sleep(self.transfer_hold).await;
        }
        let mut state = self.state.lock().expect("mock state poisoned");
        if Self::take_outage(&mut state) {
            return Err(HarnessError::Transport("mock outage".into()));
        }
        let email = Self::session_email(&state, token)?;
        let user = state
            .users
            .get(&email)
            .cloned()
            .ok_or_else(|| HarnessError::Auth("invalid token".into()))?;
        if user.password != password {
            return Err(HarnessError::Action("invalid password".into()));
        }
        if !Address::is_well_formed(to) {
            return Err(HarnessError::Action("invalid recipient address".into()));
        }
        if user.address.eq_ignore_ascii_case(to) {
            return Err(HarnessError::Action("cannot transfer to self".into()));
        }
        let sender_key = user.address.to_lowercase();
        let held = state
            .balances
            .get(&sender_key)
            .copied()
            .unwrap_or(TokenAmount::ZERO);
        let remaining = held
            .checked_sub(amount)
            .ok_or_else(|| HarnessError::Action("insufficient balance".into()))?;
        state.balances.insert(sender_key, remaining);
        Self::credit(&mut state, to, *amount, self.settlement_lag);

        state.seq += 1;
        let receipt = TxReceipt {
            tx_hash: format!("0xmock{:060x}", state.seq),
            status: "pending".to_string(),
        };
        state.transfer_spans.push(CallSpan {
            started,
            finished: Instant::now(),
        });
        Ok(receipt)
    }

    async fn reward_status(&self, address: &Address) -> Result<RewardStatus> {
        let mut state = self.state.lock().expect("mock state poisoned");
        if Self::take_outage(&mut state) {
            return Err(HarnessError::Transport("mock outage".into()));
        }
        let claimed = state.claimed.contains(&address.as_str().to_lowercase());
        Ok(RewardStatus {
            address: address.to_string(),
            can_claim: !claimed,
            last_claim_day: if claimed { 20_300 } else { 0 },
            next_claim_day: 20_301,
        })
    }

    async fn claim_reward(&self, token: &str, password: &str) -> Result<TxReceipt> {
        let mut state = self.state.lock().expect("mock state poisoned");
        if Self::take_outage(&mut state) {
            return Err(HarnessError::Transport("mock outage".into()));
        }
        let email = Self::session_email(&state, token)?;
        let user = state
            .users
            .get(&email)
            .cloned()
            .ok_or_else(|| HarnessError::Auth("invalid token".into()))?;
        if user.password != password {
            return Err(HarnessError::Action("invalid password".into()));
        }
        let key = user.address.to_lowercase();
        if !state.claimed.insert(key) {
            return Err(HarnessError::Action("reward already claimed today".into()));
        }
        Self::credit(&mut state, &user.address, self.reward_amount, self.settlement_lag);

        state.seq += 1;
        Ok(TxReceipt {
            tx_hash: format!("0xmock{:060x}", state.seq),
            status: "pending".to_string(),
        })
    }
}
