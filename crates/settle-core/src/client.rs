//! Ledger backend seam and HTTP implementation.
//!
//! `LedgerBackend` is the harness's only view of the system under test:
//! one method per REST endpoint, each returning the decoded payload or a
//! classified `HarnessError`. `HttpLedger` implements it with `reqwest`;
//! `testing::MockLedger` implements it in memory.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::debug;

use settle_proto::{
    Address, ApiEnvelope, AuthPayload, BalanceInfo, HarnessError, Result, RewardStatus,
    TokenAmount, TxReceipt, UserInfo,
};

use crate::config::HarnessConfig;

/// The backend contract consumed by the harness.
///
/// Mutating calls (`register`, `login`, `transfer`, `claim_reward`) are
/// never retried implicitly. Reads (`me`, `balance`, `reward_status`) are
/// idempotent and safely repeatable; they back the settlement poller.
#[async_trait]
pub trait LedgerBackend: Send + Sync {
    async fn register(&self, email: &str, password: &str) -> Result<AuthPayload>;

    async fn login(&self, email: &str, password: &str) -> Result<AuthPayload>;

    async fn me(&self, token: &str) -> Result<UserInfo>;

    async fn balance(&self, address: &Address) -> Result<BalanceInfo>;

    /// `to` is deliberately a raw string: the fault-path driver sends
    /// malformed recipients on purpose.
    async fn transfer(
        &self,
        token: &str,
        to: &str,
        amount: &TokenAmount,
        password: &str,
    ) -> Result<TxReceipt>;

    async fn reward_status(&self, address: &Address) -> Result<RewardStatus>;

    async fn claim_reward(&self, token: &str, password: &str) -> Result<TxReceipt>;
}

/// How a backend-reported failure on an endpoint class maps into the
/// error taxonomy.
#[derive(Debug, Clone, Copy)]
enum ErrorClass {
    /// register/login/me rejections.
    Auth,
    /// transfer/claim rejections.
    Action,
    /// Read endpoints: a refused read is an infrastructure signal, not a
    /// business outcome.
    Read,
}

/// HTTP implementation of [`LedgerBackend`].
pub struct HttpLedger {
    client: reqwest::Client,
    base_url: String,
}

impl HttpLedger {
    /// Builds a client from harness config. The per-request timeout covers
    /// every call; login additionally runs under the orchestrator's
    /// generous auth timeout.
    pub fn new(config: &HarnessConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| HarnessError::Transport(format!("building HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        class: ErrorClass,
    ) -> Result<T> {
        let response = request
            .send()
            .await
            .map_err(|e| HarnessError::Transport(format!("request failed: {e}")))?;
        let status = response.status();
        let envelope: ApiEnvelope<T> = response.json().await.map_err(|e| {
            HarnessError::Transport(format!("undecodable response (HTTP {status}): {e}"))
        })?;
        envelope.into_result().map_err(|reason| match class {
            ErrorClass::Auth => HarnessError::Auth(reason),
            ErrorClass::Action => HarnessError::Action(reason),
            ErrorClass::Read => {
                HarnessError::Transport(format!("read refused (HTTP {status}): {reason}"))
            }
        })
    }
}

#[async_trait]
impl LedgerBackend for HttpLedger {
    async fn register(&self, email: &str, password: &str) -> Result<AuthPayload> {
        debug!(email, "registering identity");
        let request = self
            .client
            .post(self.url("/api/auth/register"))
            .json(&json!({ "email": email, "password": password }));
        self.execute(request, ErrorClass::Auth).await
    }

    async fn login(&self, email: &str, password: &str) -> Result<AuthPayload> {
        debug!(email, "logging in");
        let request = self
            .client
            .post(self.url("/api/auth/login"))
            .json(&json!({ "email": email, "password": password }));
        self.execute(request, ErrorClass::Auth).await
    }

    async fn me(&self, token: &str) -> Result<UserInfo> {
        let request = self.client.get(self.url("/api/auth/me")).bearer_auth(token);
        self.execute(request, ErrorClass::Auth).await
    }

    async fn balance(&self, address: &Address) -> Result<BalanceInfo> {
        let request = self
            .client
            .get(self.url(&format!("/api/token/balance/{address}")));
        self.execute(request, ErrorClass::Read).await
    }

    async fn transfer(
        &self,
        token: &str,
        to: &str,
        amount: &TokenAmount,
        password: &str,
    ) -> Result<TxReceipt> {
        debug!(to, amount = %amount, "submitting transfer");
        let request = self
            .client
            .post(self.url("/api/token/transfer"))
            .bearer_auth(token)
            .json(&json!({
                "to": to,
                "amount": amount.to_base_units(),
                "password": password,
            }));
        self.execute(request, ErrorClass::Action).await
    }

    async fn reward_status(&self, address: &Address) -> Result<RewardStatus> {
        let request = self
            .client
            .get(self.url(&format!("/api/reward/status/{address}")));
        self.execute(request, ErrorClass::Read).await
    }

    async fn claim_reward(&self, token: &str, password: &str) -> Result<TxReceipt> {
        debug!("submitting reward claim");
        let request = self
            .client
            .post(self.url("/api/reward/claim"))
            .bearer_auth(token)
            .json(&json!({ "password": password }));
        self.execute(request, ErrorClass::Action).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HarnessConfig;

    #[test]
    fn base_url_trailing_slash_is_normalized() {
        let config = HarnessConfig {
            base_url: "http://ledger.test:8080/".to_string(),
            ..HarnessConfig::default()
        };
        let ledger = HttpLedger::new(&config).unwrap();
        assert_eq!(
            ledger.url("/api/auth/me"),
            "http://ledger.test:8080/api/auth/me"
        );
    }
}
