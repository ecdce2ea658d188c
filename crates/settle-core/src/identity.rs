//! Identity provisioning.
//!
//! Each scenario works with freshly provisioned identities so runs stay
//! independent. The backend exposes no de-provisioning endpoint, so
//! independence rests on collision-resistant naming (timestamp plus a
//! process-wide counter), not cleanup. Every provision consumes one
//! identity slot on the backend; that is a design constraint of the
//! deployment, not something the harness works around.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info};

use settle_proto::{Address, HarnessError, Result};

use crate::client::LedgerBackend;

static PROVISION_SEQ: AtomicU64 = AtomicU64::new(0);

/// A live authenticated session against the backend.
#[derive(Debug, Clone)]
pub struct Identity {
    /// Opaque handle used in diagnostics (`userA-1724800000000-3`).
    pub handle: String,
    pub email: String,
    pub password: String,
    /// Derived ledger address; never changes after provisioning.
    pub address: Address,
    /// Bearer token, lifetime = session.
    pub token: String,
}

/// Creates and authenticates test identities.
pub struct Provisioner<B: LedgerBackend> {
    backend: Arc<B>,
    auth_timeout: Duration,
}

impl<B: LedgerBackend> Provisioner<B> {
    pub fn new(backend: Arc<B>, auth_timeout: Duration) -> Self {
        Self {
            backend,
            auth_timeout,
        }
    }

    /// Registers a fresh identity under a collision-resistant name derived
    /// from `prefix`, capturing the backend-issued address and token.
    pub async fn provision(&self, prefix: &str) -> Result<Identity> {
        let handle = unique_handle(prefix);
        let email = format!("{handle}@harness.test");
        let password = "Settle-Harness-1!".to_string();

        let payload = tokio::time::timeout(
            self.auth_timeout,
            self.backend.register(&email, &password),
        )
        .await
        .map_err(|_| HarnessError::Timeout(self.auth_timeout))??;

        let address = Address::parse(&payload.address).map_err(|e| {
            HarnessError::Transport(format!("backend issued malformed address: {e}"))
        })?;
        info!(handle, address = %address, "provisioned identity");

        Ok(Identity {
            handle,
            email,
            password,
            address,
            token: payload.token,
        })
    }

    /// Logs in an existing identity (pre-seeded accounts). Runs under the
    /// generous auth timeout because backend-side credential hashing is
    /// slow.
    pub async fn authenticate(&self, email: &str, password: &str) -> Result<Identity> {
        debug!(email, "authenticating pre-seeded identity");
        let payload =
            tokio::time::timeout(self.auth_timeout, self.backend.login(email, password))
                .await
                .map_err(|_| HarnessError::Timeout(self.auth_timeout))??;

        let address = Address::parse(&payload.address).map_err(|e| {
            HarnessError::Transport(format!("backend issued malformed address: {e}"))
        })?;

        Ok(Identity {
            handle: email.to_string(),
            email: email.to_string(),
            password: password.to_string(),
            address,
            token: payload.token,
        })
    }
}

/// Timestamp + process-wide sequence number, composed with the caller's
/// prefix. Two runs starting in the same millisecond still diverge on the
/// counter.
fn unique_handle(prefix: &str) -> String {
    let seq = PROVISION_SEQ.fetch_add(1, Ordering::Relaxed);
    format!("{prefix}-{}-{seq}", Utc::now().timestamp_millis())
}
