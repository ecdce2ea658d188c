//! Wire envelope and endpoint payloads for the ledger backend.
//!
//! Every endpoint returns `{success, data?, error?}`; non-2xx responses
//! carry `error` as a human-readable string. Field casing follows the
//! backend exactly: auth payloads are snake_case, token/reward payloads are
//! camelCase.

use serde::{Deserialize, Serialize};

use crate::amount::TokenAmount;

/// Uniform response envelope.
///
/// The optional fields carry no `serde(default)`: serde already decodes a
/// missing `Option` field as `None`, and a field-level default would pin a
/// `T: Default` bound onto the derived `Deserialize` impl that generic
/// callers cannot meet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiEnvelope<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiEnvelope<T> {
    /// Unwraps the envelope, surfacing the backend error string on failure.
    pub fn into_result(self) -> Result<T, String> {
        if self.success {
            self.data
                .ok_or_else(|| "envelope marked success but carried no data".to_string())
        } else {
            Err(self
                .error
                .unwrap_or_else(|| "backend reported failure without detail".to_string()))
        }
    }
}

/// Successful `register`/`login` payload. The token is an opaque bearer
/// credential valid for the session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthPayload {
    pub user_id: u64,
    pub email: String,
    pub address: String,
    pub token: String,
}

/// `GET /api/auth/me` payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserInfo {
    pub user_id: u64,
    pub email: String,
    pub address: String,
}

/// `GET /api/token/balance/{address}` payload. `balance` is a base-unit
/// decimal string and is decoded exactly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceInfo {
    pub address: String,
    pub balance: TokenAmount,
    pub symbol: String,
}

/// `GET /api/reward/status/{address}` payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RewardStatus {
    pub address: String,
    pub can_claim: bool,
    pub last_claim_day: i64,
    pub next_claim_day: i64,
}

/// Receipt for an accepted transfer or reward claim. Acceptance is not
/// settlement: the effect becomes visible through read endpoints later.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxReceipt {
    pub tx_hash: String,
    pub status: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_success_envelope() {
        let json = r#"{"success":true,"data":{"address":"0x1111111111111111111111111111111111111111","balance":"1000000000000000000","symbol":"QXB"}}"#;
        let envelope: ApiEnvelope<BalanceInfo> = serde_json::from_str(json).unwrap();
        let info = envelope.into_result().unwrap();
        assert_eq!(info.symbol, "QXB");
        assert_eq!(info.balance.to_base_units(), "1000000000000000000");
    }

    #[test]
    fn decodes_error_envelope() {
        let json = r#"{"success":false,"error":"insufficient balance"}"#;
        let envelope: ApiEnvelope<TxReceipt> = serde_json::from_str(json).unwrap();
        assert_eq!(envelope.into_result().unwrap_err(), "insufficient balance");
    }

    #[test]
    fn success_without_data_is_an_error() {
        let json = r#"{"success":true}"#;
        let envelope: ApiEnvelope<UserInfo> = serde_json::from_str(json).unwrap();
        assert!(envelope.into_result().is_err());
    }

    // Mirrors how the HTTP client decodes: generic over the payload with
    // only a DeserializeOwned bound, for payload types with no Default.
    fn decode_generic<T: serde::de::DeserializeOwned>(json: &str) -> ApiEnvelope<T> {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn envelope_decodes_behind_a_deserialize_owned_bound() {
        let envelope: ApiEnvelope<AuthPayload> =
            decode_generic(r#"{"success":false,"error":"account not found"}"#);
        assert_eq!(envelope.into_result().unwrap_err(), "account not found");

        let envelope: ApiEnvelope<AuthPayload> = decode_generic(r#"{"success":false}"#);
        assert!(envelope.data.is_none());
        assert!(envelope.error.is_none());
    }

    #[test]
    fn reward_status_uses_camel_case() {
        let json = r#"{"address":"0x2222222222222222222222222222222222222222","canClaim":true,"lastClaimDay":0,"nextClaimDay":20321}"#;
        let status: RewardStatus = serde_json::from_str(json).unwrap();
        assert!(status.can_claim);
        assert_eq!(status.next_claim_day, 20321);
    }
}
